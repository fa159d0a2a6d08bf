//! 远程共享缓存
//!
//! 以路径寻址的键值树（`chats/train/2613/...`），支持子节点新增/删除通知
//! 和由服务端生成的时间戳。写入同一路径时后写覆盖，不提供事务。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::AppResult;

pub mod memory;
pub mod redis_tree;
pub(crate) mod tree;

pub use self::memory::MemoryRemoteCache;
pub use self::redis_tree::RedisRemoteCache;

/// 写入值：普通 JSON 或由服务端填充的当前时间（毫秒）
#[derive(Debug, Clone, PartialEq)]
pub enum WriteValue {
    Json(Value),
    ServerTimestamp,
}

impl WriteValue {
    pub(crate) fn resolve(self, server_now: i64) -> Value {
        match self {
            WriteValue::Json(value) => value,
            WriteValue::ServerTimestamp => Value::from(server_now),
        }
    }
}

impl From<Value> for WriteValue {
    fn from(value: Value) -> Self {
        WriteValue::Json(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildEventKind {
    Added,
    Removed,
}

/// 子节点变更通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildEvent {
    pub kind: ChildEventKind,
    /// 被监听的父路径
    pub parent: String,
    /// 子节点键
    pub key: String,
    /// 新增时为写入的值，删除时为删除前的值
    pub value: Value,
}

pub type ChildCallback = Arc<dyn Fn(ChildEvent) + Send + Sync>;

/// 订阅句柄，丢弃即取消订阅
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[async_trait]
pub trait RemoteCache: Send + Sync {
    /// 读取路径下的值（含整棵子树），不存在时返回 None
    async fn get(&self, path: &str) -> AppResult<Option<Value>>;

    /// 覆盖写入；写入 null 或空对象等同于删除
    async fn set(&self, path: &str, value: WriteValue) -> AppResult<()>;

    async fn remove(&self, path: &str) -> AppResult<()>;

    /// 订阅直接子节点的变更。新增订阅会先回放已有子节点。
    async fn subscribe(
        &self,
        path: &str,
        kind: ChildEventKind,
        callback: ChildCallback,
    ) -> AppResult<Subscription>;

    async fn on_child_added(&self, path: &str, callback: ChildCallback) -> AppResult<Subscription> {
        self.subscribe(path, ChildEventKind::Added, callback).await
    }

    async fn on_child_removed(
        &self,
        path: &str,
        callback: ChildCallback,
    ) -> AppResult<Subscription> {
        self.subscribe(path, ChildEventKind::Removed, callback).await
    }
}
