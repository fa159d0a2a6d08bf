use std::sync::Arc;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client as RedisClient};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use super::tree::{children, is_empty_node, remove_at, set_at, value_at};
use super::{ChildCallback, ChildEvent, ChildEventKind, RemoteCache, Subscription, WriteValue};
use crate::cache::keys::{normalize, segments};
use crate::error::AppResult;

/// 基于 Redis 的路径树
///
/// 每次 `set` 写入的值以整块 JSON 存放在 `{prefix}node:{path}`，
/// 每个中间节点在 `{prefix}children:{path}` 集合中记录直接子节点。
/// 写到已有整块值内部的路径时，读出整块值修改后写回。
/// 子节点事件通过 `{prefix}events:{parent}` 频道发布。
///
/// 多步操作之间没有事务，多个客户端并发写同一路径时后写覆盖。
pub struct RedisRemoteCache {
    client: Arc<RedisClient>,
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisRemoteCache {
    pub async fn connect(client: Arc<RedisClient>, prefix: impl Into<String>) -> AppResult<Self> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            client,
            conn,
            prefix: prefix.into(),
        })
    }

    fn node_key(&self, path: &str) -> String {
        format!("{}node:{}", self.prefix, path)
    }

    fn children_key(&self, path: &str) -> String {
        format!("{}children:{}", self.prefix, path)
    }

    fn channel(&self, parent: &str) -> String {
        format!("{}events:{}", self.prefix, parent)
    }

    /// Redis 服务器当前时间（毫秒）
    async fn server_time_millis(&self, conn: &mut MultiplexedConnection) -> AppResult<i64> {
        let (secs, micros): (i64, i64) = ::redis::cmd("TIME").query_async(conn).await?;
        Ok(secs * 1000 + micros / 1000)
    }

    /// 路径上以整块 JSON 存储的节点（含自身）所在的深度
    async fn blob_depth(
        &self,
        conn: &mut MultiplexedConnection,
        segs: &[&str],
    ) -> AppResult<Option<usize>> {
        for depth in 1..=segs.len() {
            let exists: bool = conn.exists(self.node_key(&segs[..depth].join("/"))).await?;
            if exists {
                return Ok(Some(depth));
            }
        }
        Ok(None)
    }

    async fn read_blob(
        &self,
        conn: &mut MultiplexedConnection,
        path: &str,
    ) -> AppResult<Option<Value>> {
        let raw: Option<String> = conn.get(self.node_key(path)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn write_blob(
        &self,
        conn: &mut MultiplexedConnection,
        path: &str,
        value: &Value,
    ) -> AppResult<()> {
        let json = serde_json::to_string(value)?;
        let _: () = conn.set(self.node_key(path), json).await?;
        Ok(())
    }

    /// 从子节点索引拼出整棵子树
    fn read_tree<'a>(
        &'a self,
        conn: &'a mut MultiplexedConnection,
        path: String,
    ) -> BoxFuture<'a, AppResult<Option<Value>>> {
        async move {
            if let Some(blob) = self.read_blob(conn, &path).await? {
                return Ok(Some(blob));
            }

            let mut members: Vec<String> = conn.smembers(self.children_key(&path)).await?;
            if members.is_empty() {
                return Ok(None);
            }
            members.sort();

            let mut map = Map::new();
            for member in members {
                let child_path = child_path(&path, &member);
                if let Some(child) = self.read_tree(conn, child_path).await? {
                    map.insert(member, child);
                }
            }
            Ok((!map.is_empty()).then_some(Value::Object(map)))
        }
        .boxed()
    }

    fn delete_tree<'a>(
        &'a self,
        conn: &'a mut MultiplexedConnection,
        path: String,
    ) -> BoxFuture<'a, AppResult<()>> {
        async move {
            let members: Vec<String> = conn.smembers(self.children_key(&path)).await?;
            for member in members {
                self.delete_tree(conn, child_path(&path, &member)).await?;
            }
            let _: () = conn
                .del(vec![self.node_key(&path), self.children_key(&path)])
                .await?;
            Ok(())
        }
        .boxed()
    }

    /// 把路径登记到各级父节点的子节点索引，返回新建的层级
    async fn link(&self, conn: &mut MultiplexedConnection, segs: &[&str]) -> AppResult<Vec<usize>> {
        let mut created = Vec::new();
        for depth in 0..segs.len() {
            let added: i64 = conn
                .sadd(self.children_key(&segs[..depth].join("/")), segs[depth])
                .await?;
            if added > 0 {
                created.push(depth);
            }
        }
        Ok(created)
    }

    /// 从父节点索引中摘除，并向上清理变空的中间节点
    async fn unlink(&self, conn: &mut MultiplexedConnection, segs: &[&str]) -> AppResult<()> {
        let mut depth = segs.len();
        while depth > 0 {
            let parent = segs[..depth - 1].join("/");
            let _: () = conn
                .srem(self.children_key(&parent), segs[depth - 1])
                .await?;

            if depth == 1 {
                break;
            }
            let remaining: usize = conn.scard(self.children_key(&parent)).await?;
            let has_blob: bool = conn.exists(self.node_key(&parent)).await?;
            if remaining > 0 || has_blob {
                break;
            }
            depth -= 1;
        }
        Ok(())
    }

    async fn publish(&self, conn: &mut MultiplexedConnection, event: &ChildEvent) -> AppResult<()> {
        let payload = serde_json::to_string(event)?;
        let _: () = conn.publish(self.channel(&event.parent), payload).await?;
        Ok(())
    }

    async fn publish_removed(
        &self,
        conn: &mut MultiplexedConnection,
        segs: &[&str],
        removed: Value,
    ) -> AppResult<()> {
        if let Some((key, parent)) = segs.split_last() {
            let event = ChildEvent {
                kind: ChildEventKind::Removed,
                parent: parent.join("/"),
                key: key.to_string(),
                value: removed,
            };
            self.publish(conn, &event).await?;
        }
        Ok(())
    }
}

fn child_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", parent, child)
    }
}

#[async_trait]
impl RemoteCache for RedisRemoteCache {
    async fn get(&self, path: &str) -> AppResult<Option<Value>> {
        let mut conn = self.conn.clone();
        let segs = segments(path);

        match self.blob_depth(&mut conn, &segs).await? {
            Some(depth) => {
                let blob = self.read_blob(&mut conn, &segs[..depth].join("/")).await?;
                Ok(blob.and_then(|blob| value_at(&blob, &segs[depth..]).cloned()))
            }
            None => self.read_tree(&mut conn, segs.join("/")).await,
        }
    }

    async fn set(&self, path: &str, value: WriteValue) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let server_now = match value {
            WriteValue::ServerTimestamp => self.server_time_millis(&mut conn).await?,
            WriteValue::Json(_) => 0,
        };
        let value = value.resolve(server_now);
        if is_empty_node(&value) {
            return self.remove(path).await;
        }

        let segs = segments(path);
        let normalized = segs.join("/");

        match self.blob_depth(&mut conn, &segs).await? {
            Some(depth) if depth < segs.len() => {
                let owner = segs[..depth].join("/");
                let mut blob = self.read_blob(&mut conn, &owner).await?.unwrap_or(Value::Null);
                let existed = value_at(&blob, &segs[depth..]).is_some();
                set_at(&mut blob, &segs[depth..], value.clone());
                self.write_blob(&mut conn, &owner, &blob).await?;

                if !existed {
                    if let Some((key, parent)) = segs.split_last() {
                        let event = ChildEvent {
                            kind: ChildEventKind::Added,
                            parent: parent.join("/"),
                            key: key.to_string(),
                            value,
                        };
                        self.publish(&mut conn, &event).await?;
                    }
                }
            }
            _ => {
                self.delete_tree(&mut conn, normalized.clone()).await?;
                self.write_blob(&mut conn, &normalized, &value).await?;

                for depth in self.link(&mut conn, &segs).await? {
                    let created = segs[..=depth].join("/");
                    let created_value = if depth + 1 == segs.len() {
                        Some(value.clone())
                    } else {
                        self.read_tree(&mut conn, created).await?
                    };
                    if let Some(created_value) = created_value {
                        let event = ChildEvent {
                            kind: ChildEventKind::Added,
                            parent: segs[..depth].join("/"),
                            key: segs[depth].to_string(),
                            value: created_value,
                        };
                        self.publish(&mut conn, &event).await?;
                    }
                }
            }
        }

        Ok(())
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let segs = segments(path);
        if segs.is_empty() {
            return Ok(());
        }

        match self.blob_depth(&mut conn, &segs).await? {
            Some(depth) if depth < segs.len() => {
                let owner = segs[..depth].join("/");
                let Some(mut blob) = self.read_blob(&mut conn, &owner).await? else {
                    return Ok(());
                };
                let Some(removed) = remove_at(&mut blob, &segs[depth..]) else {
                    return Ok(());
                };
                if is_empty_node(&blob) {
                    let _: () = conn.del(self.node_key(&owner)).await?;
                    self.unlink(&mut conn, &segs[..depth]).await?;
                } else {
                    self.write_blob(&mut conn, &owner, &blob).await?;
                }
                self.publish_removed(&mut conn, &segs, removed).await?;
            }
            _ => {
                let normalized = segs.join("/");
                let Some(removed) = self.read_tree(&mut conn, normalized.clone()).await? else {
                    return Ok(());
                };
                self.delete_tree(&mut conn, normalized).await?;
                self.unlink(&mut conn, &segs).await?;
                self.publish_removed(&mut conn, &segs, removed).await?;
            }
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        path: &str,
        kind: ChildEventKind,
        callback: ChildCallback,
    ) -> AppResult<Subscription> {
        let path = normalize(path);

        // 先订阅频道再读快照，快照与实时事件之间可能有少量重复
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(self.channel(&path)).await?;

        let existing = match kind {
            ChildEventKind::Added => children(self.get(&path).await?.as_ref()),
            ChildEventKind::Removed => Vec::new(),
        };

        let task = tokio::spawn(async move {
            for (key, value) in existing {
                callback(ChildEvent {
                    kind,
                    parent: path.clone(),
                    key,
                    value,
                });
            }

            let mut messages = pubsub.into_on_message();
            while let Some(message) = messages.next().await {
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!("Unreadable child event on {}: {}", path, e);
                        continue;
                    }
                };
                match serde_json::from_str::<ChildEvent>(&payload) {
                    Ok(event) if event.kind == kind => callback(event),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Malformed child event on {}: {}", path, e),
                }
            }
            tracing::debug!("Child event stream for {} closed", path);
        });

        Ok(Subscription::new(task))
    }
}
