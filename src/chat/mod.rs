//! 聊天消息网关
//!
//! 发送受冷却时间和内容长度限制；监听按房间订阅子节点新增/删除；
//! 过期消息由后台任务定期清理。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::keys::{is_valid_segment, room_path};
use crate::cache::{
    ChatCacheOperations, ChildCallback, ChildEvent, RemoteCache, Subscription, message_from_event,
};
use crate::clock::{Clock, millis};
use crate::error::{AppError, AppResult};
use crate::models::{ChatRelevances, ChatRoom, Message, NewMessage};

mod rate_limit;
mod retention;

pub use rate_limit::RateLimitState;
pub use retention::spawn_eviction_task;

pub type MessageCallback = Arc<dyn Fn(Message) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct ChatLimits {
    /// 两次发送之间的最短间隔
    pub send_cooldown: Duration,
    /// 内容最大字符数
    pub content_length_limit: usize,
    /// 消息保留时长
    pub retention_window: Duration,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            send_cooldown: Duration::from_secs(5),
            content_length_limit: 500,
            retention_window: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("sending is cooling down, retry in {retry_after_ms} ms")]
    CoolingDown { retry_after_ms: i64 },

    #[error("message content is {len} characters long, limit is {limit}")]
    ContentTooLong { len: usize, limit: usize },

    #[error("invalid chat room: {0}")]
    InvalidRoom(String),

    #[error(transparent)]
    Storage(#[from] AppError),
}

/// 一次过期清理的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvictionSummary {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// 单个房间的新增/删除订阅，丢弃即取消
#[derive(Debug)]
pub struct RoomSubscription {
    added: Subscription,
    removed: Subscription,
}

impl RoomSubscription {
    pub fn is_active(&self) -> bool {
        self.added.is_active() && self.removed.is_active()
    }
}

/// 消息键：补零的时间戳加随机后缀，字典序即时间序
pub fn message_key(timestamp: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{:013}-{}", timestamp, &suffix[..8])
}

pub struct MessageGateway {
    chats: ChatCacheOperations,
    remote: Arc<dyn RemoteCache>,
    clock: Arc<dyn Clock>,
    rate_limit: RateLimitState,
    limits: ChatLimits,
    listeners: Mutex<Vec<RoomSubscription>>,
}

impl MessageGateway {
    pub fn new(remote: Arc<dyn RemoteCache>, clock: Arc<dyn Clock>, limits: ChatLimits) -> Self {
        Self {
            chats: ChatCacheOperations::new(remote.clone()),
            remote,
            clock,
            rate_limit: RateLimitState::new(limits.send_cooldown),
            limits,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn limits(&self) -> ChatLimits {
        self.limits
    }

    /// 发送消息，只有全部写入成功才返回 true
    pub async fn send(&self, room: &ChatRoom, message: NewMessage) -> bool {
        match self.try_send(room, message).await {
            Ok(_) => true,
            Err(SendError::CoolingDown { retry_after_ms }) => {
                tracing::debug!(
                    "Message to {} rejected, cooling down for {} ms",
                    room,
                    retry_after_ms
                );
                false
            }
            Err(e) => {
                tracing::warn!("Failed to send message to {}: {}", room, e);
                false
            }
        }
    }

    /// 发送消息，返回已存储的消息（带服务器键）
    pub async fn try_send(&self, room: &ChatRoom, message: NewMessage) -> Result<Message, SendError> {
        if !room.is_valid() {
            return Err(SendError::InvalidRoom(room.to_string()));
        }

        let now = self.clock.now_millis();
        self.rate_limit
            .try_acquire(now)
            .map_err(|retry_after_ms| SendError::CoolingDown { retry_after_ms })?;

        let message = message.into_message(now);
        let len = message.content_len();
        if len > self.limits.content_length_limit {
            return Err(SendError::ContentTooLong {
                len,
                limit: self.limits.content_length_limit,
            });
        }

        let key = message_key(message.timestamp);
        self.chats.put_message(room, &key, &message).await?;
        tracing::info!("Message {} sent to {}", key, room);

        // 以服务器写入后的值为准
        let stored = match self.chats.get_message(room, &key).await {
            Ok(Some(stored)) => stored,
            Ok(None) => message.with_key(key),
            Err(e) => {
                tracing::warn!("Failed to read back message {}: {}", key, e);
                message.with_key(key)
            }
        };
        Ok(stored)
    }

    /// 只删除房间内的一条消息；键必须是单个路径段
    pub async fn remove_message(&self, room: &ChatRoom, key: &str) -> bool {
        if !room.is_valid() || !is_valid_segment(key) {
            tracing::warn!("Refusing to remove message {:?} from {}", key, room);
            return false;
        }

        match self.chats.remove_message(room, key).await {
            Ok(()) => {
                tracing::info!("Message {} removed from {}", key, room);
                true
            }
            Err(e) => {
                tracing::error!("Failed to remove message {} from {}: {}", key, room, e);
                false
            }
        }
    }

    /// 订阅房间消息，已有消息会先作为新增回放
    pub async fn subscribe(
        &self,
        room: &ChatRoom,
        on_added: MessageCallback,
        on_removed: MessageCallback,
    ) -> AppResult<RoomSubscription> {
        if !room.is_valid() {
            return Err(AppError::InvalidPath(room.to_string()));
        }

        let path = room_path(room);
        let added = self
            .remote
            .on_child_added(&path, forward_messages(on_added))
            .await?;
        let removed = self
            .remote
            .on_child_removed(&path, forward_messages(on_removed))
            .await?;

        tracing::debug!("Subscribed to {}", path);
        Ok(RoomSubscription { added, removed })
    }

    /// 订阅并由网关持有句柄，直到 stop_listening
    pub async fn listen(
        &self,
        room: &ChatRoom,
        on_added: MessageCallback,
        on_removed: MessageCallback,
    ) -> AppResult<()> {
        let subscription = self.subscribe(room, on_added, on_removed).await?;
        self.listeners.lock().push(subscription);
        Ok(())
    }

    pub fn stop_listening(&self) {
        let dropped: Vec<RoomSubscription> = self.listeners.lock().drain(..).collect();
        if !dropped.is_empty() {
            tracing::debug!("Stopped {} room listeners", dropped.len());
        }
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.lock().len()
    }

    /// 删除所有早于保留窗口的消息，单条失败不影响其他
    pub async fn evict_old_messages(&self) -> EvictionSummary {
        let messages = match self.chats.all_messages().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("Failed to list chat messages for eviction: {}", e);
                return EvictionSummary::default();
            }
        };

        let cutoff = self.clock.now_millis() - millis(self.limits.retention_window);
        let expired: Vec<_> = messages
            .iter()
            .filter(|message| message.timestamp().is_some_and(|ts| ts < cutoff))
            .collect();

        let removals = expired.iter().map(|message| async move {
            let result = self.chats.remove_path(&message.path).await;
            match &result {
                Ok(()) => tracing::info!(
                    "Removed old message {} from {}/{}",
                    message.key,
                    message.room_type,
                    message.room_id
                ),
                Err(e) => tracing::error!("Failed to remove old message {}: {}", message.path, e),
            }
            result.is_ok()
        });
        let results = futures_util::future::join_all(removals).await;

        let removed = results.iter().filter(|ok| **ok).count();
        let summary = EvictionSummary {
            scanned: messages.len(),
            removed,
            failed: results.len() - removed,
        };
        tracing::info!(
            "Eviction finished: scanned {}, removed {}, failed {}",
            summary.scanned,
            summary.removed,
            summary.failed
        );
        summary
    }

    pub async fn chat_relevances(&self) -> ChatRelevances {
        match self.chats.chat_relevances().await {
            Ok(relevances) => relevances,
            Err(e) => {
                tracing::warn!("Failed to read chat relevances: {}", e);
                ChatRelevances::default()
            }
        }
    }
}

fn forward_messages(callback: MessageCallback) -> ChildCallback {
    Arc::new(move |event: ChildEvent| {
        if let Some(message) = message_from_event(&event) {
            callback(message);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_by_time() {
        let earlier = message_key(999);
        let later = message_key(1_700_000_000_000);
        assert!(earlier < later);
        assert!(earlier.starts_with("0000000000999-"));
        assert_eq!(later.len(), 13 + 1 + 8);
    }

    #[test]
    fn same_millisecond_keys_differ() {
        assert_ne!(message_key(5), message_key(5));
    }
}
