use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::vehicle::timestamp_of;
use crate::cache::keys::{
    CHATS_ROOT, RELEVANCE_ROOT, is_valid_segment, join, message_path, room_relevance_path,
};
use crate::cache::remote::{ChildEvent, RemoteCache, WriteValue};
use crate::error::{AppError, AppResult};
use crate::models::{ChatRelevances, ChatRoom, ChatRoomType, Message};

/// 房间内的一条已存储消息（原始值）
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub path: String,
    pub room_type: String,
    pub room_id: String,
    pub key: String,
    pub value: Value,
}

impl StoredMessage {
    pub fn timestamp(&self) -> Option<i64> {
        self.value.get("timestamp").and_then(timestamp_of)
    }
}

/// 聊天消息的远程缓存操作
#[derive(Clone)]
pub struct ChatCacheOperations {
    remote: Arc<dyn RemoteCache>,
}

impl ChatCacheOperations {
    pub fn new(remote: Arc<dyn RemoteCache>) -> Self {
        Self { remote }
    }

    /// 写入消息，用服务端时间覆盖其时间戳，并刷新房间活跃度
    pub async fn put_message(&self, room: &ChatRoom, key: &str, message: &Message) -> AppResult<()> {
        let path = checked_message_path(room, key)?;
        let mut body = serde_json::to_value(message)?;
        if let Value::Object(map) = &mut body {
            map.remove("key");
        }

        self.remote.set(&path, WriteValue::Json(body)).await?;
        self.remote
            .set(&join(&path, "timestamp"), WriteValue::ServerTimestamp)
            .await?;
        self.remote
            .set(&room_relevance_path(room), WriteValue::ServerTimestamp)
            .await?;
        Ok(())
    }

    pub async fn get_message(&self, room: &ChatRoom, key: &str) -> AppResult<Option<Message>> {
        let value = self.remote.get(&checked_message_path(room, key)?).await?;
        Ok(value.and_then(|value| serde_json::from_value::<Message>(value).ok()).map(|m| m.with_key(key)))
    }

    pub async fn remove_message(&self, room: &ChatRoom, key: &str) -> AppResult<()> {
        self.remote.remove(&checked_message_path(room, key)?).await
    }

    pub async fn remove_path(&self, path: &str) -> AppResult<()> {
        self.remote.remove(path).await
    }

    /// 遍历 chats/{type}/{id}/{key} 下的全部消息
    pub async fn all_messages(&self) -> AppResult<Vec<StoredMessage>> {
        let Some(Value::Object(room_types)) = self.remote.get(CHATS_ROOT).await? else {
            return Ok(Vec::new());
        };

        let mut messages = Vec::new();
        for (room_type, rooms) in room_types {
            let Value::Object(rooms) = rooms else { continue };
            for (room_id, room_messages) in rooms {
                let Value::Object(room_messages) = room_messages else { continue };
                for (key, value) in room_messages {
                    messages.push(StoredMessage {
                        path: format!("{}/{}/{}/{}", CHATS_ROOT, room_type, room_id, key),
                        room_type: room_type.clone(),
                        room_id: room_id.clone(),
                        key,
                        value,
                    });
                }
            }
        }
        Ok(messages)
    }

    pub async fn chat_relevances(&self) -> AppResult<ChatRelevances> {
        let Some(Value::Object(stats)) = self.remote.get(RELEVANCE_ROOT).await? else {
            return Ok(ChatRelevances::default());
        };

        let collect = |room_type: ChatRoomType| -> Option<BTreeMap<String, i64>> {
            let Value::Object(rooms) = stats.get(room_type.as_str())? else {
                return None;
            };
            Some(
                rooms
                    .iter()
                    .map(|(room_id, ts)| {
                        let key = if room_id.is_empty() { "(empty)" } else { room_id.as_str() };
                        (key.to_string(), timestamp_of(ts).unwrap_or(0))
                    })
                    .collect(),
            )
        };

        Ok(ChatRelevances {
            train: collect(ChatRoomType::Train),
            territory: collect(ChatRoomType::Territory),
        })
    }
}

/// 消息路径；房间标识和键都必须是单个路径段，否则会落到别的节点上
fn checked_message_path(room: &ChatRoom, key: &str) -> AppResult<String> {
    if !room.is_valid() || !is_valid_segment(key) {
        return Err(AppError::InvalidPath(format!("{}/{:?}", room, key)));
    }
    Ok(message_path(room, key))
}

/// 把子节点事件还原成带服务器键的消息
pub fn message_from_event(event: &ChildEvent) -> Option<Message> {
    match serde_json::from_value::<Message>(event.value.clone()) {
        Ok(message) => Some(message.with_key(event.key.clone())),
        Err(e) => {
            tracing::warn!("Ignoring malformed message {}/{}: {}", event.parent, event.key, e);
            None
        }
    }
}
