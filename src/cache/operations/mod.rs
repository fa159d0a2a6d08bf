/// 缓存操作
/// 基于远程缓存的领域读写

// 车辆位置
pub mod vehicle;

// 聊天消息
pub mod chat;

// 远程配置
pub mod config;

pub use chat::{ChatCacheOperations, StoredMessage, message_from_event};
pub use config::RemoteConfigOperations;
pub use vehicle::VehicleCacheOperations;
