// 缓存模块
// 远程共享缓存、本地持久缓存，以及基于它们的领域操作

pub mod keys;
pub mod local;
pub mod operations;
pub mod remote;

// 重新导出常用类型，方便其他模块使用
pub use local::{FileLocalCache, LocalCache, MemoryLocalCache};
pub use operations::{
    ChatCacheOperations, RemoteConfigOperations, StoredMessage, VehicleCacheOperations,
    message_from_event,
};
pub use remote::{
    ChildCallback, ChildEvent, ChildEventKind, MemoryRemoteCache, RedisRemoteCache, RemoteCache,
    Subscription, WriteValue,
};
