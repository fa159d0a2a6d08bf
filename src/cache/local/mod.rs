//! 本地持久缓存：同步读写的字符串键值对，进程重启后仍然保留

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::AppResult;

mod file;

pub use file::FileLocalCache;

pub trait LocalCache: Send + Sync {
    fn get_item(&self, key: &str) -> AppResult<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> AppResult<()>;

    /// 键不存在时也返回成功
    fn remove_item(&self, key: &str) -> AppResult<()>;
}

/// 纯内存实现，不跨进程保留
#[derive(Debug, Default)]
pub struct MemoryLocalCache {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryLocalCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryLocalCache {
    fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> AppResult<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}
