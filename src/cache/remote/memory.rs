use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

use super::tree::{children, is_empty_node, remove_at, set_at, value_at};
use super::{ChildCallback, ChildEvent, ChildEventKind, RemoteCache, Subscription, WriteValue};
use crate::cache::keys::{normalize, segments};
use crate::clock::{Clock, SystemClock};
use crate::error::AppResult;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 进程内远程缓存，无 Redis 时的开发替身，也用于测试
pub struct MemoryRemoteCache {
    root: Mutex<Value>,
    events: broadcast::Sender<ChildEvent>,
    clock: Arc<dyn Clock>,
}

impl MemoryRemoteCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            root: Mutex::new(Value::Null),
            events,
            clock,
        }
    }

    /// 整棵树的快照
    pub fn snapshot(&self) -> Value {
        self.root.lock().clone()
    }

    fn emit(&self, event: ChildEvent) {
        // 没有订阅者时发送失败，忽略即可
        let _ = self.events.send(event);
    }

    fn remove_locked(&self, root: &mut Value, segs: &[&str]) {
        if let Some(removed) = remove_at(root, segs) {
            let (key, parent) = segs.split_last().map_or((String::new(), String::new()), |(k, p)| {
                (k.to_string(), p.join("/"))
            });
            self.emit(ChildEvent {
                kind: ChildEventKind::Removed,
                parent,
                key,
                value: removed,
            });
        }
    }
}

impl Default for MemoryRemoteCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl RemoteCache for MemoryRemoteCache {
    async fn get(&self, path: &str) -> AppResult<Option<Value>> {
        let segs = segments(path);
        Ok(value_at(&self.root.lock(), &segs).cloned())
    }

    async fn set(&self, path: &str, value: WriteValue) -> AppResult<()> {
        let value = value.resolve(self.clock.now_millis());
        let segs = segments(path);
        let mut root = self.root.lock();

        if is_empty_node(&value) {
            self.remove_locked(&mut root, &segs);
            return Ok(());
        }

        // 记录写入前已存在的最深前缀，用于判断哪些层级是新建的
        let existing_depth = (0..=segs.len())
            .rev()
            .find(|depth| *depth == 0 || value_at(&root, &segs[..*depth]).is_some())
            .unwrap_or(0);

        set_at(&mut root, &segs, value);

        for depth in existing_depth..segs.len() {
            let created = &segs[..=depth];
            if let Some(created_value) = value_at(&root, created) {
                self.emit(ChildEvent {
                    kind: ChildEventKind::Added,
                    parent: segs[..depth].join("/"),
                    key: segs[depth].to_string(),
                    value: created_value.clone(),
                });
            }
        }

        Ok(())
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        let segs = segments(path);
        let mut root = self.root.lock();
        self.remove_locked(&mut root, &segs);
        Ok(())
    }

    async fn subscribe(
        &self,
        path: &str,
        kind: ChildEventKind,
        callback: ChildCallback,
    ) -> AppResult<Subscription> {
        let path = normalize(path);

        // 在同一把锁内取快照并订阅，保证回放与实时事件之间不重不漏
        let (existing, mut receiver) = {
            let root = self.root.lock();
            let receiver = self.events.subscribe();
            let existing = match kind {
                ChildEventKind::Added => children(value_at(&root, &segments(&path))),
                ChildEventKind::Removed => Vec::new(),
            };
            (existing, receiver)
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

            loop {
                match receiver.recv().await {
                    Ok(event) if event.kind == kind && event.parent == path => callback(event),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Listener on {} lagged, skipped {} events", path, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(task))
    }
}
