use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::clock::millis;

/// 发送冷却状态，每个网关实例一份
///
/// 初始为 0；每次通过冷却检查的发送都会更新，之后即使因内容过长被拒也不回退。
#[derive(Debug)]
pub struct RateLimitState {
    last_sent: AtomicI64,
    cooldown_ms: i64,
}

impl RateLimitState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_sent: AtomicI64::new(0),
            cooldown_ms: millis(cooldown),
        }
    }

    /// 通过时记录本次时间；冷却中返回还需等待的毫秒数
    pub fn try_acquire(&self, now: i64) -> Result<(), i64> {
        let last = self.last_sent.load(Ordering::SeqCst);
        let elapsed = now - last;
        if elapsed < self.cooldown_ms {
            return Err(self.cooldown_ms - elapsed);
        }

        // 同一进程内并发发送时只有一个能通过
        self.last_sent
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| self.cooldown_ms)
    }

    pub fn last_sent(&self) -> i64 {
        self.last_sent.load(Ordering::SeqCst)
    }
}
