use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::MessageGateway;
use crate::freshness::Connectivity;

/// 定期清理过期消息，离线时跳过
pub fn spawn_eviction_task(
    gateway: Arc<MessageGateway>,
    connectivity: Arc<dyn Connectivity>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !connectivity.is_online() {
                tracing::debug!("Offline, skipping message eviction");
                continue;
            }
            gateway.evict_old_messages().await;
        }
    })
}
