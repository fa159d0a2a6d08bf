//! 列车数据新鲜度协调
//!
//! 三层数据按 `[本地, 远程, 上游]` 排列。每次取数先读本地缓存；
//! 在线时根据远程新鲜度决定从上游还是远程开始向下查找，
//! 第一个给出非空数据的层胜出，结果写回它下面的每一层。
//! 任何读取失败都退回本地缓存，不向调用方抛错。

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{LocalCache, RemoteCache};
use crate::clock::{Clock, millis};
use crate::error::AppResult;
use crate::models::TrainsData;
use crate::upstream::UpstreamSource;

mod connectivity;
mod tier;

pub use connectivity::{Connectivity, ConnectivityFlag};
pub use tier::{LocalTier, RemoteTier, Tier, TierKind, UpstreamTier};

const LOCAL: usize = 0;
const REMOTE: usize = 1;
const UPSTREAM: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct FreshnessSettings {
    /// 远程数据超过该时长即视为过期
    pub stale_threshold: Duration,
    /// 单次上游请求的最长等待时间
    pub upstream_timeout: Duration,
}

impl Default for FreshnessSettings {
    fn default() -> Self {
        Self {
            stale_threshold: Duration::from_secs(60),
            upstream_timeout: Duration::from_secs(10),
        }
    }
}

pub struct FreshnessCoordinator {
    local: Arc<LocalTier>,
    tiers: [Arc<dyn Tier>; 3],
    connectivity: Arc<dyn Connectivity>,
    clock: Arc<dyn Clock>,
    stale_threshold: Duration,
}

impl FreshnessCoordinator {
    pub fn new(
        local: Arc<dyn LocalCache>,
        remote: Arc<dyn RemoteCache>,
        upstream: Arc<dyn UpstreamSource>,
        connectivity: Arc<dyn Connectivity>,
        clock: Arc<dyn Clock>,
        settings: FreshnessSettings,
    ) -> Self {
        let local_tier = Arc::new(LocalTier::new(local));
        let tiers: [Arc<dyn Tier>; 3] = [
            local_tier.clone(),
            Arc::new(RemoteTier::new(remote)),
            Arc::new(UpstreamTier::new(
                upstream,
                clock.clone(),
                settings.upstream_timeout,
            )),
        ];

        Self {
            local: local_tier,
            tiers,
            connectivity,
            clock,
            stale_threshold: settings.stale_threshold,
        }
    }

    /// 返回当前可得的最佳列车数据
    pub async fn get_data(&self) -> TrainsData {
        let cached = match self.local.read() {
            Ok(data) => data.normalized(),
            Err(e) => {
                tracing::warn!("Failed to read local train cache: {}", e);
                TrainsData::empty()
            }
        };

        if !self.connectivity.is_online() {
            tracing::debug!(
                "Offline, serving {} trains from local cache",
                cached.trains.len()
            );
            return cached;
        }

        match self.refresh(&cached).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => cached,
            Err(e) => {
                tracing::error!("Failed to refresh train data, serving local cache: {}", e);
                cached
            }
        }
    }

    async fn refresh(&self, cached: &TrainsData) -> AppResult<Option<TrainsData>> {
        let now = self.clock.now_millis();
        let remote_freshness = self.tiers[REMOTE].freshness().await?;
        let stale = remote_freshness < now - millis(self.stale_threshold);
        let start = if stale { UPSTREAM } else { REMOTE };

        tracing::debug!(
            "Remote trains updated at {} (stale: {}), starting at {} tier",
            remote_freshness,
            stale,
            self.tiers[start].kind()
        );

        for index in (REMOTE..=start).rev() {
            let tier = &self.tiers[index];
            let candidate = match tier.try_read().await {
                Ok(candidate) => candidate,
                Err(e) => {
                    tracing::warn!("Reading {} tier failed: {}", tier.kind(), e);
                    continue;
                }
            };

            if candidate.is_empty() {
                tracing::debug!("{} tier returned no trains", tier.kind());
                continue;
            }
            // 比本地还旧的数据不返回，保证 last_updated 不回退
            if candidate.last_updated < cached.last_updated {
                tracing::debug!(
                    "{} tier data ({}) is older than local cache ({})",
                    tier.kind(),
                    candidate.last_updated,
                    cached.last_updated
                );
                continue;
            }

            let fresh = candidate.normalized();
            self.propagate(index, &fresh).await;
            return Ok(Some(fresh));
        }

        Ok(None)
    }

    /// 写回来源层下面的每一层；写失败只记录日志
    async fn propagate(&self, source: usize, data: &TrainsData) {
        for tier in self.tiers[LOCAL..source].iter().rev() {
            if let Err(e) = tier.try_write(data).await {
                tracing::error!("Failed to write trains to {} tier: {}", tier.kind(), e);
            }
        }
    }

    /// 清空本地缓存，可重复调用
    pub fn clear_cache(&self) -> AppResult<()> {
        self.local.clear()
    }

    /// 本地缓存的年龄（毫秒），从未写入时为 0
    pub fn cache_age(&self) -> i64 {
        match self.local.last_updated() {
            Ok(0) => 0,
            Ok(last_updated) => self.clock.now_millis() - last_updated,
            Err(e) => {
                tracing::warn!("Failed to read local cache timestamp: {}", e);
                0
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.cache_age() > millis(self.stale_threshold)
    }

    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }
}
