use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::keys::{LOCAL_TRAINS_KEY, LOCAL_TRAINS_LAST_UPDATED_KEY};
use crate::cache::{LocalCache, RemoteCache, VehicleCacheOperations};
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{TrainsData, VehiclePosition};
use crate::upstream::UpstreamSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierKind {
    Local,
    Remote,
    Upstream,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TierKind::Local => "local",
            TierKind::Remote => "remote",
            TierKind::Upstream => "upstream",
        };
        f.write_str(name)
    }
}

/// 数据层的统一读写能力
#[async_trait]
pub trait Tier: Send + Sync {
    fn kind(&self) -> TierKind;

    /// 该层数据最后一次确认正确的时间（毫秒）
    async fn freshness(&self) -> AppResult<i64>;

    async fn try_read(&self) -> AppResult<TrainsData>;

    async fn try_write(&self, data: &TrainsData) -> AppResult<()>;
}

/// 本地持久缓存层
pub struct LocalTier {
    store: Arc<dyn LocalCache>,
}

impl LocalTier {
    pub fn new(store: Arc<dyn LocalCache>) -> Self {
        Self { store }
    }

    /// 同步读取；任一键缺失时视为空缓存
    pub fn read(&self) -> AppResult<TrainsData> {
        let trains = self.store.get_item(LOCAL_TRAINS_KEY)?;
        let last_updated = self.store.get_item(LOCAL_TRAINS_LAST_UPDATED_KEY)?;
        let (Some(trains), Some(last_updated)) = (trains, last_updated) else {
            return Ok(TrainsData::empty());
        };

        let trains: Vec<VehiclePosition> = serde_json::from_str(&trains)
            .map_err(|e| AppError::CorruptCache(format!("{}: {}", LOCAL_TRAINS_KEY, e)))?;
        let last_updated = last_updated.trim().parse::<i64>().map_err(|e| {
            AppError::CorruptCache(format!("{}: {}", LOCAL_TRAINS_LAST_UPDATED_KEY, e))
        })?;
        Ok(TrainsData::new(trains, last_updated))
    }

    pub fn last_updated(&self) -> AppResult<i64> {
        Ok(self
            .store
            .get_item(LOCAL_TRAINS_LAST_UPDATED_KEY)?
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0))
    }

    pub fn write(&self, data: &TrainsData) -> AppResult<()> {
        let current = self.last_updated()?;
        if data.last_updated < current {
            tracing::debug!(
                "Skipping local cache write: {} is older than {}",
                data.last_updated,
                current
            );
            return Ok(());
        }

        let previous = self.store.get_item(LOCAL_TRAINS_KEY)?;
        self.store
            .set_item(LOCAL_TRAINS_KEY, &serde_json::to_string(&data.trains)?)?;

        // 时间戳写失败时恢复旧的列车数据，两个键始终成对
        if let Err(e) = self
            .store
            .set_item(LOCAL_TRAINS_LAST_UPDATED_KEY, &data.last_updated.to_string())
        {
            let restored = match previous {
                Some(previous) => self.store.set_item(LOCAL_TRAINS_KEY, &previous),
                None => self.store.remove_item(LOCAL_TRAINS_KEY),
            };
            if let Err(restore_error) = restored {
                tracing::error!(
                    "Failed to restore local trains after a failed write: {}",
                    restore_error
                );
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn clear(&self) -> AppResult<()> {
        self.store.remove_item(LOCAL_TRAINS_KEY)?;
        self.store.remove_item(LOCAL_TRAINS_LAST_UPDATED_KEY)?;
        Ok(())
    }
}

#[async_trait]
impl Tier for LocalTier {
    fn kind(&self) -> TierKind {
        TierKind::Local
    }

    async fn freshness(&self) -> AppResult<i64> {
        self.last_updated()
    }

    async fn try_read(&self) -> AppResult<TrainsData> {
        self.read()
    }

    async fn try_write(&self, data: &TrainsData) -> AppResult<()> {
        self.write(data)
    }
}

/// 远程共享缓存层
pub struct RemoteTier {
    vehicles: VehicleCacheOperations,
}

impl RemoteTier {
    pub fn new(remote: Arc<dyn RemoteCache>) -> Self {
        Self {
            vehicles: VehicleCacheOperations::new(remote),
        }
    }
}

#[async_trait]
impl Tier for RemoteTier {
    fn kind(&self) -> TierKind {
        TierKind::Remote
    }

    async fn freshness(&self) -> AppResult<i64> {
        self.vehicles.get_vehicle_positions_relevance().await
    }

    async fn try_read(&self) -> AppResult<TrainsData> {
        let trains = self.vehicles.get_vehicle_positions().await?;
        if trains.is_empty() {
            return Ok(TrainsData::empty());
        }
        let last_updated = self.vehicles.get_vehicle_positions_relevance().await?;
        Ok(TrainsData::new(trains, last_updated))
    }

    async fn try_write(&self, data: &TrainsData) -> AppResult<()> {
        self.vehicles.update_vehicle_data(&data.trains).await
    }
}

/// 上游权威数据层，只读
pub struct UpstreamTier {
    source: Arc<dyn UpstreamSource>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl UpstreamTier {
    pub fn new(source: Arc<dyn UpstreamSource>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            source,
            clock,
            timeout,
        }
    }
}

#[async_trait]
impl Tier for UpstreamTier {
    fn kind(&self) -> TierKind {
        TierKind::Upstream
    }

    async fn freshness(&self) -> AppResult<i64> {
        Ok(self.clock.now_millis())
    }

    async fn try_read(&self) -> AppResult<TrainsData> {
        let trains = tokio::time::timeout(self.timeout, self.source.fetch())
            .await
            .map_err(|_| AppError::Timeout(self.timeout))?;
        Ok(TrainsData::new(trains, self.clock.now_millis()))
    }

    async fn try_write(&self, _data: &TrainsData) -> AppResult<()> {
        Ok(())
    }
}
