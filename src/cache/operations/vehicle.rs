use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cache::keys::{VEHICLE_POSITIONS_PATH, VEHICLE_POSITIONS_RELEVANCE_PATH};
use crate::cache::remote::{RemoteCache, WriteValue};
use crate::error::AppResult;
use crate::models::VehiclePosition;

/// 远程缓存中的车辆位置读写
#[derive(Clone)]
pub struct VehicleCacheOperations {
    remote: Arc<dyn RemoteCache>,
}

impl VehicleCacheOperations {
    pub fn new(remote: Arc<dyn RemoteCache>) -> Self {
        Self { remote }
    }

    /// 整体替换车辆位置集合，并把新鲜度记录设为服务端时间
    pub async fn update_vehicle_data(&self, vehicles: &[VehiclePosition]) -> AppResult<()> {
        if vehicles.is_empty() {
            tracing::warn!("update_vehicle_data called with an empty vehicle list");
            return Ok(());
        }

        // 以车次名为键，同名后写覆盖
        let mut vehicle_map = Map::with_capacity(vehicles.len());
        for vehicle in vehicles {
            vehicle_map.insert(vehicle.cache_key().to_string(), serde_json::to_value(vehicle)?);
        }

        self.remote
            .set(VEHICLE_POSITIONS_PATH, WriteValue::Json(Value::Object(vehicle_map)))
            .await?;
        self.remote
            .set(VEHICLE_POSITIONS_RELEVANCE_PATH, WriteValue::ServerTimestamp)
            .await?;

        tracing::debug!("Stored {} vehicle positions in remote cache", vehicles.len());
        Ok(())
    }

    pub async fn get_vehicle_positions(&self) -> AppResult<Vec<VehiclePosition>> {
        let Some(Value::Object(map)) = self.remote.get(VEHICLE_POSITIONS_PATH).await? else {
            return Ok(Vec::new());
        };

        let mut vehicles = Vec::with_capacity(map.len());
        for (key, value) in map {
            match serde_json::from_value::<VehiclePosition>(value) {
                Ok(vehicle) => vehicles.push(vehicle),
                Err(e) => tracing::warn!("Skipping malformed vehicle {} in remote cache: {}", key, e),
            }
        }
        Ok(vehicles)
    }

    /// 远程新鲜度记录，缺失时为 0
    pub async fn get_vehicle_positions_relevance(&self) -> AppResult<i64> {
        let value = self.remote.get(VEHICLE_POSITIONS_RELEVANCE_PATH).await?;
        Ok(value.as_ref().and_then(timestamp_of).unwrap_or(0))
    }
}

/// 时间戳可能以整数或浮点数保存
pub(crate) fn timestamp_of(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|ts| ts as i64))
}
