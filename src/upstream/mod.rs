// 权威数据源

use async_trait::async_trait;

use crate::models::VehiclePosition;

mod emma;

pub use emma::{EmmaClient, VEHICLE_POSITIONS_QUERY};

/// 车辆位置的上游来源
///
/// 任何传输或解析错误都返回空集合，不向调用方抛出。
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    async fn fetch(&self) -> Vec<VehiclePosition>;
}
