use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::natural_cmp;

/// 车次名为空时使用的占位键
pub const EMPTY_NAME_KEY: &str = "(empty)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTime {
    pub stop: Stop,
    /// 到站延误（秒）
    #[serde(default)]
    pub arrival_delay: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRelationship {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRef {
    pub stop: Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    #[serde(default)]
    pub gtfs_id: String,
    #[serde(default)]
    pub trip_short_name: Option<String>,
    #[serde(default)]
    pub trip_headsign: Option<String>,
    #[serde(default)]
    pub stoptimes: Vec<StopTime>,
    #[serde(default)]
    pub arrival_stoptime: Option<StopTime>,
}

/// EMMA 返回的单个车辆实时位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePosition {
    pub trip: Trip,
    #[serde(default)]
    pub vehicle_id: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub stop_relationship: Option<StopRelationship>,
    #[serde(default)]
    pub prev_or_current_stop: Option<StopRef>,
    #[serde(default)]
    pub next_stop: Option<StopRef>,
}

impl VehiclePosition {
    /// 车次短名，缺失时为空字符串
    pub fn short_name(&self) -> &str {
        self.trip.trip_short_name.as_deref().unwrap_or("")
    }

    /// 远程缓存中的存储键
    pub fn cache_key(&self) -> &str {
        match self.short_name() {
            "" => EMPTY_NAME_KEY,
            name => name,
        }
    }
}

/// 车辆位置集合及其最后确认时间
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainsData {
    pub trains: Vec<VehiclePosition>,
    /// 毫秒时间戳，0 表示从未获取过
    pub last_updated: i64,
}

impl TrainsData {
    pub fn new(trains: Vec<VehiclePosition>, last_updated: i64) -> Self {
        Self {
            trains,
            last_updated,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    /// 按车次名去重（后写覆盖）并自然排序
    pub fn normalized(self) -> Self {
        Self {
            trains: sort_by_short_name(coalesce_by_short_name(self.trains)),
            last_updated: self.last_updated,
        }
    }
}

/// 以车次名为键合并，同名时后出现的覆盖前面的
pub fn coalesce_by_short_name(trains: Vec<VehiclePosition>) -> Vec<VehiclePosition> {
    let mut by_key: HashMap<String, VehiclePosition> = HashMap::with_capacity(trains.len());
    for vehicle in trains {
        by_key.insert(vehicle.cache_key().to_string(), vehicle);
    }
    by_key.into_values().collect()
}

pub fn sort_by_short_name(mut trains: Vec<VehiclePosition>) -> Vec<VehiclePosition> {
    trains.sort_by(|a, b| natural_cmp(a.short_name(), b.short_name()));
    trains
}

#[cfg(test)]
pub(crate) fn vehicle(short_name: &str) -> VehiclePosition {
    VehiclePosition {
        trip: Trip {
            gtfs_id: format!("1:{}", short_name),
            trip_short_name: Some(short_name.to_string()),
            trip_headsign: None,
            stoptimes: Vec::new(),
            arrival_stoptime: None,
        },
        vehicle_id: format!("veh-{}", short_name),
        lat: 47.5,
        lon: 19.04,
        label: None,
        speed: Some(0.0),
        heading: Some(90.0),
        stop_relationship: None,
        prev_or_current_stop: None,
        next_stop: None,
    }
}
