use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::UpstreamSource;
use crate::error::AppResult;
use crate::models::VehiclePosition;
use crate::models::vehicle::sort_by_short_name;

const USER_AGENT: &str = "OnRail/1.0";

/// 匈牙利全境范围内的铁路与铁路替代巴士
pub const VEHICLE_POSITIONS_QUERY: &str = r#"
{
    vehiclePositions(
        swLat: 45.5, swLon: 16.1, neLat: 48.7, neLon: 22.8,
        modes: [RAIL, RAIL_REPLACEMENT_BUS]
    ) {
        trip {
            gtfsId tripShortName tripHeadsign
            stoptimes {
                stop { name lat lon }
                arrivalDelay
            }
            arrivalStoptime {
                stop { name lat lon }
                arrivalDelay
            }
        }
        vehicleId lat lon label speed heading
        stopRelationship { status }
        prevOrCurrentStop { stop { name lat lon } }
        nextStop { stop { name lat lon } }
    }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<VehiclePositionsData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VehiclePositionsData {
    /// 逐条解析，单条格式错误不影响其余车辆
    #[serde(default)]
    vehicle_positions: Vec<Value>,
}

fn parse_vehicles(raw: Vec<Value>) -> Vec<VehiclePosition> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<VehiclePosition>(value) {
            Ok(vehicle) => Some(vehicle),
            Err(e) => {
                tracing::warn!("Skipping malformed vehicle #{} from EMMA: {}", index, e);
                None
            }
        })
        .collect()
}

/// MÁV EMMA GraphQL 客户端
#[derive(Clone)]
pub struct EmmaClient {
    http: reqwest::Client,
    url: String,
}

impl EmmaClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    async fn fetch_trains(&self) -> AppResult<Option<Vec<VehiclePosition>>> {
        let response = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "query": VEHICLE_POSITIONS_QUERY }))
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::error!(
                "EMMA API request failed: {} {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("")
            );
            return Ok(None);
        }

        let body: GraphQlResponse = response.json().await?;
        Ok(body.data.map(|data| parse_vehicles(data.vehicle_positions)))
    }
}

#[async_trait]
impl UpstreamSource for EmmaClient {
    async fn fetch(&self) -> Vec<VehiclePosition> {
        match self.fetch_trains().await {
            Ok(Some(vehicles)) => {
                tracing::info!("Fetched {} vehicle positions from EMMA", vehicles.len());
                sort_by_short_name(vehicles)
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!("Error fetching train data from EMMA: {}", e);
                Vec::new()
            }
        }
    }
}
