use serde::{Deserialize, Serialize};

use crate::cache::RemoteConfigOperations;
use crate::cache::keys::{ACTIVE_FILTER_DURATION_MILLIS, EMMA_API_CALL_COOLDOWN, MOTD};

/// 下发给客户端的远程配置
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub motd: String,
    pub active_filter_duration_millis: i64,
    pub emma_api_call_cooldown: i64,
    pub wisecracks: Vec<String>,
}

impl ClientConfig {
    /// 冷却时间缺省取本地过期阈值
    pub async fn load(remote_config: &RemoteConfigOperations, default_cooldown_millis: i64) -> Self {
        let (motd, active_filter_duration_millis, emma_api_call_cooldown, wisecracks) = tokio::join!(
            remote_config.get_config_string(MOTD, ""),
            remote_config.get_config_number(ACTIVE_FILTER_DURATION_MILLIS, 0),
            remote_config.get_config_number(EMMA_API_CALL_COOLDOWN, default_cooldown_millis),
            remote_config.get_wisecracks(),
        );

        Self {
            motd,
            active_filter_duration_millis,
            emma_api_call_cooldown,
            wisecracks,
        }
    }
}
