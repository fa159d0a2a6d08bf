use std::sync::Arc;

use serde_json::Value;

use crate::cache::keys::{WISECRACKS, config_path};
use crate::cache::remote::RemoteCache;

/// 远程配置读取，读取失败或缺失时返回默认值
#[derive(Clone)]
pub struct RemoteConfigOperations {
    remote: Arc<dyn RemoteCache>,
}

impl RemoteConfigOperations {
    pub fn new(remote: Arc<dyn RemoteCache>) -> Self {
        Self { remote }
    }

    async fn get_value(&self, key: &str) -> Option<Value> {
        match self.remote.get(&config_path(key)).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Error getting config {}: {}", key, e);
                None
            }
        }
    }

    pub async fn get_config_string(&self, key: &str, default: &str) -> String {
        match self.get_value(key).await {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => default.to_string(),
        }
    }

    /// 数字也可能以字符串形式保存
    pub async fn get_config_number(&self, key: &str, default: i64) -> i64 {
        match self.get_value(key).await {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub async fn get_wisecracks(&self) -> Vec<String> {
        let mut wisecracks: Vec<String> = match self.get_value(WISECRACKS).await {
            Some(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(_, v)| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        wisecracks.sort();
        wisecracks
    }
}
