use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// EMMA GraphQL 接口默认地址
pub const DEFAULT_UPSTREAM_URL: &str =
    "https://emma.mav.hu/otp2-backend/otp/routers/default/index/graphql";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// 为空时使用进程内远程缓存
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub local_cache_path: String,
    pub upstream_url: String,
    pub upstream_timeout_secs: u64,
    pub stale_threshold_secs: u64,
    pub send_cooldown_secs: u64,
    pub message_content_length_limit: usize,
    pub retention_days: u64,
    pub eviction_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            redis_url: None,
            redis_key_prefix: "onrail:".into(),
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            local_cache_path: "onrail-cache.json".into(),
            upstream_url: DEFAULT_UPSTREAM_URL.into(),
            upstream_timeout_secs: 10,
            stale_threshold_secs: 60,
            send_cooldown_secs: 5,
            message_content_length_limit: 500,
            retention_days: 7,
            eviction_interval_secs: 3600,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        Ok(Config {
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            redis_key_prefix: env::var("REDIS_KEY_PREFIX").unwrap_or(defaults.redis_key_prefix),
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_var("SERVER_PORT", defaults.server_port)?,
            api_base_uri: env::var("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            local_cache_path: env::var("LOCAL_CACHE_PATH").unwrap_or(defaults.local_cache_path),
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            upstream_timeout_secs: parse_var(
                "UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout_secs,
            )?,
            stale_threshold_secs: parse_var("STALE_THRESHOLD_SECS", defaults.stale_threshold_secs)?,
            send_cooldown_secs: parse_var("SEND_COOLDOWN_SECS", defaults.send_cooldown_secs)?,
            message_content_length_limit: parse_var(
                "MESSAGE_CONTENT_LENGTH_LIMIT",
                defaults.message_content_length_limit,
            )?,
            retention_days: parse_var("RETENTION_DAYS", defaults.retention_days)?,
            eviction_interval_secs: parse_var(
                "EVICTION_INTERVAL_SECS",
                defaults.eviction_interval_secs,
            )?,
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    pub fn send_cooldown(&self) -> Duration {
        Duration::from_secs(self.send_cooldown_secs)
    }

    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 3600)
    }

    /// 为0时表示不启动定期清理
    pub fn eviction_interval(&self) -> Option<Duration> {
        (self.eviction_interval_secs > 0).then(|| Duration::from_secs(self.eviction_interval_secs))
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}
