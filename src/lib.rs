use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::cache::{LocalCache, RemoteCache, RemoteConfigOperations};
use crate::chat::{ChatLimits, MessageGateway};
use crate::clock::Clock;
use crate::config::Config;
use crate::freshness::{ConnectivityFlag, FreshnessCoordinator, FreshnessSettings};
use crate::upstream::UpstreamSource;

pub mod cache;
pub mod chat;
pub mod clock;
pub mod config;
pub mod error;
pub mod freshness;
pub mod middleware;
pub mod models;
pub mod result;
pub mod routes;
pub mod upstream;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub coordinator: Arc<FreshnessCoordinator>,
    pub gateway: Arc<MessageGateway>,
    pub remote_config: RemoteConfigOperations,
    pub connectivity: Arc<ConnectivityFlag>,
}

impl AppState {
    /// 按配置组装协调器和消息网关
    pub fn new(
        config: Config,
        local: Arc<dyn LocalCache>,
        remote: Arc<dyn RemoteCache>,
        upstream: Arc<dyn UpstreamSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let connectivity = Arc::new(ConnectivityFlag::default());

        let coordinator = FreshnessCoordinator::new(
            local,
            remote.clone(),
            upstream,
            connectivity.clone(),
            clock.clone(),
            FreshnessSettings {
                stale_threshold: config.stale_threshold(),
                upstream_timeout: config.upstream_timeout(),
            },
        );

        let gateway = MessageGateway::new(
            remote.clone(),
            clock,
            ChatLimits {
                send_cooldown: config.send_cooldown(),
                content_length_limit: config.message_content_length_limit,
                retention_window: config.retention_window(),
            },
        );

        Self {
            config,
            coordinator: Arc::new(coordinator),
            gateway: Arc::new(gateway),
            remote_config: RemoteConfigOperations::new(remote),
            connectivity,
        }
    }
}

/// 全部接口，挂在 api_base_uri 下
pub fn router(state: AppState) -> Router {
    let train_routes = Router::new()
        .route("/trains", get(routes::trains::get_trains))
        .route(
            "/trains/cache",
            get(routes::trains::get_cache_status).delete(routes::trains::clear_cache),
        )
        .route("/connectivity", put(routes::trains::set_connectivity));

    let chat_routes = Router::new()
        .route(
            "/chats/{room_type}/{room_id}/messages",
            post(routes::chat::send_message),
        )
        .route(
            "/chats/{room_type}/{room_id}/messages/{key}",
            delete(routes::chat::remove_message),
        )
        .route(
            "/chats/{room_type}/{room_id}/events",
            get(routes::chat::room_events),
        )
        .route("/chats/relevance", get(routes::chat::get_relevances))
        .route("/chats/evict", post(routes::chat::evict_old_messages))
        .route("/chats/reports", get(routes::chat::get_reports));

    let config_routes = Router::new()
        .route("/config", get(routes::config::get_config))
        .route("/territories", get(routes::config::get_territories));

    let api = Router::new()
        .merge(train_routes)
        .merge(chat_routes)
        .merge(config_routes);

    // 前缀为 "/" 时直接挂在根上
    let base = state.config.api_base_uri.trim_end_matches('/');
    let app = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    app.layer(axum::middleware::from_fn(middleware::log_errors))
        .with_state(state)
}
