use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::{CacheStatus, ConnectivityRequest, ConnectivityStatus};
use crate::AppState;
use crate::freshness::Connectivity;
use crate::utils::{error_codes, error_to_api_response, success_to_api_response};

#[axum::debug_handler]
pub async fn get_trains(State(state): State<AppState>) -> impl IntoResponse {
    let data = state.coordinator.get_data().await;
    (StatusCode::OK, success_to_api_response(data))
}

#[axum::debug_handler]
pub async fn get_cache_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = CacheStatus {
        age_millis: state.coordinator.cache_age(),
        stale: state.coordinator.is_stale(),
    };
    (StatusCode::OK, success_to_api_response(status))
}

#[axum::debug_handler]
pub async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    match state.coordinator.clear_cache() {
        Ok(()) => {
            tracing::info!("Local train cache cleared");
            let status = CacheStatus {
                age_millis: state.coordinator.cache_age(),
                stale: state.coordinator.is_stale(),
            };
            (StatusCode::OK, success_to_api_response(status))
        }
        Err(e) => {
            tracing::error!("Failed to clear local train cache: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn set_connectivity(
    State(state): State<AppState>,
    Json(req): Json<ConnectivityRequest>,
) -> impl IntoResponse {
    state.connectivity.set_online(req.online);
    (
        StatusCode::OK,
        success_to_api_response(ConnectivityStatus {
            online: state.connectivity.is_online(),
        }),
    )
}
