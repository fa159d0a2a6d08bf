use axum::{extract::State, http::StatusCode, response::IntoResponse};

use super::model::ClientConfig;
use crate::AppState;
use crate::clock::millis;
use crate::models::TERRITORIES;
use crate::utils::success_to_api_response;

#[axum::debug_handler]
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let default_cooldown = millis(state.coordinator.stale_threshold());
    let config = ClientConfig::load(&state.remote_config, default_cooldown).await;
    (StatusCode::OK, success_to_api_response(config))
}

#[axum::debug_handler]
pub async fn get_territories() -> impl IntoResponse {
    (StatusCode::OK, success_to_api_response(TERRITORIES.to_vec()))
}
