use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::stream;
use tokio::sync::mpsc;

use super::model::{RoomEvent, SendMessageRequest, parse_room};
use crate::AppState;
use crate::cache::ChildEventKind;
use crate::cache::keys::is_valid_segment;
use crate::chat::{MessageCallback, SendError};
use crate::models::{Message, REPORT_OPTIONS};
use crate::utils::{error_codes, error_to_api_response, success_to_api_response};

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Path((room_type, room_id)): Path<(String, String)>,
    Json(req): Json<SendMessageRequest>,
) -> impl IntoResponse {
    let room = match parse_room(&room_type, &room_id) {
        Ok(room) => room,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response(error_codes::VALIDATION_ERROR, msg),
            );
        }
    };
    let new_message = match req.into_new_message() {
        Ok(new_message) => new_message,
        Err(msg) => {
            return (
                StatusCode::OK,
                error_to_api_response(error_codes::VALIDATION_ERROR, msg),
            );
        }
    };

    match state.gateway.try_send(&room, new_message).await {
        Ok(message) => (StatusCode::CREATED, success_to_api_response(message)),
        Err(e @ SendError::CoolingDown { .. }) => (
            StatusCode::OK,
            error_to_api_response(error_codes::RATE_LIMIT, e.to_string()),
        ),
        Err(e @ (SendError::ContentTooLong { .. } | SendError::InvalidRoom(_))) => (
            StatusCode::OK,
            error_to_api_response(error_codes::VALIDATION_ERROR, e.to_string()),
        ),
        Err(SendError::Storage(e)) => {
            tracing::error!("Failed to store message in {}: {}", room, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn remove_message(
    State(state): State<AppState>,
    Path((room_type, room_id, key)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let room = match parse_room(&room_type, &room_id) {
        Ok(room) => room,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response(error_codes::VALIDATION_ERROR, msg),
            );
        }
    };

    if !is_valid_segment(&key) {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                format!("invalid message key: {:?}", key),
            ),
        );
    }

    if state.gateway.remove_message(&room, &key).await {
        (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({ "key": key })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(
                error_codes::INTERNAL_ERROR,
                format!("failed to remove message {}", key),
            ),
        )
    }
}

/// 房间消息的 SSE 推送，连接断开即取消订阅
#[axum::debug_handler]
pub async fn room_events(
    State(state): State<AppState>,
    Path((room_type, room_id)): Path<(String, String)>,
) -> Response {
    let room = match parse_room(&room_type, &room_id) {
        Ok(room) => room,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response::<()>(error_codes::VALIDATION_ERROR, msg),
            )
                .into_response();
        }
    };

    let (tx, rx) = mpsc::unbounded_channel::<RoomEvent>();
    let on_added = forward(tx.clone(), ChildEventKind::Added);
    let on_removed = forward(tx, ChildEventKind::Removed);

    let subscription = match state.gateway.subscribe(&room, on_added, on_removed).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!("Failed to subscribe to {}: {}", room, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>(error_codes::INTERNAL_ERROR, e.to_string()),
            )
                .into_response();
        }
    };
    tracing::debug!("SSE client connected to {}", room);

    // 订阅句柄随流一起存活
    let events = stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        let event = rx.recv().await?;
        let sse = match Event::default()
            .event(event.event_name())
            .json_data(&event.message)
        {
            Ok(sse) => sse,
            Err(e) => {
                tracing::warn!("Failed to encode room event: {}", e);
                Event::default().comment("encoding error")
            }
        };
        Some((Ok::<_, Infallible>(sse), (rx, subscription)))
    });

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn forward(tx: mpsc::UnboundedSender<RoomEvent>, kind: ChildEventKind) -> MessageCallback {
    Arc::new(move |message: Message| {
        // 接收端已关闭说明连接已断开
        let _ = tx.send(RoomEvent { kind, message });
    })
}

#[axum::debug_handler]
pub async fn get_relevances(State(state): State<AppState>) -> impl IntoResponse {
    let relevances = state.gateway.chat_relevances().await;
    (StatusCode::OK, success_to_api_response(relevances))
}

#[axum::debug_handler]
pub async fn evict_old_messages(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.gateway.evict_old_messages().await;
    (StatusCode::OK, success_to_api_response(summary))
}

#[axum::debug_handler]
pub async fn get_reports() -> impl IntoResponse {
    (StatusCode::OK, success_to_api_response(REPORT_OPTIONS.to_vec()))
}
