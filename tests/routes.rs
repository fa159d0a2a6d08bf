mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{FakeUpstream, START, vehicle};
use onrail::cache::keys::{MOTD, config_path};
use onrail::cache::{MemoryLocalCache, MemoryRemoteCache, RemoteCache};
use onrail::clock::ManualClock;
use onrail::config::Config;
use onrail::utils::error_codes;
use onrail::{AppState, router};

struct TestApp {
    app: Router,
    clock: Arc<ManualClock>,
    remote: Arc<MemoryRemoteCache>,
    upstream: Arc<FakeUpstream>,
}

fn test_app() -> TestApp {
    let clock = Arc::new(ManualClock::new(START));
    let remote = Arc::new(MemoryRemoteCache::new(clock.clone()));
    let upstream = Arc::new(FakeUpstream::new(vec![vehicle("10"), vehicle("2")]));
    let state = AppState::new(
        Config::default(),
        Arc::new(MemoryLocalCache::new()),
        remote.clone(),
        upstream.clone(),
        clock.clone(),
    );
    TestApp {
        app: router(state),
        clock,
        remote,
        upstream,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn trains_are_served_sorted_in_envelope() {
    let t = test_app();

    let (status, body) = call(&t.app, "GET", "/api/trains", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], error_codes::SUCCESS);
    let names: Vec<&str> = body["resp_data"]["trains"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["trip"]["tripShortName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["2", "10"]);
    assert_eq!(body["resp_data"]["lastUpdated"], START);
}

#[tokio::test]
async fn offline_flag_stops_upstream_calls() {
    let t = test_app();

    let (status, body) = call(&t.app, "PUT", "/api/connectivity", Some(json!({"online": false}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["online"], false);

    let (_, body) = call(&t.app, "GET", "/api/trains", None).await;
    assert_eq!(body["resp_data"]["trains"], json!([]));
    assert_eq!(t.upstream.calls(), 0);
}

#[tokio::test]
async fn cache_status_and_clear() {
    let t = test_app();
    call(&t.app, "GET", "/api/trains", None).await;

    let (_, body) = call(&t.app, "GET", "/api/trains/cache", None).await;
    assert_eq!(body["resp_data"], json!({"ageMillis": 0, "stale": false}));

    let (status, body) = call(&t.app, "DELETE", "/api/trains/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["ageMillis"], 0);
}

#[tokio::test]
async fn send_message_then_hit_rate_limit() {
    let t = test_app();
    let uri = "/api/chats/train/2613/messages";

    let (status, body) = call(
        &t.app,
        "POST",
        uri,
        Some(json!({"senderId": "u1", "senderName": "Anna", "content": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["resp_data"]["content"], "hello");
    assert_eq!(body["resp_data"]["timestamp"], START);
    let key = body["resp_data"]["key"].as_str().unwrap().to_string();

    let (status, body) = call(
        &t.app,
        "POST",
        uri,
        Some(json!({"senderId": "u1", "content": "again"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], error_codes::RATE_LIMIT);

    let (status, _) = call(
        &t.app,
        "DELETE",
        &format!("/api/chats/train/2613/messages/{}", key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(t.remote.get("chats").await.unwrap(), None);
}

#[tokio::test]
async fn report_id_fills_in_predefined_content() {
    let t = test_app();

    let (status, body) = call(
        &t.app,
        "POST",
        "/api/chats/territory/Pest/messages",
        Some(json!({"senderId": "u1", "reportId": "REPORT_TRAIN_STOPPED"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["resp_data"]["messageType"], "report");
    assert_eq!(body["resp_data"]["content"], "Vonat megállt");
}

#[tokio::test]
async fn invalid_requests_are_validation_errors() {
    let t = test_app();

    let (status, body) = call(
        &t.app,
        "POST",
        "/api/chats/bus/1/messages",
        Some(json!({"senderId": "u1", "content": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], error_codes::VALIDATION_ERROR);

    let (status, body) = call(
        &t.app,
        "POST",
        "/api/chats/train/1/messages",
        Some(json!({"senderId": "u1", "content": "x".repeat(501)})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], error_codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn reports_relevance_and_eviction_endpoints() {
    let t = test_app();

    let (_, body) = call(&t.app, "GET", "/api/chats/reports", None).await;
    assert_eq!(body["resp_data"].as_array().unwrap().len(), 14);

    call(
        &t.app,
        "POST",
        "/api/chats/train/2613/messages",
        Some(json!({"senderId": "u1", "content": "hi"})),
    )
    .await;
    let (_, body) = call(&t.app, "GET", "/api/chats/relevance", None).await;
    assert_eq!(body["resp_data"]["train"]["2613"], START);

    let (_, body) = call(&t.app, "POST", "/api/chats/evict", None).await;
    assert_eq!(
        body["resp_data"],
        json!({"scanned": 1, "removed": 0, "failed": 0})
    );
}

#[tokio::test]
async fn config_reads_remote_values_with_defaults() {
    let t = test_app();
    t.remote
        .set(&config_path(MOTD), json!("Jó utat!").into())
        .await
        .unwrap();

    let (_, body) = call(&t.app, "GET", "/api/config", None).await;

    assert_eq!(body["resp_data"]["motd"], "Jó utat!");
    assert_eq!(body["resp_data"]["emmaApiCallCooldown"], 60_000);
    assert_eq!(body["resp_data"]["wisecracks"], json!([]));

    let (_, body) = call(&t.app, "GET", "/api/territories", None).await;
    assert_eq!(body["resp_data"].as_array().unwrap().len(), 21);
}

#[tokio::test]
async fn delete_removes_only_the_addressed_message() {
    let t = test_app();
    let uri = "/api/chats/train/2613/messages";

    let (_, first) = call(&t.app, "POST", uri, Some(json!({"senderId": "u1", "content": "one"}))).await;
    t.clock.advance(Duration::from_secs(5));
    let (_, second) = call(&t.app, "POST", uri, Some(json!({"senderId": "u1", "content": "two"}))).await;
    let first_key = first["resp_data"]["key"].as_str().unwrap();
    let second_key = second["resp_data"]["key"].as_str().unwrap();

    let (status, _) = call(&t.app, "DELETE", &format!("{}/{}", uri, first_key), None).await;
    assert_eq!(status, StatusCode::OK);

    let room = t.remote.get("chats/train/2613").await.unwrap().unwrap();
    let keys: Vec<&String> = room.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec![second_key]);
}

#[tokio::test]
async fn delete_with_encoded_slash_in_key_is_rejected() {
    let t = test_app();
    let uri = "/api/chats/train/2613/messages";
    let (_, sent) = call(&t.app, "POST", uri, Some(json!({"senderId": "u1", "content": "stay"}))).await;
    let key = sent["resp_data"]["key"].as_str().unwrap().to_string();

    for bad in ["%2F".to_string(), format!("{}%2Fcontent", key)] {
        let (status, body) = call(&t.app, "DELETE", &format!("{}/{}", uri, bad), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], error_codes::VALIDATION_ERROR);
    }

    let room = t.remote.get("chats/train/2613").await.unwrap().unwrap();
    assert_eq!(room[key.as_str()]["content"], "stay");
}
