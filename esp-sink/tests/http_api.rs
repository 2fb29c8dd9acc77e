use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use esp_sink::{router, EntryStore, ManualClock, TelemetrySink};

fn app() -> (Router, Arc<TelemetrySink>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ));
    let sink = Arc::new(TelemetrySink::new(
        Arc::new(EntryStore::new()),
        clock.clone(),
        Duration::from_secs(120),
    ));
    (router(sink.clone()), sink, clock)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post(app: &Router, body: &str, content_type: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/data/espa")
                .header("Content-Type", content_type)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn root_lists_endpoints() {
    let (app, _sink, _clock) = app();
    post(&app, r#"{"id": 1}"#, "application/json").await;

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "ESP BLE Server is running",
            "endpoints": {
                "POST /data/espa": "Send BLE data",
                "GET /data/espa": "Get current BLE data",
                "GET /data/history/espa": "Get all history"
            },
            "active_devices": 1
        })
    );
}

#[tokio::test]
async fn health_reports_liveness() {
    let (app, _sink, _clock) = app();
    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["active_devices"], json!(0));
    assert!(body["timestamp"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn json_post_is_echoed() {
    let (app, sink, _clock) = app();
    let (status, body) = post(&app, r#"{"mac": "AA:BB", "rssi": -55}"#, "application/json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["message"], json!("ESPA data received"));
    assert_eq!(body["received"], json!({"mac": "AA:BB", "rssi": -55}));
    let stored = sink.store().snapshot_active().unwrap();
    assert_eq!(body["timestamp"], json!(stored[0].display_time()));
}

#[tokio::test]
async fn plain_text_post_degrades_to_raw_body() {
    let (app, _sink, _clock) = app();
    let (status, body) = post(&app, "hello", "text/plain").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["received"], json!({"raw_body": "hello"}));
}

#[tokio::test]
async fn json_without_json_content_type_is_still_parsed() {
    let (app, _sink, _clock) = app();
    let (_, body) = post(&app, r#"{"temp": 20}"#, "text/plain").await;
    assert_eq!(body["received"], json!({"temp": 20}));
}

#[tokio::test]
async fn active_query_returns_entry_shape() {
    let (app, _sink, _clock) = app();
    post(&app, r#"{"rssi": -40}"#, "application/json").await;

    let (status, body) = get(&app, "/data/espa").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["esp_type"], json!("ESPA"));
    assert_eq!(body["active_devices"], json!(1));

    let device = &body["devices"][0];
    assert_eq!(device["esp_type"], json!("ESPA"));
    assert!(device["timestamp"].is_f64());
    assert_eq!(device["formatted_timestamp"].as_str().unwrap().len(), 19);
    assert_eq!(device["data"], json!({"rssi": -40}));
}

#[tokio::test]
async fn history_is_most_recent_first() {
    let (app, _sink, clock) = app();
    for n in 1..=3 {
        post(&app, &format!(r#"{{"n": {}}}"#, n), "application/json").await;
        clock.advance(chrono::Duration::seconds(10));
    }

    let (status, body) = get(&app, "/data/history/espa").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["esp_type"], json!("ESPA"));
    assert_eq!(body["total_logs"], json!(3));
    let order: Vec<i64> = body["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|log| log["data"]["n"].as_i64().unwrap())
        .collect();
    assert_eq!(order, vec![3, 2, 1]);
}

#[tokio::test]
async fn stale_entry_leaves_active_but_stays_in_history() {
    let (app, _sink, clock) = app();
    post(&app, r#"{"device": "old"}"#, "application/json").await;

    clock.advance(chrono::Duration::seconds(121));

    let (_, active) = get(&app, "/data/espa").await;
    assert_eq!(active["active_devices"], json!(0));
    assert_eq!(active["devices"], json!([]));

    let (_, history) = get(&app, "/data/history/espa").await;
    assert_eq!(history["total_logs"], json!(1));
    assert_eq!(history["logs"][0]["data"], json!({"device": "old"}));
}

#[tokio::test]
async fn root_count_is_not_swept() {
    let (app, _sink, clock) = app();
    post(&app, "{}", "application/json").await;
    clock.advance(chrono::Duration::seconds(300));

    let (_, root) = get(&app, "/").await;
    assert_eq!(root["active_devices"], json!(1));

    get(&app, "/data/espa").await;
    let (_, health) = get(&app, "/health").await;
    assert_eq!(health["active_devices"], json!(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingestion_lands_every_entry_once() {
    let (app, sink, _clock) = app();
    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let (status, _) = post(&app, &format!(r#"{{"i": {}}}"#, i), "application/json").await;
                assert_eq!(status, StatusCode::OK);
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let (_, history) = get(&app, "/data/history/espa").await;
    assert_eq!(history["total_logs"], json!(64));
    let active = sink.store().snapshot_active().unwrap();
    let stored = sink.store().snapshot_history_in_insertion_order().unwrap();
    assert!(active.len() <= 64);
    assert_eq!(active, stored);
}

#[tokio::test]
async fn large_body_is_accepted() {
    let (app, sink, _clock) = app();
    let big = "x".repeat(3 * 1024 * 1024);
    let (status, body) = post(&app, &big, "text/plain").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["received"]["raw_body"].as_str().unwrap().len(), big.len());
    assert_eq!(sink.store().history_len().unwrap(), 1);
}
