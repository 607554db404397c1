//! Integration tests for the control API endpoints.
//!
//! Tests drive the `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The clock runs on a manual scheduler so wall
//! time only moves when a test says so.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use timekeeper_api::router::build_router;
use timekeeper_api::state::AppState;
use timekeeper_core::Timekeeper;
use timekeeper_core::config::TimekeeperConfig;
use timekeeper_core::manual::{ManualClock, ManualScheduler};
use timekeeper_core::sink::{BroadcastSink, EventSink};
use timekeeper_core::timer::Scheduler;
use timekeeper_types::{ClockEvent, TimeCommand};
use tower::ServiceExt;

/// 2024-01-01T00:00:00Z.
const NEW_YEAR_2024: i64 = 1_704_067_200_000;

const WALL_ORIGIN: i64 = 1_700_000_000_000;

struct TestApp {
    state: Arc<AppState>,
    scheduler: Arc<ManualScheduler>,
}

impl TestApp {
    fn new(start: &str, zip: &str) -> Self {
        let mut config = TimekeeperConfig::default();
        config.clock.start_date = start.to_owned();
        config.clock.zip_factor = zip.to_owned();
        config.clock.timezone_name = "UTC".to_owned();

        let clock = Arc::new(ManualClock::new(WALL_ORIGIN));
        let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
        let sink = Arc::new(BroadcastSink::new(64));
        let keeper = Timekeeper::new(
            &config,
            Arc::clone(&scheduler) as Arc<dyn Scheduler>,
            clock,
            Arc::clone(&sink) as Arc<dyn EventSink>,
        );
        keeper.start().unwrap();
        let state = Arc::new(AppState::new(keeper, &sink));
        Self { state, scheduler }
    }

    async fn call(&self, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let app = build_router(Arc::clone(&self.state));
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_owned()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_to_json(response.into_body()).await)
    }
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_time_reports_initialized_clock() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    let (status, json) = app.call("GET", "/api/time", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["timestamp"], NEW_YEAR_2024);
    assert_eq!(json["tzOffsetHours"], 0);
    assert_eq!(json["zip"], 4);
    assert_eq!(json["status"], "INITIALIZED");
}

#[tokio::test]
async fn start_then_time_moves_at_zip() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    let (status, json) = app.call("POST", "/api/time/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["status"], "RUNNING");
    assert_eq!(json["timestamp"], NEW_YEAR_2024);

    app.scheduler.advance(1_000);
    let (_, json) = app.call("GET", "/api/time", None).await;
    assert_eq!(json["timestamp"], NEW_YEAR_2024 + 4_000);
}

#[tokio::test]
async fn pause_before_start_is_a_conflict() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    let (status, json) = app.call("POST", "/api/time/pause", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["ok"], false);
    assert_eq!(json["status"], "INITIALIZED");
    assert_eq!(json["timestamp"], NEW_YEAR_2024);
    assert!(json["message"].as_str().unwrap().contains("INITIALIZED"));
}

#[tokio::test]
async fn pass_through_refuses_pause() {
    let app = TestApp::new("actual", "x1");
    let (status, json) = app.call("POST", "/api/time/pause", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["ok"], false);
    assert_eq!(json["status"], "RUNNING");
    assert_eq!(json["timestamp"], WALL_ORIGIN);
}

#[tokio::test]
async fn full_control_cycle() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    for (uri, expected) in [
        ("/api/time/start", "RUNNING"),
        ("/api/time/pause", "IDLE"),
        ("/api/time/resume", "RUNNING"),
        ("/api/time/stop", "STOPPED"),
        ("/api/time/init", "INITIALIZED"),
    ] {
        let (status, json) = app.call("POST", uri, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(json["status"], expected, "{uri}");
    }
}

#[tokio::test]
async fn properties_get_and_put() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    let (status, json) = app.call("GET", "/api/properties", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["startDate"], NEW_YEAR_2024);
    assert_eq!(json["zip"], 4);

    let (status, json) = app
        .call(
            "PUT",
            "/api/properties",
            Some(r#"{"timezone":"UTC","start":"2024-06-21 12:00:00","zip":"x60"}"#),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["startDate"], 1_718_971_200_000_i64);
    assert_eq!(json["zip"], 60);
    assert_eq!(json["status"], "INITIALIZED");
}

#[tokio::test]
async fn put_properties_keeps_missing_fields() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    let (status, json) = app
        .call("PUT", "/api/properties", Some(r#"{"zip":8}"#))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["startDate"], NEW_YEAR_2024);
    assert_eq!(json["zip"], 8);
}

#[tokio::test]
async fn malformed_properties_body_is_bad_request() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    let (status, json) = app
        .call("PUT", "/api/properties", Some("{not json"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    assert!(json["error"].as_str().unwrap().starts_with("bad request"));
}

#[tokio::test]
async fn daylight_before_start_is_unknown() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    let (status, json) = app.call("GET", "/api/daylight", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["isDaytime"].is_null());
    assert!(json["nextCheckVirtualTime"].is_null());
}

#[tokio::test]
async fn daylight_after_start_has_a_flag() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    app.call("POST", "/api/time/start", None).await;
    let (_, json) = app.call("GET", "/api/daylight", None).await;
    // Midnight UTC in January is dark in England.
    assert_eq!(json["isDaytime"], false);
    assert!(json["nextCheckVirtualTime"].as_i64().unwrap() > NEW_YEAR_2024);
}

#[tokio::test]
async fn control_calls_are_broadcast() {
    let app = TestApp::new("2024-01-01 00:00:00", "x4");
    let mut rx = app.state.subscribe();
    app.call("POST", "/api/time/start", None).await;

    let event = rx.recv().await.unwrap();
    let tic = event.as_tic().unwrap();
    assert_eq!(tic.command(), TimeCommand::Start);
    assert!(matches!(rx.recv().await.unwrap(), ClockEvent::Daylight(_)));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = TestApp::new("actual", "x1");
    let response = build_router(Arc::clone(&app.state))
        .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
