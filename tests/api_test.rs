//! Tests for the REST API
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use racetimer::coordinator::api::create_router;
use racetimer::coordinator::{AppState, RaceCoordinator, ServerConfig};

fn app(coordinator: RaceCoordinator) -> Router {
    create_router(AppState::new(coordinator, ServerConfig::default()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
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
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

// ============================================================================
// Health and settings
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = app(common::coordinator(2, 10));

    let (status, body) = send(&app, Method::GET, "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["phase"], "Registration");
}

#[tokio::test]
async fn test_max_participants_round_trip() {
    let app = app(common::coordinator(2, 10));

    let (status, body) = send(&app, Method::GET, "/api/v1/race/max-participants", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["max_participants"], 2);

    let (status, body) = send(&app, Method::PUT, "/api/v1/race/max-participants/5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["max_participants"], 5);

    let (status, body) = send(&app, Method::PUT, "/api/v1/race/max-participants/0", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_setting");

    let (status, _) = send(&app, Method::PUT, "/api/v1/race/max-participants/-3", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_update_settings() {
    let app = app(common::coordinator(2, 10));

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/race/settings",
        Some(json!({"target_laps": 3, "finish_countdown_ms": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["target_laps"], 3);
    assert_eq!(body["data"]["finish_countdown_ms"], 500);
    assert_eq!(body["data"]["max_participants"], 2);

    let (_, body) = send(&app, Method::GET, "/api/v1/race/settings", None).await;
    assert_eq!(body["data"]["target_laps"], 3);
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_outcomes() {
    let app = app(common::coordinator(1, 10));

    let (status, body) = send(&app, Method::POST, "/api/v1/race/register/10.0.0.1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 1);

    let (status, body) = send(&app, Method::POST, "/api/v1/race/register/10.0.0.2", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "capacity_reached");

    let (status, body) = send(&app, Method::POST, "/api/v1/race/register/not-an-ip", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_identifier");
}

#[tokio::test]
async fn test_register_closed_during_countdown() {
    let app = app(common::coordinator(2, 10));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/race/start",
        Some(json!({"countdown_ms": 60_000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "StartCountdown");

    let (status, body) = send(&app, Method::POST, "/api/v1/race/register/10.0.0.1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "registration_closed");

    let (status, body) = send(&app, Method::POST, "/api/v1/race/countdown/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "Registration");
    assert_eq!(body["data"]["millis_remaining"], -1);
}

// ============================================================================
// Race flow
// ============================================================================

#[tokio::test]
async fn test_full_race_over_http() {
    let app = app(common::coordinator(2, 2));

    send(&app, Method::POST, "/api/v1/race/register/1.1.1.1", None).await;
    send(&app, Method::POST, "/api/v1/race/register/2.2.2.2", None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/race/start",
        Some(json!({"countdown_ms": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "InProgress");

    let laps = [
        json!({"identifier": "1.1.1.1", "lap_time": "00:01:01"}),
        json!({"identifier": "2.2.2.2", "lap_time_ms": 62000}),
        json!({"identifier": "1.1.1.1", "lap_time": "0:00:59.5"}),
    ];
    for lap in laps {
        let (status, _) = send(&app, Method::POST, "/api/v1/race/laps", Some(lap)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&app, Method::GET, "/api/v1/race/state", None).await;
    assert_eq!(body["data"]["phase"], "FinishCountdown");
    assert!(body["data"]["millis_remaining"].as_i64().unwrap() > 0);
    assert_eq!(body["data"]["countdown_ms"], 10_000);

    let (status, body) = send(&app, Method::GET, "/api/v1/race/results/last/1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "race_not_finished");

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/v1/race/laps",
        Some(json!({"identifier": "2.2.2.2", "lap_time_ms": 61000})),
    )
    .await;
    assert_eq!(body["data"]["phase"], "Finished");
    assert_eq!(body["data"]["lap"]["number"], 2);

    let (status, body) = send(&app, Method::GET, "/api/v1/race/results/last/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["place"], 1);
    assert_eq!(body["data"]["overall_time"], "00:02:00.500");
    assert_eq!(body["data"]["fastest_lap_number"], 2);

    let (_, body) = send(&app, Method::GET, "/api/v1/race/results", None).await;
    assert_eq!(body["data"][0]["finish_order"], json!([1, 2]));

    let (_, body) = send(&app, Method::GET, "/api/v1/race/results/current", None).await;
    assert_eq!(body["data"]["2"][0]["duration_ms"], 62000.0);

    let (_, body) = send(&app, Method::GET, "/api/v1/race/participants", None).await;
    assert_eq!(body["data"][1]["identifier"], "2.2.2.2");
    assert_eq!(body["data"][1]["lap_count"], 2);

    let (status, body) = send(&app, Method::POST, "/api/v1/race/registration/open", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "Registration");
}

#[tokio::test]
async fn test_lap_errors() {
    let app = app(common::coordinator(2, 2));
    send(&app, Method::POST, "/api/v1/race/register/1.1.1.1", None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/race/laps",
        Some(json!({"identifier": "1.1.1.1", "lap_time": "00:01:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_phase");

    send(&app, Method::POST, "/api/v1/race/start", Some(json!({"countdown_ms": 0}))).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/race/laps",
        Some(json!({"identifier": "9.9.9.9", "lap_time": "00:01:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "participant_not_found");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/race/laps",
        Some(json!({"identifier": "1.1.1.1", "lap_time": "00:61:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_lap_time");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/race/laps",
        Some(json!({"identifier": "1.1.1.1", "lap_time": "999999999999999"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_lap_time");
}

#[tokio::test]
async fn test_start_twice_conflicts() {
    let app = app(common::coordinator(2, 2));

    let (status, _) = send(&app, Method::POST, "/api/v1/race/start", Some(json!({"countdown_ms": 0}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::POST, "/api/v1/race/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_phase");

    let (status, body) = send(&app, Method::POST, "/api/v1/race/countdown/cancel", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "no_active_countdown");

    let (status, body) = send(&app, Method::POST, "/api/v1/race/finish", Some(json!({"countdown_ms": 0}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "Finished");
}

#[tokio::test]
async fn test_malformed_start_body() {
    let app = app(common::coordinator(2, 2));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/race/start")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_results_before_any_race() {
    let app = app(common::coordinator(2, 2));

    let (status, body) = send(&app, Method::GET, "/api/v1/race/results/last/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "no_race");

    let (status, body) = send(&app, Method::GET, "/api/v1/race/results/current", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({}));

    let (_, body) = send(&app, Method::GET, "/api/v1/race/state", None).await;
    assert_eq!(body["data"]["millis_remaining"], -1);
    assert_eq!(body["data"]["countdown_ms"], Value::Null);
    assert_eq!(body["data"]["race_count"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    racetimer::metrics::init_metrics().unwrap();
    let app = app(common::coordinator(2, 2));
    send(&app, Method::POST, "/api/v1/race/register/1.1.1.1", None).await;

    let request = Request::builder()
        .uri("/api/v1/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("racetimer_registrations_total"));
}
