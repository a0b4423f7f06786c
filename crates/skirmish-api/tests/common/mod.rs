//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use skirmish_combat::domain::resources::HpStatusPolicy;
use skirmish_core::clock::Clock;
use skirmish_core::repository::DocumentRepository;
use skirmish_core::rng::DeterministicRng;
use skirmish_test_support::{FixedClock, SequenceRng};
use tower::ServiceExt;

use skirmish_api::routes;
use skirmish_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock + Send + Sync> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Build the full app router over `repository` with a deterministic clock and
/// an RNG that must not be consulted. Uses the same route tree as `main.rs`.
pub fn build_test_app(repository: Arc<dyn DocumentRepository>) -> Router {
    build_test_app_with_rng(repository, SequenceRng::new(vec![]))
}

/// Build the full app router with a custom `SequenceRng` for tests that roll
/// initiative.
pub fn build_test_app_with_rng(
    repository: Arc<dyn DocumentRepository>,
    rng: SequenceRng,
) -> Router {
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(rng));
    let app_state = AppState::new(fixed_clock(), rng, repository, HpStatusPolicy::default());

    routes::app_router().with_state(app_state)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
