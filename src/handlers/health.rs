//! Liveness and database health endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::{db::health::HealthReport, state::AppState};

#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub message: &'static str,
}

/// `GET /api`
pub async fn hello_world() -> Json<HelloResponse> {
    Json(HelloResponse {
        message: "Hello World",
    })
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "up",
///   "message": "It's healthy",
///   "open_connections": 3,
///   "in_use": 1,
///   "idle": 2,
///   "wait_count": 0,
///   "wait_duration": "0s",
///   "max_idle_closed": 0,
///   "max_lifetime_closed": 0
/// }
/// ```
///
/// # Response (503 Service Unavailable)
///
/// ```json
/// { "status": "down", "error": "db down: pool timed out while waiting for an open connection" }
/// ```
///
/// With `HEALTH_EXIT_ON_DOWN=true` the process exits instead, leaving
/// recovery to the supervisor.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.db.health().await;

    if let Some(code) = exit_code(&report, state.health_exit_on_down) {
        tracing::error!(error = ?report.error, "Database is down, exiting");
        std::process::exit(code);
    }

    if report.is_up() {
        (StatusCode::OK, Json(report))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(report))
    }
}

/// Exit status for the process after `report`, or `None` to keep serving.
///
/// Only a down report with `HEALTH_EXIT_ON_DOWN` set terminates.
fn exit_code(report: &HealthReport, exit_on_down: bool) -> Option<i32> {
    (exit_on_down && !report.is_up()).then_some(1)
}
