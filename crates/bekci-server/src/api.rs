pub mod alerts;
pub mod checks;
pub mod dashboard;
pub mod settings;
pub mod targets;
pub mod users;

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

/// Uniform JSON response envelope.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub err_code: i32,
    pub err_msg: String,
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn success_empty_response(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: 0,
            err_msg: msg.to_string(),
            data: None,
        }),
    )
        .into_response()
}

fn to_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "conflict" => 1005,
        "storage_error" => 1501,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_error_code(code),
            err_msg: msg.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// 500 with a logged storage error.
pub fn storage_error(context: &str, e: anyhow::Error) -> Response {
    tracing::error!(error = %e, "{context}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "storage_error",
        "Database error",
    )
}

#[derive(Serialize)]
struct HealthResponse {
    version: String,
    uptime_secs: i64,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    success_response(
        StatusCode::OK,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
        },
    )
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/targets", get(targets::list_targets).post(targets::create_target))
        .route(
            "/api/targets/:id",
            get(targets::get_target)
                .put(targets::update_target)
                .delete(targets::delete_target),
        )
        .route("/api/targets/:id/conditions", put(targets::put_conditions))
        .route("/api/targets/:id/recipients", put(targets::put_recipients))
        .route("/api/targets/:id/checks", post(checks::create_check))
        .route(
            "/api/checks/:id",
            put(checks::update_check).delete(checks::delete_check),
        )
        .route("/api/checks/:id/run", post(checks::run_check_now))
        .route("/api/checks/:id/results", get(checks::check_results))
        .route("/api/checks/:id/uptime", get(checks::check_uptime))
        .route("/api/alerts/history", get(alerts::alert_history))
        .route("/api/alerts/test", post(alerts::send_test_alert))
        .route(
            "/api/settings",
            get(settings::get_settings).put(settings::put_settings),
        )
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/dashboard", get(dashboard::dashboard))
        .with_state(state)
}
