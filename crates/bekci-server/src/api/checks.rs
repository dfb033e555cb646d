use crate::api::{error_response, storage_error, success_empty_response, success_response};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bekci_common::types::CheckKind;
use bekci_storage::CheckRow;
use chrono::Utc;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Deserialize)]
pub struct CheckPayload {
    pub kind: Option<String>,
    pub name: String,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
    #[serde(default = "default_interval_s")]
    pub interval_s: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_config() -> serde_json::Value {
    serde_json::json!({})
}

fn default_interval_s() -> i64 {
    300
}

fn default_enabled() -> bool {
    true
}

pub async fn create_check(
    State(state): State<AppState>,
    Path(target_id): Path<String>,
    Json(payload): Json<CheckPayload>,
) -> impl IntoResponse {
    let Some(kind) = payload.kind.as_deref() else {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "kind is required");
    };
    if CheckKind::from_str(kind).is_err() {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "unknown check kind");
    }
    if payload.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "name is required");
    }
    if !payload.config.is_object() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "config must be an object",
        );
    }
    if state
        .store
        .get_target(&target_id)
        .await
        .ok()
        .flatten()
        .is_none()
    {
        return error_response(StatusCode::NOT_FOUND, "not_found", "Target not found");
    }

    let row = CheckRow {
        id: bekci_common::id::next_id(),
        target_id,
        kind: kind.to_string(),
        name: payload.name.trim().to_string(),
        config: payload.config.to_string(),
        interval_s: payload.interval_s.max(10),
        enabled: payload.enabled,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    match state.store.insert_check(&row).await {
        Ok(created) => {
            state.scheduler.reload().await;
            success_response(StatusCode::CREATED, created)
        }
        Err(e) => storage_error("Failed to create check", e),
    }
}

pub async fn update_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CheckPayload>,
) -> impl IntoResponse {
    if payload.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "name is required");
    }
    if !payload.config.is_object() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "config must be an object",
        );
    }

    let row = CheckRow {
        id: id.clone(),
        target_id: String::new(),
        kind: String::new(),
        name: payload.name.trim().to_string(),
        config: payload.config.to_string(),
        interval_s: payload.interval_s.max(10),
        enabled: payload.enabled,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    match state.store.update_check(&id, &row).await {
        Ok(Some(updated)) => {
            state.scheduler.reload().await;
            success_response(StatusCode::OK, updated)
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found", "Check not found"),
        Err(e) => storage_error("Failed to update check", e),
    }
}

pub async fn delete_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_check(&id).await {
        Ok(true) => {
            state.scheduler.reload().await;
            success_empty_response(StatusCode::OK, "deleted")
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "not_found", "Check not found"),
        Err(e) => storage_error("Failed to delete check", e),
    }
}

/// Queue an immediate run; lossy by design.
pub async fn run_check_now(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_check(&id).await {
        Ok(Some(_)) => {
            state.scheduler.run_now(&id);
            success_empty_response(StatusCode::ACCEPTED, "queued")
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found", "Check not found"),
        Err(e) => storage_error("Failed to get check", e),
    }
}

#[derive(Deserialize)]
pub struct ResultsQuery {
    #[serde(default = "default_hours")]
    pub hours: i64,
}

fn default_hours() -> i64 {
    24
}

pub async fn check_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> impl IntoResponse {
    let hours = query.hours.clamp(1, 24 * 90);
    match state.store.get_recent_results(&id, hours).await {
        Ok(results) => success_response(StatusCode::OK, results),
        Err(e) => storage_error("Failed to list results", e),
    }
}

#[derive(Deserialize)]
pub struct UptimeQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

pub async fn check_uptime(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UptimeQuery>,
) -> impl IntoResponse {
    let days = query.days.clamp(1, 365);
    match state.store.get_uptime_percent(&id, days).await {
        Ok(pct) => success_response(
            StatusCode::OK,
            serde_json::json!({ "days": days, "uptime_pct": pct }),
        ),
        Err(e) => storage_error("Failed to compute uptime", e),
    }
}
