use crate::api::{error_response, storage_error, success_empty_response, success_response};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

#[derive(Serialize)]
struct HistoryResponse {
    items: Vec<bekci_storage::AlertHistoryItem>,
    total: u64,
    limit: u64,
    offset: u64,
}

pub async fn alert_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.clamp(1, 500);
    match state.store.list_alert_history(limit, query.offset).await {
        Ok((items, total)) => success_response(
            StatusCode::OK,
            HistoryResponse {
                items,
                total,
                limit,
                offset: query.offset,
            },
        ),
        Err(e) => storage_error("Failed to list alert history", e),
    }
}

#[derive(Deserialize)]
pub struct TestAlertPayload {
    pub to: String,
}

pub async fn send_test_alert(
    State(state): State<AppState>,
    Json(payload): Json<TestAlertPayload>,
) -> impl IntoResponse {
    if payload.to.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "to is required");
    }
    match state.alerter.send_test_email(payload.to.trim()).await {
        Ok(()) => success_empty_response(StatusCode::OK, "test email sent"),
        Err(e) => {
            tracing::warn!(error = %e, "Test email failed");
            error_response(StatusCode::BAD_REQUEST, "bad_request", &e.to_string())
        }
    }
}
