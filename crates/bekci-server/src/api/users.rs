use crate::api::{error_response, storage_error, success_response};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bekci_storage::UserRow;
use chrono::Utc;
use serde::Deserialize;

pub async fn list_users(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_users().await {
        Ok(users) => success_response(StatusCode::OK, users),
        Err(e) => storage_error("Failed to list users", e),
    }
}

#[derive(Deserialize)]
pub struct UserPayload {
    pub username: String,
    #[serde(default)]
    pub email: String,
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserPayload>,
) -> impl IntoResponse {
    if payload.username.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "username is required");
    }

    let row = UserRow {
        id: bekci_common::id::next_id(),
        username: payload.username.trim().to_string(),
        email: payload.email.trim().to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    match state.store.create_user(&row).await {
        Ok(created) => success_response(StatusCode::CREATED, created),
        Err(e) => {
            tracing::warn!(username = %row.username, error = %e, "Failed to create user");
            error_response(
                StatusCode::CONFLICT,
                "conflict",
                "User could not be created (duplicate username?)",
            )
        }
    }
}
