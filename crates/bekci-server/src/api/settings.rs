use crate::api::{storage_error, success_empty_response, success_response};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::collections::HashMap;

pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_all_settings().await {
        Ok(mut settings) => {
            // Never echo the provider credential back to the frontend.
            if settings
                .get("resend_api_key")
                .is_some_and(|v| !v.is_empty())
            {
                settings.insert("resend_api_key".to_string(), "***".to_string());
            }
            success_response(StatusCode::OK, settings)
        }
        Err(e) => storage_error("Failed to read settings", e),
    }
}

pub async fn put_settings(
    State(state): State<AppState>,
    Json(payload): Json<HashMap<String, String>>,
) -> impl IntoResponse {
    // The redacted placeholder must not overwrite a stored credential.
    let mut kv = payload;
    if kv.get("resend_api_key").is_some_and(|v| v == "***") {
        kv.remove("resend_api_key");
    }

    match state.store.set_settings(&kv).await {
        Ok(()) => success_empty_response(StatusCode::OK, "settings updated"),
        Err(e) => storage_error("Failed to update settings", e),
    }
}
