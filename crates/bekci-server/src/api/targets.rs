use crate::api::{error_response, storage_error, success_empty_response, success_response};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bekci_common::types::CATEGORIES;
use bekci_storage::store::rules::ConditionInput;
use bekci_storage::{CheckRow, RuleConditionRow, RuleStateRow, TargetRow, UserRow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Deserialize)]
pub struct TargetPayload {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_preferred_check_type")]
    pub preferred_check_type: String,
}

fn default_enabled() -> bool {
    true
}

fn default_category() -> String {
    "Other".to_string()
}

fn default_preferred_check_type() -> String {
    "ping".to_string()
}

#[derive(Serialize)]
pub struct TargetSummary {
    #[serde(flatten)]
    pub target: TargetRow,
    pub state: Option<String>,
}

#[derive(Serialize)]
pub struct TargetDetail {
    #[serde(flatten)]
    pub target: TargetRow,
    pub checks: Vec<CheckRow>,
    pub conditions: Vec<RuleConditionRow>,
    pub state: Option<RuleStateRow>,
    pub recipients: Vec<UserRow>,
}

fn validate_payload(payload: &TargetPayload) -> Option<&'static str> {
    if payload.name.trim().is_empty() {
        return Some("name is required");
    }
    if payload.host.trim().is_empty() {
        return Some("host is required");
    }
    if !CATEGORIES.contains(&payload.category.as_str()) {
        return Some("unknown category");
    }
    None
}

pub async fn list_targets(State(state): State<AppState>) -> impl IntoResponse {
    let targets = match state.store.list_targets().await {
        Ok(t) => t,
        Err(e) => return storage_error("Failed to list targets", e),
    };

    let mut items = Vec::with_capacity(targets.len());
    for target in targets {
        let state_str = match &target.rule_id {
            Some(rule_id) => match state.store.get_rule_state(rule_id).await {
                Ok(s) => s.map(|s| s.current_state),
                Err(e) => return storage_error("Failed to read rule state", e),
            },
            None => None,
        };
        items.push(TargetSummary {
            target,
            state: state_str,
        });
    }
    success_response(StatusCode::OK, items)
}

pub async fn create_target(
    State(state): State<AppState>,
    Json(payload): Json<TargetPayload>,
) -> impl IntoResponse {
    if let Some(msg) = validate_payload(&payload) {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", msg);
    }

    let row = TargetRow {
        id: bekci_common::id::next_id(),
        name: payload.name.trim().to_string(),
        host: payload.host.trim().to_string(),
        description: payload.description,
        enabled: payload.enabled,
        category: payload.category,
        preferred_check_type: payload.preferred_check_type,
        operator: "AND".to_string(),
        rule_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    match state.store.insert_target(&row).await {
        Ok(created) => success_response(StatusCode::CREATED, created),
        Err(e) => {
            // UNIQUE(name) violations surface here.
            tracing::warn!(name = %row.name, error = %e, "Failed to create target");
            error_response(
                StatusCode::CONFLICT,
                "conflict",
                "Target could not be created (duplicate name?)",
            )
        }
    }
}

pub async fn get_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let target = match state.store.get_target(&id).await {
        Ok(Some(t)) => t,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "not_found", "Target not found"),
        Err(e) => return storage_error("Failed to get target", e),
    };

    let checks = match state.store.list_checks_by_target(&id).await {
        Ok(c) => c,
        Err(e) => return storage_error("Failed to list checks", e),
    };
    let (conditions, rule_state) = match &target.rule_id {
        Some(rule_id) => {
            let conditions = match state.store.list_rule_conditions(rule_id).await {
                Ok(c) => c,
                Err(e) => return storage_error("Failed to list conditions", e),
            };
            let rule_state = match state.store.get_rule_state(rule_id).await {
                Ok(s) => s,
                Err(e) => return storage_error("Failed to get rule state", e),
            };
            (conditions, rule_state)
        }
        None => (Vec::new(), None),
    };
    let recipients = match state.store.list_target_recipients(&id).await {
        Ok(r) => r,
        Err(e) => return storage_error("Failed to list recipients", e),
    };

    success_response(
        StatusCode::OK,
        TargetDetail {
            target,
            checks,
            conditions,
            state: rule_state,
            recipients,
        },
    )
}

pub async fn update_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<TargetPayload>,
) -> impl IntoResponse {
    if let Some(msg) = validate_payload(&payload) {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", msg);
    }

    let row = TargetRow {
        id: id.clone(),
        name: payload.name.trim().to_string(),
        host: payload.host.trim().to_string(),
        description: payload.description,
        enabled: payload.enabled,
        category: payload.category,
        preferred_check_type: payload.preferred_check_type,
        operator: "AND".to_string(),
        rule_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    match state.store.update_target(&id, &row).await {
        Ok(Some(updated)) => {
            // An enabled-flag flip changes the scheduled set.
            state.scheduler.reload().await;
            success_response(StatusCode::OK, updated)
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found", "Target not found"),
        Err(e) => storage_error("Failed to update target", e),
    }
}

pub async fn delete_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_target(&id).await {
        Ok(true) => {
            state.scheduler.reload().await;
            success_empty_response(StatusCode::OK, "deleted")
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "not_found", "Target not found"),
        Err(e) => storage_error("Failed to delete target", e),
    }
}

#[derive(Deserialize)]
pub struct ConditionsPayload {
    pub operator: String,
    pub conditions: Vec<ConditionPayload>,
}

#[derive(Deserialize)]
pub struct ConditionPayload {
    pub check_id: String,
    #[serde(default = "default_field")]
    pub field: String,
    #[serde(default = "default_comparator")]
    pub comparator: String,
    pub value: String,
    #[serde(default = "default_fail_count")]
    pub fail_count: i64,
    #[serde(default)]
    pub fail_window: i64,
}

fn default_field() -> String {
    "status".to_string()
}

fn default_comparator() -> String {
    "eq".to_string()
}

fn default_fail_count() -> i64 {
    1
}

pub async fn put_conditions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ConditionsPayload>,
) -> impl IntoResponse {
    if bekci_common::types::RuleOperator::from_str(&payload.operator).is_err() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "operator must be AND or OR",
        );
    }
    for cond in &payload.conditions {
        if bekci_common::types::Comparator::from_str(&cond.comparator).is_err() {
            return error_response(StatusCode::BAD_REQUEST, "bad_request", "unknown comparator");
        }
        let valid_field = cond.field == "status"
            || cond.field == "response_ms"
            || cond.field.starts_with("metrics.");
        if !valid_field {
            return error_response(StatusCode::BAD_REQUEST, "bad_request", "unknown field");
        }
    }

    if state.store.get_target(&id).await.ok().flatten().is_none() {
        return error_response(StatusCode::NOT_FOUND, "not_found", "Target not found");
    }

    let inputs: Vec<ConditionInput> = payload
        .conditions
        .into_iter()
        .map(|c| ConditionInput {
            check_id: c.check_id,
            field: c.field,
            comparator: c.comparator,
            value: c.value,
            fail_count: c.fail_count,
            fail_window: c.fail_window,
        })
        .collect();

    match state
        .store
        .replace_target_conditions(&id, &payload.operator, &inputs)
        .await
    {
        Ok(rule_id) => success_response(StatusCode::OK, serde_json::json!({ "rule_id": rule_id })),
        Err(e) => storage_error("Failed to replace conditions", e),
    }
}

#[derive(Deserialize)]
pub struct RecipientsPayload {
    pub user_ids: Vec<String>,
}

pub async fn put_recipients(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<RecipientsPayload>,
) -> impl IntoResponse {
    if state.store.get_target(&id).await.ok().flatten().is_none() {
        return error_response(StatusCode::NOT_FOUND, "not_found", "Target not found");
    }
    match state
        .store
        .set_target_recipients(&id, &payload.user_ids)
        .await
    {
        Ok(()) => success_empty_response(StatusCode::OK, "recipients updated"),
        Err(e) => storage_error("Failed to set recipients", e),
    }
}
