use crate::api::{storage_error, success_response};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bekci_common::types::{sla_setting_key, CATEGORIES};
use serde::Serialize;

#[derive(Serialize)]
struct CategorySummary {
    category: String,
    target_count: usize,
    /// Average uptime of the category's checks over the last 24h; null when
    /// no results exist yet.
    uptime_pct: Option<f64>,
    sla_pct: f64,
    meets_sla: Option<bool>,
}

#[derive(Serialize)]
struct DashboardResponse {
    healthy_rules: u64,
    unhealthy_rules: u64,
    categories: Vec<CategorySummary>,
}

pub async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let (healthy, unhealthy) = match state.store.rule_state_summary().await {
        Ok(counts) => counts,
        Err(e) => return storage_error("Failed to read rule summary", e),
    };

    let targets = match state.store.list_enabled_targets().await {
        Ok(t) => t,
        Err(e) => return storage_error("Failed to list targets", e),
    };

    let mut categories = Vec::with_capacity(CATEGORIES.len());
    for category in CATEGORIES {
        let members: Vec<_> = targets.iter().filter(|t| t.category == *category).collect();

        let mut uptimes = Vec::new();
        for target in &members {
            let checks = match state.store.list_checks_by_target(&target.id).await {
                Ok(c) => c,
                Err(e) => return storage_error("Failed to list checks", e),
            };
            for check in checks {
                match state.store.get_uptime_percent(&check.id, 1).await {
                    Ok(pct) if pct >= 0.0 => uptimes.push(pct),
                    Ok(_) => {}
                    Err(e) => return storage_error("Failed to compute uptime", e),
                }
            }
        }

        let uptime_pct = if uptimes.is_empty() {
            None
        } else {
            Some(
                (uptimes.iter().sum::<f64>() / uptimes.len() as f64 * 100.0).round() / 100.0,
            )
        };

        let sla_raw = state.store.get_setting(sla_setting_key(category)).await;
        let sla_pct = match sla_raw {
            Ok(v) => v.parse().unwrap_or(99.0),
            Err(e) => return storage_error("Failed to read SLA setting", e),
        };

        categories.push(CategorySummary {
            category: category.to_string(),
            target_count: members.len(),
            uptime_pct,
            sla_pct,
            meets_sla: uptime_pct.map(|u| u >= sla_pct),
        });
    }

    success_response(
        StatusCode::OK,
        DashboardResponse {
            healthy_rules: healthy,
            unhealthy_rules: unhealthy,
            categories,
        },
    )
}
