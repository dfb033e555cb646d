use crate::TransitionSink;
use anyhow::Result;
use bekci_common::types::{Comparator, HealthState, RuleOperator};
use bekci_storage::{CheckResultRow, RuleConditionRow, RuleRow, Store};
use std::str::FromStr;
use std::sync::Arc;

pub struct RuleEngine {
    store: Arc<Store>,
    sink: Arc<dyn TransitionSink>,
}

impl RuleEngine {
    pub fn new(store: Arc<Store>, sink: Arc<dyn TransitionSink>) -> Self {
        Self { store, sink }
    }

    /// Re-evaluate every rule that references the given check. Idempotent:
    /// replaying the same results yields the same states and transitions.
    pub async fn evaluate(&self, check_id: &str) {
        let rules = match self.store.get_rules_by_check_id(check_id).await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::error!(check_id, error = %e, "Engine: failed to get rules for check");
                return;
            }
        };

        for rule in rules {
            if !rule.enabled {
                continue;
            }
            if let Err(e) = self.evaluate_rule(&rule).await {
                tracing::error!(rule_id = %rule.id, error = %e, "Engine: rule evaluation failed");
            }
        }
    }

    async fn evaluate_rule(&self, rule: &RuleRow) -> Result<()> {
        let conds = self.store.list_rule_conditions(&rule.id).await?;
        if conds.is_empty() {
            self.store.touch_rule_evaluated(&rule.id).await?;
            return Ok(());
        }

        let operator = RuleOperator::from_str(&rule.operator).unwrap_or(RuleOperator::And);
        let mut matched = Vec::with_capacity(conds.len());
        for cond in &conds {
            matched.push(self.evaluate_condition(cond).await);
        }

        let combined = match operator {
            RuleOperator::Or => matched.iter().any(|m| *m),
            RuleOperator::And => matched.iter().all(|m| *m),
        };

        let new_state = if combined {
            HealthState::Unhealthy
        } else {
            HealthState::Healthy
        };

        let old_state = self
            .store
            .get_rule_state(&rule.id)
            .await?
            .and_then(|s| HealthState::from_str(&s.current_state).ok())
            .unwrap_or(HealthState::Healthy);

        if new_state != old_state {
            self.store
                .update_rule_state(&rule.id, &new_state.to_string())
                .await?;
            tracing::warn!(
                rule_id = %rule.id,
                from = %old_state,
                to = %new_state,
                "Rule state changed"
            );
            self.sink.dispatch(&rule.id, old_state, new_state).await;
        } else {
            self.store.touch_rule_evaluated(&rule.id).await?;
        }

        Ok(())
    }

    /// Whether a single condition is triggered. Storage failures and missing
    /// results read as not-triggered.
    async fn evaluate_condition(&self, cond: &RuleConditionRow) -> bool {
        let comparator = match Comparator::from_str(&cond.comparator) {
            Ok(c) => c,
            Err(_) => return false,
        };

        if cond.fail_window > 0 {
            let results = match self
                .store
                .get_recent_results_by_window(&cond.check_id, cond.fail_window as u64)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    tracing::error!(
                        check_id = %cond.check_id,
                        error = %e,
                        "Engine: failed to get results by window"
                    );
                    return false;
                }
            };
            let matches = results
                .iter()
                .filter(|r| comparator.matches(&extract_field(r, &cond.field), &cond.value))
                .count() as i64;
            return matches >= cond.fail_count;
        }

        match self.store.get_last_result(&cond.check_id).await {
            Ok(Some(last)) => comparator.matches(&extract_field(&last, &cond.field), &cond.value),
            Ok(None) => false,
            Err(e) => {
                tracing::error!(
                    check_id = %cond.check_id,
                    error = %e,
                    "Engine: failed to get last result"
                );
                false
            }
        }
    }
}

/// Pull a field value out of a result by selector. Missing fields extract
/// to the empty string.
fn extract_field(result: &CheckResultRow, field: &str) -> String {
    match field {
        "status" => result.status.clone(),
        "response_ms" => result.response_ms.to_string(),
        _ => {
            if let Some(key) = field.strip_prefix("metrics.") {
                let Ok(metrics) =
                    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(
                        &result.metrics,
                    )
                else {
                    return String::new();
                };
                match metrics.get(key) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(serde_json::Value::Number(n)) => format_metric_number(n),
                    Some(v) => v.to_string(),
                    None => String::new(),
                }
            } else {
                String::new()
            }
        }
    }
}

/// Whole-number floats print without the trailing `.0` (`100.0` -> `"100"`)
/// so string-equality conditions see the same value the probe computed.
fn format_metric_number(n: &serde_json::Number) -> String {
    if let Some(f) = n.as_f64() {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
            return format!("{}", f as i64);
        }
    }
    n.to_string()
}

#[cfg(test)]
mod field_tests {
    use super::extract_field;
    use bekci_storage::CheckResultRow;

    fn result_with_metrics(metrics: &str) -> CheckResultRow {
        CheckResultRow {
            id: 1,
            check_id: "c1".to_string(),
            status: "down".to_string(),
            response_ms: 245,
            message: String::new(),
            metrics: metrics.to_string(),
            checked_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn extracts_status_and_latency() {
        let r = result_with_metrics("{}");
        assert_eq!(extract_field(&r, "status"), "down");
        assert_eq!(extract_field(&r, "response_ms"), "245");
    }

    #[test]
    fn extracts_metric_values_by_key() {
        let r = result_with_metrics(r#"{"days_left":29,"issuer":"CN=r3","loss":12.5}"#);
        assert_eq!(extract_field(&r, "metrics.days_left"), "29");
        assert_eq!(extract_field(&r, "metrics.issuer"), "CN=r3");
        assert_eq!(extract_field(&r, "metrics.loss"), "12.5");
    }

    #[test]
    fn whole_number_floats_drop_the_decimal_point() {
        let r = result_with_metrics(r#"{"packet_loss":100.0,"avg_rtt_ms":0.0,"jitter":3.25}"#);
        assert_eq!(extract_field(&r, "metrics.packet_loss"), "100");
        assert_eq!(extract_field(&r, "metrics.avg_rtt_ms"), "0");
        assert_eq!(extract_field(&r, "metrics.jitter"), "3.25");
    }

    #[test]
    fn missing_fields_extract_to_empty() {
        let r = result_with_metrics(r#"{"a":1}"#);
        assert_eq!(extract_field(&r, "metrics.b"), "");
        assert_eq!(extract_field(&r, "nonsense"), "");
        let broken = result_with_metrics("not-json");
        assert_eq!(extract_field(&broken, "metrics.a"), "");
    }
}
