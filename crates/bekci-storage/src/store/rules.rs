use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::rule::{self, Entity as RuleEntity};
use crate::entities::rule_condition::{self, Entity as ConditionEntity};
use crate::entities::rule_state::{self, Entity as StateEntity};
use crate::entities::target;
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRow {
    pub id: String,
    pub operator: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConditionRow {
    pub id: String,
    pub rule_id: String,
    pub check_id: String,
    pub field: String,
    pub comparator: String,
    pub value: String,
    pub fail_count: i64,
    pub fail_window: i64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleStateRow {
    pub rule_id: String,
    pub current_state: String,
    pub last_change: Option<DateTime<Utc>>,
    pub last_evaluated: Option<DateTime<Utc>>,
}

/// A condition as submitted through the API; IDs and sort order are assigned
/// by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionInput {
    pub check_id: String,
    pub field: String,
    pub comparator: String,
    pub value: String,
    pub fail_count: i64,
    pub fail_window: i64,
}

fn to_rule_row(m: rule::Model) -> RuleRow {
    RuleRow {
        id: m.id,
        operator: m.operator,
        enabled: m.enabled,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn to_condition_row(m: rule_condition::Model) -> RuleConditionRow {
    RuleConditionRow {
        id: m.id,
        rule_id: m.rule_id,
        check_id: m.check_id,
        field: m.field,
        comparator: m.comparator,
        value: m.value,
        fail_count: m.fail_count,
        fail_window: m.fail_window,
        sort_order: m.sort_order,
    }
}

fn to_state_row(m: rule_state::Model) -> RuleStateRow {
    RuleStateRow {
        rule_id: m.rule_id,
        current_state: m.current_state,
        last_change: m.last_change.map(|t| t.with_timezone(&Utc)),
        last_evaluated: m.last_evaluated.map(|t| t.with_timezone(&Utc)),
    }
}

impl Store {
    /// Replace the condition set of a target, managing the hidden rule.
    ///
    /// Creates the rule (with a healthy state) and links it on first use;
    /// thereafter updates the operator in place and swaps the conditions.
    /// Returns the rule ID.
    pub async fn replace_target_conditions(
        &self,
        target_id: &str,
        operator: &str,
        conditions: &[ConditionInput],
    ) -> Result<String> {
        let txn = self.db.begin().await?;
        let now = Utc::now().fixed_offset();

        let target_model = target::Entity::find_by_id(target_id)
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("target not found: {target_id}"))?;

        let rule_id = match &target_model.rule_id {
            Some(rule_id) => {
                let rule_id = rule_id.clone();
                RuleEntity::update_many()
                    .col_expr(rule::Column::Operator, Expr::value(operator))
                    .col_expr(rule::Column::UpdatedAt, Expr::value(now))
                    .filter(rule::Column::Id.eq(rule_id.as_str()))
                    .exec(&txn)
                    .await?;
                rule_id
            }
            None => {
                let rule_id = bekci_common::id::next_id();
                let am = rule::ActiveModel {
                    id: Set(rule_id.clone()),
                    operator: Set(operator.to_string()),
                    enabled: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                am.insert(&txn).await?;

                let state = rule_state::ActiveModel {
                    rule_id: Set(rule_id.clone()),
                    current_state: Set("healthy".to_string()),
                    last_change: Set(None),
                    last_evaluated: Set(None),
                };
                state.insert(&txn).await?;

                let mut tam: target::ActiveModel = target_model.into();
                tam.rule_id = Set(Some(rule_id.clone()));
                tam.operator = Set(operator.to_string());
                tam.updated_at = Set(now);
                tam.update(&txn).await?;

                rule_id
            }
        };

        ConditionEntity::delete_many()
            .filter(rule_condition::Column::RuleId.eq(rule_id.as_str()))
            .exec(&txn)
            .await?;

        for (i, cond) in conditions.iter().enumerate() {
            let am = rule_condition::ActiveModel {
                id: Set(bekci_common::id::next_id()),
                rule_id: Set(rule_id.clone()),
                check_id: Set(cond.check_id.clone()),
                field: Set(cond.field.clone()),
                comparator: Set(cond.comparator.clone()),
                value: Set(cond.value.clone()),
                fail_count: Set(cond.fail_count.max(1)),
                fail_window: Set(cond.fail_window.max(0)),
                sort_order: Set(i as i64),
            };
            am.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(rule_id)
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<RuleRow>> {
        let model = RuleEntity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_rule_row))
    }

    pub async fn set_rule_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let now = Utc::now().fixed_offset();
        RuleEntity::update_many()
            .col_expr(rule::Column::Enabled, Expr::value(enabled))
            .col_expr(rule::Column::UpdatedAt, Expr::value(now))
            .filter(rule::Column::Id.eq(id))
            .exec(self.db())
            .await?;
        Ok(())
    }

    /// All rules that have a condition referencing the given check.
    pub async fn get_rules_by_check_id(&self, check_id: &str) -> Result<Vec<RuleRow>> {
        let conds = ConditionEntity::find()
            .filter(rule_condition::Column::CheckId.eq(check_id))
            .all(self.db())
            .await?;
        if conds.is_empty() {
            return Ok(Vec::new());
        }

        let mut rule_ids: Vec<String> = conds.into_iter().map(|c| c.rule_id).collect();
        rule_ids.sort();
        rule_ids.dedup();

        let rules = RuleEntity::find()
            .filter(rule::Column::Id.is_in(rule_ids))
            .all(self.db())
            .await?;
        Ok(rules.into_iter().map(to_rule_row).collect())
    }

    /// Conditions of a rule in stable sort order.
    pub async fn list_rule_conditions(&self, rule_id: &str) -> Result<Vec<RuleConditionRow>> {
        let rows = ConditionEntity::find()
            .filter(rule_condition::Column::RuleId.eq(rule_id))
            .order_by(rule_condition::Column::SortOrder, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_condition_row).collect())
    }

    pub async fn get_rule_state(&self, rule_id: &str) -> Result<Option<RuleStateRow>> {
        let model = StateEntity::find_by_id(rule_id).one(self.db()).await?;
        Ok(model.map(to_state_row))
    }

    /// Set the derived state and stamp both timestamps in one statement.
    pub async fn update_rule_state(&self, rule_id: &str, new_state: &str) -> Result<()> {
        let now = Utc::now().fixed_offset();
        StateEntity::update_many()
            .col_expr(rule_state::Column::CurrentState, Expr::value(new_state))
            .col_expr(rule_state::Column::LastChange, Expr::value(Some(now)))
            .col_expr(rule_state::Column::LastEvaluated, Expr::value(Some(now)))
            .filter(rule_state::Column::RuleId.eq(rule_id))
            .exec(self.db())
            .await?;
        Ok(())
    }

    /// Stamp last-evaluated only, leaving the state untouched.
    pub async fn touch_rule_evaluated(&self, rule_id: &str) -> Result<()> {
        let now = Utc::now().fixed_offset();
        StateEntity::update_many()
            .col_expr(rule_state::Column::LastEvaluated, Expr::value(Some(now)))
            .filter(rule_state::Column::RuleId.eq(rule_id))
            .exec(self.db())
            .await?;
        Ok(())
    }

    /// `(rule_id, target_id)` for every rule currently unhealthy.
    pub async fn get_firing_rules(&self) -> Result<Vec<(String, String)>> {
        let states = StateEntity::find()
            .filter(rule_state::Column::CurrentState.eq("unhealthy"))
            .all(self.db())
            .await?;
        if states.is_empty() {
            return Ok(Vec::new());
        }

        let rule_ids: Vec<String> = states.into_iter().map(|s| s.rule_id).collect();
        let targets = target::Entity::find()
            .filter(target::Column::RuleId.is_in(rule_ids))
            .all(self.db())
            .await?;
        Ok(targets
            .into_iter()
            .filter_map(|t| t.rule_id.map(|rid| (rid, t.id)))
            .collect())
    }

    /// Healthy/unhealthy rule counts for the dashboard.
    pub async fn rule_state_summary(&self) -> Result<(u64, u64)> {
        let states = StateEntity::find().all(self.db()).await?;
        let unhealthy = states
            .iter()
            .filter(|s| s.current_state == "unhealthy")
            .count() as u64;
        Ok((states.len() as u64 - unhealthy, unhealthy))
    }
}
