use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, EntityTrait,
    PaginatorTrait, Order, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::alert_history::{self, Column, Entity};
use crate::entities::{target, user};
use crate::store::Store;

/// Alert history entry enriched with target and recipient names for the
/// history list view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistoryItem {
    pub id: i64,
    pub rule_id: String,
    pub target_id: String,
    pub target_name: String,
    pub recipient_id: String,
    pub recipient_name: String,
    pub kind: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
}

impl Store {
    /// Record a sent (or attempted) alert.
    pub async fn log_alert(
        &self,
        target_id: &str,
        rule_id: &str,
        recipient_id: &str,
        kind: &str,
        subject: &str,
    ) -> Result<()> {
        let am = alert_history::ActiveModel {
            id: NotSet,
            rule_id: Set(rule_id.to_string()),
            target_id: Set(target_id.to_string()),
            recipient_id: Set(recipient_id.to_string()),
            kind: Set(kind.to_string()),
            subject: Set(subject.to_string()),
            sent_at: Set(Utc::now().fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }

    /// The most recent alert time for a rule, if any alert was ever sent.
    pub async fn get_last_alert_time(&self, rule_id: &str) -> Result<Option<DateTime<Utc>>> {
        let model = Entity::find()
            .filter(Column::RuleId.eq(rule_id))
            .order_by(Column::SentAt, Order::Desc)
            .order_by(Column::Id, Order::Desc)
            .one(self.db())
            .await?;
        Ok(model.map(|m| m.sent_at.with_timezone(&Utc)))
    }

    /// Paginated alert history, newest first, with names resolved.
    pub async fn list_alert_history(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<AlertHistoryItem>, u64)> {
        let total = Entity::find().count(self.db()).await?;

        let rows = Entity::find()
            .order_by(Column::SentAt, Order::Desc)
            .order_by(Column::Id, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(self.db())
            .await?;

        let target_ids: Vec<String> = rows.iter().map(|r| r.target_id.clone()).collect();
        let recipient_ids: Vec<String> = rows.iter().map(|r| r.recipient_id.clone()).collect();

        let target_names: HashMap<String, String> = target::Entity::find()
            .filter(target::Column::Id.is_in(target_ids))
            .all(self.db())
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();
        let recipient_names: HashMap<String, String> = user::Entity::find()
            .filter(user::Column::Id.is_in(recipient_ids))
            .all(self.db())
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let items = rows
            .into_iter()
            .map(|m| AlertHistoryItem {
                target_name: target_names
                    .get(&m.target_id)
                    .cloned()
                    .unwrap_or_else(|| "(deleted)".to_string()),
                recipient_name: recipient_names
                    .get(&m.recipient_id)
                    .cloned()
                    .unwrap_or_else(|| "(deleted)".to_string()),
                id: m.id,
                rule_id: m.rule_id,
                target_id: m.target_id,
                recipient_id: m.recipient_id,
                kind: m.kind,
                subject: m.subject,
                sent_at: m.sent_at.with_timezone(&Utc),
            })
            .collect();

        Ok((items, total))
    }

    /// Delete alert history older than `days`.
    pub async fn purge_old_alert_history(&self, days: i64) -> Result<u64> {
        let cutoff = (Utc::now() - Duration::days(days)).fixed_offset();
        let res = Entity::delete_many()
            .filter(Column::SentAt.lt(cutoff))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
