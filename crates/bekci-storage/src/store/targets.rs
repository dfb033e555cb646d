use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, ModelTrait, Order, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::target::{self, Column, Entity};
use crate::entities::{rule, target_alert_recipient, user};
use crate::store::users::{to_user_row, UserRow};
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRow {
    pub id: String,
    pub name: String,
    pub host: String,
    pub description: String,
    pub enabled: bool,
    pub category: String,
    pub preferred_check_type: String,
    pub operator: String,
    pub rule_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: target::Model) -> TargetRow {
    TargetRow {
        id: m.id,
        name: m.name,
        host: m.host,
        description: m.description,
        enabled: m.enabled,
        category: m.category,
        preferred_check_type: m.preferred_check_type,
        operator: m.operator,
        rule_id: m.rule_id,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn insert_target(&self, row: &TargetRow) -> Result<TargetRow> {
        let now = Utc::now().fixed_offset();
        let am = target::ActiveModel {
            id: Set(row.id.clone()),
            name: Set(row.name.clone()),
            host: Set(row.host.clone()),
            description: Set(row.description.clone()),
            enabled: Set(row.enabled),
            category: Set(row.category.clone()),
            preferred_check_type: Set(row.preferred_check_type.clone()),
            operator: Set(row.operator.clone()),
            rule_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_target(&self, id: &str) -> Result<Option<TargetRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn list_targets(&self) -> Result<Vec<TargetRow>> {
        let rows = Entity::find()
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn list_enabled_targets(&self) -> Result<Vec<TargetRow>> {
        let rows = Entity::find()
            .filter(Column::Enabled.eq(true))
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn update_target(&self, id: &str, row: &TargetRow) -> Result<Option<TargetRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        if let Some(m) = model {
            let now = Utc::now().fixed_offset();
            let mut am: target::ActiveModel = m.into();
            am.name = Set(row.name.clone());
            am.host = Set(row.host.clone());
            am.description = Set(row.description.clone());
            am.enabled = Set(row.enabled);
            am.category = Set(row.category.clone());
            am.preferred_check_type = Set(row.preferred_check_type.clone());
            am.updated_at = Set(now);
            let updated = am.update(self.db()).await?;
            Ok(Some(to_row(updated)))
        } else {
            Ok(None)
        }
    }

    /// Delete a target and everything hanging off it.
    ///
    /// Checks, results, conditions and the rule-state go via FK cascade; the
    /// hidden rule is removed in the same transaction so it cannot be
    /// orphaned.
    pub async fn delete_target(&self, id: &str) -> Result<bool> {
        let txn = self.db.begin().await?;

        let Some(model) = Entity::find_by_id(id).one(&txn).await? else {
            return Ok(false);
        };
        let rule_id = model.rule_id.clone();
        model.delete(&txn).await?;

        if let Some(rule_id) = rule_id {
            rule::Entity::delete_by_id(&rule_id).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    pub async fn get_target_id_by_rule_id(&self, rule_id: &str) -> Result<Option<String>> {
        let model = Entity::find()
            .filter(Column::RuleId.eq(rule_id))
            .one(self.db())
            .await?;
        Ok(model.map(|m| m.id))
    }

    /// Replace the recipient set for a target with the given user IDs.
    pub async fn set_target_recipients(&self, target_id: &str, user_ids: &[String]) -> Result<()> {
        let txn = self.db.begin().await?;

        target_alert_recipient::Entity::delete_many()
            .filter(target_alert_recipient::Column::TargetId.eq(target_id))
            .exec(&txn)
            .await?;

        for uid in user_ids {
            let am = target_alert_recipient::ActiveModel {
                target_id: Set(target_id.to_string()),
                user_id: Set(uid.clone()),
            };
            am.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// All users who receive alerts for a target, with their email addresses.
    pub async fn list_target_recipients(&self, target_id: &str) -> Result<Vec<UserRow>> {
        let links = target_alert_recipient::Entity::find()
            .filter(target_alert_recipient::Column::TargetId.eq(target_id))
            .all(self.db())
            .await?;
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids: Vec<String> = links.into_iter().map(|l| l.user_id).collect();
        let users = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .order_by(user::Column::Username, Order::Asc)
            .all(self.db())
            .await?;
        Ok(users.into_iter().map(to_user_row).collect())
    }
}
