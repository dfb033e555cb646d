use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::check::{self, Column, Entity};
use crate::entities::target;
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRow {
    pub id: String,
    pub target_id: String,
    pub kind: String,
    pub name: String,
    pub config: String,
    pub interval_s: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flattened view for the scheduler: check plus its target's host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnabledCheckRow {
    pub id: String,
    pub target_id: String,
    pub kind: String,
    pub name: String,
    pub config: String,
    pub interval_s: i64,
    pub host: String,
}

fn to_row(m: check::Model) -> CheckRow {
    CheckRow {
        id: m.id,
        target_id: m.target_id,
        kind: m.kind,
        name: m.name,
        config: m.config,
        interval_s: m.interval_s,
        enabled: m.enabled,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn insert_check(&self, row: &CheckRow) -> Result<CheckRow> {
        let now = Utc::now().fixed_offset();
        let am = check::ActiveModel {
            id: Set(row.id.clone()),
            target_id: Set(row.target_id.clone()),
            kind: Set(row.kind.clone()),
            name: Set(row.name.clone()),
            config: Set(row.config.clone()),
            interval_s: Set(row.interval_s),
            enabled: Set(row.enabled),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_check(&self, id: &str) -> Result<Option<CheckRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn list_checks_by_target(&self, target_id: &str) -> Result<Vec<CheckRow>> {
        let rows = Entity::find()
            .filter(Column::TargetId.eq(target_id))
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn update_check(&self, id: &str, row: &CheckRow) -> Result<Option<CheckRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        if let Some(m) = model {
            let now = Utc::now().fixed_offset();
            let mut am: check::ActiveModel = m.into();
            am.name = Set(row.name.clone());
            am.config = Set(row.config.clone());
            am.interval_s = Set(row.interval_s);
            am.enabled = Set(row.enabled);
            am.updated_at = Set(now);
            let updated = am.update(self.db()).await?;
            Ok(Some(to_row(updated)))
        } else {
            Ok(None)
        }
    }

    pub async fn delete_check(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    /// All enabled checks of enabled targets, joined with the target host.
    /// This is the scheduler's view of the world.
    pub async fn list_all_enabled_checks(&self) -> Result<Vec<EnabledCheckRow>> {
        let targets = target::Entity::find()
            .filter(target::Column::Enabled.eq(true))
            .all(self.db())
            .await?;
        let hosts: HashMap<String, String> =
            targets.into_iter().map(|t| (t.id, t.host)).collect();

        let checks = Entity::find()
            .filter(Column::Enabled.eq(true))
            .all(self.db())
            .await?;

        Ok(checks
            .into_iter()
            .filter_map(|c| {
                let host = hosts.get(&c.target_id)?.clone();
                Some(EnabledCheckRow {
                    id: c.id,
                    target_id: c.target_id,
                    kind: c.kind,
                    name: c.name,
                    config: c.config,
                    interval_s: c.interval_s,
                    host,
                })
            })
            .collect())
    }
}
