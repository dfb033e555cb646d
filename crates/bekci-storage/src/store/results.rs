use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::check_result::{self, Column, Entity};
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResultRow {
    pub id: i64,
    pub check_id: String,
    pub status: String,
    pub response_ms: i64,
    pub message: String,
    pub metrics: String,
    pub checked_at: DateTime<Utc>,
}

fn to_row(m: check_result::Model) -> CheckResultRow {
    CheckResultRow {
        id: m.id,
        check_id: m.check_id,
        status: m.status,
        response_ms: m.response_ms,
        message: m.message,
        metrics: m.metrics,
        checked_at: m.checked_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn save_result(&self, row: &CheckResultRow) -> Result<CheckResultRow> {
        let am = check_result::ActiveModel {
            id: NotSet,
            check_id: Set(row.check_id.clone()),
            status: Set(row.status.clone()),
            response_ms: Set(row.response_ms),
            message: Set(row.message.clone()),
            metrics: Set(row.metrics.clone()),
            checked_at: Set(row.checked_at.fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    /// The most recent result for a check, if any.
    pub async fn get_last_result(&self, check_id: &str) -> Result<Option<CheckResultRow>> {
        let model = Entity::find()
            .filter(Column::CheckId.eq(check_id))
            .order_by(Column::CheckedAt, Order::Desc)
            .order_by(Column::Id, Order::Desc)
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    /// The `n` most recent results for a check, newest first.
    pub async fn get_recent_results_by_window(
        &self,
        check_id: &str,
        n: u64,
    ) -> Result<Vec<CheckResultRow>> {
        let rows = Entity::find()
            .filter(Column::CheckId.eq(check_id))
            .order_by(Column::CheckedAt, Order::Desc)
            .order_by(Column::Id, Order::Desc)
            .limit(n)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    /// Raw results for a check within the last `hours`, oldest first.
    pub async fn get_recent_results(
        &self,
        check_id: &str,
        hours: i64,
    ) -> Result<Vec<CheckResultRow>> {
        let cutoff = (Utc::now() - Duration::hours(hours)).fixed_offset();
        let rows = Entity::find()
            .filter(Column::CheckId.eq(check_id))
            .filter(Column::CheckedAt.gte(cutoff))
            .order_by(Column::CheckedAt, Order::Asc)
            .order_by(Column::Id, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    /// Uptime percentage over the last `days`. Returns -1.0 when there are
    /// no results in the window.
    pub async fn get_uptime_percent(&self, check_id: &str, days: i64) -> Result<f64> {
        let cutoff = (Utc::now() - Duration::days(days)).fixed_offset();
        let rows = Entity::find()
            .filter(Column::CheckId.eq(check_id))
            .filter(Column::CheckedAt.gte(cutoff))
            .all(self.db())
            .await?;
        if rows.is_empty() {
            return Ok(-1.0);
        }
        let up = rows.iter().filter(|r| r.status == "up").count();
        Ok((up as f64 * 100.0 / rows.len() as f64 * 100.0).round() / 100.0)
    }

    /// Delete results older than `days`. Returns the number of rows removed.
    pub async fn purge_old_results(&self, days: i64) -> Result<u64> {
        let cutoff = (Utc::now() - Duration::days(days)).fixed_offset();
        let res = Entity::delete_many()
            .filter(Column::CheckedAt.lt(cutoff))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
