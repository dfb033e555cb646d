use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, Order, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entities::user::{self, Column, Entity};
use crate::store::Store;

/// Recipient directory entry. Bekci does not manage accounts beyond the
/// name/email pairs the dispatcher fans out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn to_user_row(m: user::Model) -> UserRow {
    UserRow {
        id: m.id,
        username: m.username,
        email: m.email,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn create_user(&self, row: &UserRow) -> Result<UserRow> {
        let now = Utc::now().fixed_offset();
        let am = user::ActiveModel {
            id: Set(row.id.clone()),
            username: Set(row.username.clone()),
            email: Set(row.email.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_user_row(model))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_user_row))
    }

    pub async fn list_users(&self) -> Result<Vec<UserRow>> {
        let rows = Entity::find()
            .order_by(Column::Username, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_user_row).collect())
    }
}
