use anyhow::Result;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, TransactionTrait};
use std::collections::HashMap;

use crate::entities::setting::{self, Entity};
use crate::store::Store;

impl Store {
    /// A single setting value; missing keys read as the empty string.
    pub async fn get_setting(&self, key: &str) -> Result<String> {
        let model = Entity::find_by_id(key).one(self.db()).await?;
        Ok(model.map(|m| m.value).unwrap_or_default())
    }

    /// A setting parsed as i64, falling back to `default` when missing or
    /// non-numeric.
    pub async fn get_setting_i64(&self, key: &str, default: i64) -> i64 {
        match self.get_setting(key).await {
            Ok(v) => v.parse().unwrap_or(default),
            Err(e) => {
                tracing::error!(key, error = %e, "Failed to read setting");
                default
            }
        }
    }

    pub async fn get_all_settings(&self) -> Result<HashMap<String, String>> {
        let rows = Entity::find().all(self.db()).await?;
        Ok(rows.into_iter().map(|m| (m.key, m.value)).collect())
    }

    /// Upsert a batch of settings in one transaction.
    pub async fn set_settings(&self, kv: &HashMap<String, String>) -> Result<()> {
        let txn = self.db.begin().await?;
        for (k, v) in kv {
            let existing = Entity::find_by_id(k).one(&txn).await?;
            match existing {
                Some(m) => {
                    let mut am: setting::ActiveModel = m.into();
                    am.value = Set(v.clone());
                    am.update(&txn).await?;
                }
                None => {
                    let am = setting::ActiveModel {
                        key: Set(k.clone()),
                        value: Set(v.clone()),
                    };
                    am.insert(&txn).await?;
                }
            }
        }
        txn.commit().await?;
        Ok(())
    }
}
