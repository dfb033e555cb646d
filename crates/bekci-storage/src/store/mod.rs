use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::path::Path;

pub mod alerts;
pub mod checks;
pub mod results;
pub mod rules;
pub mod settings;
pub mod targets;
pub mod users;

/// Unified access layer for the bekci database.
///
/// All methods are `async fn` over SeaORM + SQLite. The store is the single
/// owner of durable state; it is safe for concurrent use from any task.
pub struct Store {
    pub(crate) db: DatabaseConnection,
}

impl Store {
    /// Open (or create) the database at `db_path` and run pending migrations.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let url = format!(
            "sqlite://{}?mode=rwc",
            db_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("non-UTF-8 database path"))?
        );
        let store = Self::connect(ConnectOptions::new(url)).await?;
        tracing::info!(path = %db_path.display(), "Initialized store");
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub async fn new_in_memory() -> Result<Self> {
        Self::connect(ConnectOptions::new("sqlite::memory:")).await
    }

    async fn connect(mut options: ConnectOptions) -> Result<Self> {
        // Single-writer store: one pooled connection, so the WAL and
        // foreign-key pragmas below are in force for every statement (and
        // `:memory:` databases are not duplicated per connection).
        options.max_connections(1);
        let db = Database::connect(options).await?;

        db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        // Cascading deletes (target -> checks -> results, rule -> conditions/state)
        // rely on SQLite enforcing foreign keys.
        db.execute_unprepared("PRAGMA foreign_keys=ON;").await?;

        Migrator::up(&db, None).await?;

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
