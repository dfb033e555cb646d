use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id         TEXT PRIMARY KEY NOT NULL,
    username   TEXT NOT NULL UNIQUE,
    email      TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS targets (
    id                   TEXT PRIMARY KEY NOT NULL,
    name                 TEXT NOT NULL UNIQUE,
    host                 TEXT NOT NULL,
    description          TEXT NOT NULL DEFAULT '',
    enabled              INTEGER NOT NULL DEFAULT 1,
    category             TEXT NOT NULL DEFAULT 'Other',
    preferred_check_type TEXT NOT NULL DEFAULT 'ping',
    operator             TEXT NOT NULL DEFAULT 'AND' CHECK(operator IN ('AND','OR')),
    rule_id              TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_targets_enabled ON targets(enabled);
CREATE INDEX IF NOT EXISTS idx_targets_rule_id ON targets(rule_id);

CREATE TABLE IF NOT EXISTS checks (
    id         TEXT PRIMARY KEY NOT NULL,
    target_id  TEXT NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
    kind       TEXT NOT NULL CHECK(kind IN ('http','tcp','ping','dns','page_hash','tls_cert')),
    name       TEXT NOT NULL,
    config     TEXT NOT NULL DEFAULT '{}',
    interval_s INTEGER NOT NULL DEFAULT 300,
    enabled    INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_checks_target_id ON checks(target_id);

CREATE TABLE IF NOT EXISTS check_results (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    check_id    TEXT NOT NULL REFERENCES checks(id) ON DELETE CASCADE,
    status      TEXT NOT NULL CHECK(status IN ('up','down')),
    response_ms INTEGER NOT NULL DEFAULT 0,
    message     TEXT NOT NULL DEFAULT '',
    metrics     TEXT NOT NULL DEFAULT '{}',
    checked_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_check_results_check_id ON check_results(check_id, checked_at DESC);
CREATE INDEX IF NOT EXISTS idx_check_results_checked_at ON check_results(checked_at);

CREATE TABLE IF NOT EXISTS rules (
    id         TEXT PRIMARY KEY NOT NULL,
    operator   TEXT NOT NULL DEFAULT 'AND' CHECK(operator IN ('AND','OR')),
    enabled    INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rule_conditions (
    id          TEXT PRIMARY KEY NOT NULL,
    rule_id     TEXT NOT NULL REFERENCES rules(id) ON DELETE CASCADE,
    check_id    TEXT NOT NULL REFERENCES checks(id) ON DELETE CASCADE,
    field       TEXT NOT NULL DEFAULT 'status',
    comparator  TEXT NOT NULL DEFAULT 'eq',
    value       TEXT NOT NULL,
    fail_count  INTEGER NOT NULL DEFAULT 1,
    fail_window INTEGER NOT NULL DEFAULT 0,
    sort_order  INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_rule_conditions_rule_id ON rule_conditions(rule_id);
CREATE INDEX IF NOT EXISTS idx_rule_conditions_check_id ON rule_conditions(check_id);

CREATE TABLE IF NOT EXISTS rule_states (
    rule_id        TEXT PRIMARY KEY NOT NULL REFERENCES rules(id) ON DELETE CASCADE,
    current_state  TEXT NOT NULL DEFAULT 'healthy' CHECK(current_state IN ('healthy','unhealthy')),
    last_change    TEXT,
    last_evaluated TEXT
);

CREATE TABLE IF NOT EXISTS target_alert_recipients (
    target_id TEXT NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
    user_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    PRIMARY KEY (target_id, user_id)
);

CREATE TABLE IF NOT EXISTS alert_history (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_id      TEXT NOT NULL,
    target_id    TEXT NOT NULL DEFAULT '',
    recipient_id TEXT NOT NULL DEFAULT '',
    kind         TEXT NOT NULL CHECK(kind IN ('firing','recovery','re-alert')),
    subject      TEXT NOT NULL DEFAULT '',
    sent_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_history_rule ON alert_history(rule_id, sent_at DESC);

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

INSERT OR IGNORE INTO settings (key, value) VALUES ('history_days', '90');
INSERT OR IGNORE INTO settings (key, value) VALUES ('alert_method', '');
INSERT OR IGNORE INTO settings (key, value) VALUES ('alert_cooldown_s', '1800');
INSERT OR IGNORE INTO settings (key, value) VALUES ('alert_realert_s', '0');
INSERT OR IGNORE INTO settings (key, value) VALUES ('sla_network', '99.9');
INSERT OR IGNORE INTO settings (key, value) VALUES ('sla_security', '99.5');
INSERT OR IGNORE INTO settings (key, value) VALUES ('sla_physical_security', '99.0');
INSERT OR IGNORE INTO settings (key, value) VALUES ('sla_key_services', '99.9');
INSERT OR IGNORE INTO settings (key, value) VALUES ('sla_other', '95.0');
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS settings;
DROP TABLE IF EXISTS alert_history;
DROP TABLE IF EXISTS target_alert_recipients;
DROP TABLE IF EXISTS rule_states;
DROP TABLE IF EXISTS rule_conditions;
DROP TABLE IF EXISTS rules;
DROP TABLE IF EXISTS check_results;
DROP TABLE IF EXISTS checks;
DROP TABLE IF EXISTS targets;
DROP TABLE IF EXISTS users;
";
