//! Persistence layer for bekci.
//!
//! All durable state lives here: targets, checks, probe results, the hidden
//! per-target rules with their derived states, alert recipients and history,
//! and global settings. Backed by SeaORM on SQLite (WAL, foreign keys on);
//! migrations run at connect time. Store methods return plain row structs so
//! callers never touch entity models.

pub mod entities;
pub mod store;

#[cfg(test)]
mod tests;

pub use store::alerts::AlertHistoryItem;
pub use store::checks::{CheckRow, EnabledCheckRow};
pub use store::results::CheckResultRow;
pub use store::rules::{ConditionInput, RuleConditionRow, RuleRow, RuleStateRow};
pub use store::targets::TargetRow;
pub use store::users::UserRow;
pub use store::Store;
