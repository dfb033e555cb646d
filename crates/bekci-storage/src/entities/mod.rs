pub mod alert_history;
pub mod check;
pub mod check_result;
pub mod rule;
pub mod rule_condition;
pub mod rule_state;
pub mod setting;
pub mod target;
pub mod target_alert_recipient;
pub mod user;
