use crate::store::rules::ConditionInput;
use crate::store::Store;
use crate::{CheckResultRow, CheckRow, TargetRow, UserRow};
use chrono::{Duration, Utc};

async fn setup() -> Store {
    bekci_common::id::init(1, 1);
    Store::new_in_memory().await.unwrap()
}

fn make_target(name: &str) -> TargetRow {
    TargetRow {
        id: bekci_common::id::next_id(),
        name: name.to_string(),
        host: "example.com".to_string(),
        description: String::new(),
        enabled: true,
        category: "Network".to_string(),
        preferred_check_type: "http".to_string(),
        operator: "AND".to_string(),
        rule_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn make_check(target_id: &str, kind: &str) -> CheckRow {
    CheckRow {
        id: bekci_common::id::next_id(),
        target_id: target_id.to_string(),
        kind: kind.to_string(),
        name: format!("{kind} check"),
        config: "{}".to_string(),
        interval_s: 60,
        enabled: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn make_result(check_id: &str, status: &str, response_ms: i64) -> CheckResultRow {
    CheckResultRow {
        id: 0,
        check_id: check_id.to_string(),
        status: status.to_string(),
        response_ms,
        message: String::new(),
        metrics: "{}".to_string(),
        checked_at: Utc::now(),
    }
}

#[tokio::test]
async fn target_crud_round_trip() {
    let store = setup().await;

    let target = store.insert_target(&make_target("edge-fw")).await.unwrap();
    let fetched = store.get_target(&target.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "edge-fw");
    assert!(fetched.enabled);

    let mut updated = fetched.clone();
    updated.enabled = false;
    updated.host = "10.0.0.1".to_string();
    store.update_target(&target.id, &updated).await.unwrap();

    assert!(store.list_enabled_targets().await.unwrap().is_empty());
    assert_eq!(store.list_targets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn enabled_checks_join_target_host() {
    let store = setup().await;

    let enabled = store.insert_target(&make_target("web")).await.unwrap();
    let mut disabled_row = make_target("db");
    disabled_row.enabled = false;
    let disabled = store.insert_target(&disabled_row).await.unwrap();

    store
        .insert_check(&make_check(&enabled.id, "http"))
        .await
        .unwrap();
    store
        .insert_check(&make_check(&disabled.id, "tcp"))
        .await
        .unwrap();
    let mut off = make_check(&enabled.id, "ping");
    off.enabled = false;
    store.insert_check(&off).await.unwrap();

    let scheduled = store.list_all_enabled_checks().await.unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].kind, "http");
    assert_eq!(scheduled[0].host, "example.com");
}

#[tokio::test]
async fn target_delete_cascades_and_removes_rule() {
    let store = setup().await;

    let target = store.insert_target(&make_target("soc")).await.unwrap();
    let check = store
        .insert_check(&make_check(&target.id, "tcp"))
        .await
        .unwrap();
    store
        .save_result(&make_result(&check.id, "up", 12))
        .await
        .unwrap();

    let rule_id = store
        .replace_target_conditions(
            &target.id,
            "AND",
            &[ConditionInput {
                check_id: check.id.clone(),
                field: "status".to_string(),
                comparator: "eq".to_string(),
                value: "down".to_string(),
                fail_count: 1,
                fail_window: 0,
            }],
        )
        .await
        .unwrap();

    assert!(store.get_rule_state(&rule_id).await.unwrap().is_some());
    assert_eq!(
        store.get_target_id_by_rule_id(&rule_id).await.unwrap(),
        Some(target.id.clone())
    );

    assert!(store.delete_target(&target.id).await.unwrap());

    assert!(store.get_check(&check.id).await.unwrap().is_none());
    assert!(store.get_rule(&rule_id).await.unwrap().is_none());
    assert!(store.get_rule_state(&rule_id).await.unwrap().is_none());
    assert!(store.get_last_result(&check.id).await.unwrap().is_none());
    assert!(store
        .list_rule_conditions(&rule_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn replacing_conditions_reuses_the_hidden_rule() {
    let store = setup().await;

    let target = store.insert_target(&make_target("vpn")).await.unwrap();
    let check = store
        .insert_check(&make_check(&target.id, "ping"))
        .await
        .unwrap();

    let cond = ConditionInput {
        check_id: check.id.clone(),
        field: "status".to_string(),
        comparator: "eq".to_string(),
        value: "down".to_string(),
        fail_count: 2,
        fail_window: 5,
    };

    let first = store
        .replace_target_conditions(&target.id, "AND", &[cond.clone()])
        .await
        .unwrap();
    let second = store
        .replace_target_conditions(&target.id, "OR", &[cond.clone(), cond])
        .await
        .unwrap();

    assert_eq!(first, second);
    let rule = store.get_rule(&first).await.unwrap().unwrap();
    assert_eq!(rule.operator, "OR");

    let conds = store.list_rule_conditions(&first).await.unwrap();
    assert_eq!(conds.len(), 2);
    assert_eq!(conds[0].sort_order, 0);
    assert_eq!(conds[1].sort_order, 1);
}

#[tokio::test]
async fn recent_results_window_is_newest_first() {
    let store = setup().await;

    let target = store.insert_target(&make_target("api")).await.unwrap();
    let check = store
        .insert_check(&make_check(&target.id, "http"))
        .await
        .unwrap();

    for ms in [10, 20, 30, 40, 50] {
        store
            .save_result(&make_result(&check.id, "up", ms))
            .await
            .unwrap();
    }

    let window = store
        .get_recent_results_by_window(&check.id, 3)
        .await
        .unwrap();
    assert_eq!(window.len(), 3);
    assert_eq!(window[0].response_ms, 50);
    assert_eq!(window[2].response_ms, 30);

    let last = store.get_last_result(&check.id).await.unwrap().unwrap();
    assert_eq!(last.response_ms, 50);
}

#[tokio::test]
async fn purge_removes_only_old_results() {
    let store = setup().await;

    let target = store.insert_target(&make_target("mail")).await.unwrap();
    let check = store
        .insert_check(&make_check(&target.id, "tcp"))
        .await
        .unwrap();

    let mut old = make_result(&check.id, "down", 0);
    old.checked_at = Utc::now() - Duration::days(100);
    store.save_result(&old).await.unwrap();
    store
        .save_result(&make_result(&check.id, "up", 5))
        .await
        .unwrap();

    let removed = store.purge_old_results(90).await.unwrap();
    assert_eq!(removed, 1);

    let remaining = store
        .get_recent_results_by_window(&check.id, 10)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, "up");
}

#[tokio::test]
async fn rule_state_transitions_and_firing_rules() {
    let store = setup().await;

    let target = store.insert_target(&make_target("pam")).await.unwrap();
    let check = store
        .insert_check(&make_check(&target.id, "tcp"))
        .await
        .unwrap();
    let rule_id = store
        .replace_target_conditions(
            &target.id,
            "AND",
            &[ConditionInput {
                check_id: check.id,
                field: "status".to_string(),
                comparator: "eq".to_string(),
                value: "down".to_string(),
                fail_count: 1,
                fail_window: 0,
            }],
        )
        .await
        .unwrap();

    let state = store.get_rule_state(&rule_id).await.unwrap().unwrap();
    assert_eq!(state.current_state, "healthy");
    assert!(state.last_change.is_none());
    assert!(store.get_firing_rules().await.unwrap().is_empty());

    store
        .update_rule_state(&rule_id, "unhealthy")
        .await
        .unwrap();
    let state = store.get_rule_state(&rule_id).await.unwrap().unwrap();
    assert_eq!(state.current_state, "unhealthy");
    assert!(state.last_change.is_some());
    assert!(state.last_evaluated.is_some());

    let firing = store.get_firing_rules().await.unwrap();
    assert_eq!(firing.len(), 1);
    assert_eq!(firing[0].0, rule_id);
    assert_eq!(firing[0].1, target.id);

    let before = store.get_rule_state(&rule_id).await.unwrap().unwrap();
    store.touch_rule_evaluated(&rule_id).await.unwrap();
    let after = store.get_rule_state(&rule_id).await.unwrap().unwrap();
    assert_eq!(after.current_state, "unhealthy");
    assert_eq!(after.last_change, before.last_change);
}

#[tokio::test]
async fn alert_history_and_cooldown_lookup() {
    let store = setup().await;

    let target = store.insert_target(&make_target("siem")).await.unwrap();
    let user = store
        .create_user(&UserRow {
            id: bekci_common::id::next_id(),
            username: "ops".to_string(),
            email: "ops@example.com".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    assert!(store
        .get_last_alert_time("rule-1")
        .await
        .unwrap()
        .is_none());

    store
        .log_alert(&target.id, "rule-1", &user.id, "firing", "[ALERT] siem is DOWN")
        .await
        .unwrap();

    let last = store.get_last_alert_time("rule-1").await.unwrap();
    assert!(last.is_some());

    let (items, total) = store.list_alert_history(10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].target_name, "siem");
    assert_eq!(items[0].recipient_name, "ops");
    assert_eq!(items[0].kind, "firing");
}

#[tokio::test]
async fn recipients_follow_target_membership() {
    let store = setup().await;

    let target = store.insert_target(&make_target("dns")).await.unwrap();
    let alice = store
        .create_user(&UserRow {
            id: bekci_common::id::next_id(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    let bob = store
        .create_user(&UserRow {
            id: bekci_common::id::next_id(),
            username: "bob".to_string(),
            email: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    store
        .set_target_recipients(&target.id, &[alice.id.clone(), bob.id.clone()])
        .await
        .unwrap();
    let recipients = store.list_target_recipients(&target.id).await.unwrap();
    assert_eq!(recipients.len(), 2);
    assert_eq!(recipients[0].username, "alice");

    store
        .set_target_recipients(&target.id, &[bob.id.clone()])
        .await
        .unwrap();
    let recipients = store.list_target_recipients(&target.id).await.unwrap();
    assert_eq!(recipients.len(), 1);
    assert_eq!(recipients[0].username, "bob");
}

#[tokio::test]
async fn settings_default_seed_and_upsert() {
    let store = setup().await;

    assert_eq!(store.get_setting("history_days").await.unwrap(), "90");
    assert_eq!(store.get_setting("alert_method").await.unwrap(), "");
    assert_eq!(store.get_setting("no_such_key").await.unwrap(), "");
    assert_eq!(store.get_setting_i64("alert_cooldown_s", 0).await, 1800);
    assert_eq!(store.get_setting_i64("alert_method", 7).await, 7);

    let mut kv = std::collections::HashMap::new();
    kv.insert("alert_method".to_string(), "email".to_string());
    kv.insert("resend_api_key".to_string(), "k".to_string());
    store.set_settings(&kv).await.unwrap();

    assert_eq!(store.get_setting("alert_method").await.unwrap(), "email");
    let all = store.get_all_settings().await.unwrap();
    assert_eq!(all.get("resend_api_key").map(String::as_str), Some("k"));
}
