use crate::dispatcher::AlertDispatcher;
use crate::templates::{realert_subject, render_email_alert};
use crate::Mailer;
use anyhow::Result;
use async_trait::async_trait;
use bekci_common::types::HealthState;
use bekci_storage::{Store, TargetRow, UserRow};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct SentEmail {
    to: Vec<String>,
    subject: String,
}

/// Records sends; optionally fails every send to exercise the
/// log-regardless path.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        _api_key: &str,
        _from: &str,
        to: &[String],
        subject: &str,
        _html: &str,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_vec(),
            subject: subject.to_string(),
        });
        if self.fail.load(Ordering::Relaxed) {
            anyhow::bail!("resend API error 500: boom");
        }
        Ok(())
    }
}

struct Fixture {
    store: Arc<Store>,
    mailer: Arc<RecordingMailer>,
    dispatcher: AlertDispatcher,
    target_id: String,
    rule_id: String,
}

/// Target with a linked (hidden) rule and the given recipients, with email
/// alerting fully configured.
async fn fixture(recipient_emails: &[&str]) -> Fixture {
    bekci_common::id::init(1, 1);
    let store = Arc::new(Store::new_in_memory().await.unwrap());

    let target = store
        .insert_target(&TargetRow {
            id: bekci_common::id::next_id(),
            name: "core-switch".to_string(),
            host: "10.0.0.2".to_string(),
            description: String::new(),
            enabled: true,
            category: "Network".to_string(),
            preferred_check_type: "tcp".to_string(),
            operator: "AND".to_string(),
            rule_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    let check = store
        .insert_check(&bekci_storage::CheckRow {
            id: bekci_common::id::next_id(),
            target_id: target.id.clone(),
            kind: "tcp".to_string(),
            name: "ssh".to_string(),
            config: "{}".to_string(),
            interval_s: 60,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    let rule_id = store
        .replace_target_conditions(
            &target.id,
            "AND",
            &[bekci_storage::ConditionInput {
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

    let mut user_ids = Vec::new();
    for (i, email) in recipient_emails.iter().enumerate() {
        let user = store
            .create_user(&UserRow {
                id: bekci_common::id::next_id(),
                username: format!("user{i}"),
                email: email.to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        user_ids.push(user.id);
    }
    store
        .set_target_recipients(&target.id, &user_ids)
        .await
        .unwrap();

    let mut settings = HashMap::new();
    settings.insert("alert_method".to_string(), "email".to_string());
    settings.insert("resend_api_key".to_string(), "k".to_string());
    settings.insert("alert_from_email".to_string(), "a@b".to_string());
    store.set_settings(&settings).await.unwrap();

    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = AlertDispatcher::new(store.clone(), mailer.clone());
    Fixture {
        store,
        mailer,
        dispatcher,
        target_id: target.id,
        rule_id,
    }
}

fn sent(mailer: &RecordingMailer) -> Vec<SentEmail> {
    mailer.sent.lock().unwrap().clone()
}

#[tokio::test]
async fn firing_transition_fans_out_to_every_recipient() {
    let f = fixture(&["u@x", "v@x"]).await;

    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Healthy, HealthState::Unhealthy)
        .await;

    let emails = sent(&f.mailer);
    assert_eq!(emails.len(), 2);
    assert_eq!(emails[0].subject, "[ALERT] core-switch is DOWN");
    assert_eq!(emails[0].to, vec!["u@x".to_string()]);

    let (items, total) = f.store.list_alert_history(10, 0).await.unwrap();
    assert_eq!(total, 2);
    assert!(items.iter().all(|i| i.kind == "firing"));
    assert!(items.iter().all(|i| i.subject == "[ALERT] core-switch is DOWN"));
}

#[tokio::test]
async fn recipients_without_email_are_skipped() {
    let f = fixture(&["u@x", ""]).await;

    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Healthy, HealthState::Unhealthy)
        .await;

    assert_eq!(sent(&f.mailer).len(), 1);
    let (_, total) = f.store.list_alert_history(10, 0).await.unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn cooldown_suppresses_repeat_firing() {
    let f = fixture(&["u@x"]).await;

    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Healthy, HealthState::Unhealthy)
        .await;
    // Second transition a moment later, well within the 1800s default.
    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Healthy, HealthState::Unhealthy)
        .await;

    assert_eq!(sent(&f.mailer).len(), 1);
    let (_, total) = f.store.list_alert_history(10, 0).await.unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn recovery_bypasses_cooldown() {
    let f = fixture(&["u@x"]).await;

    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Healthy, HealthState::Unhealthy)
        .await;
    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Unhealthy, HealthState::Healthy)
        .await;

    let emails = sent(&f.mailer);
    assert_eq!(emails.len(), 2);
    assert_eq!(emails[1].subject, "[RECOVERED] core-switch is UP");

    let (items, _) = f.store.list_alert_history(10, 0).await.unwrap();
    assert!(items.iter().any(|i| i.kind == "recovery"));
}

#[tokio::test]
async fn send_failures_are_still_logged() {
    let f = fixture(&["u@x"]).await;
    f.mailer.fail.store(true, Ordering::Relaxed);

    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Healthy, HealthState::Unhealthy)
        .await;

    let (items, total) = f.store.list_alert_history(10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].kind, "firing");
}

#[tokio::test]
async fn empty_alert_method_disables_alerting() {
    let f = fixture(&["u@x"]).await;
    let mut kv = HashMap::new();
    kv.insert("alert_method".to_string(), String::new());
    f.store.set_settings(&kv).await.unwrap();

    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Healthy, HealthState::Unhealthy)
        .await;

    assert!(sent(&f.mailer).is_empty());
    let (_, total) = f.store.list_alert_history(10, 0).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn email_without_credentials_is_a_noop() {
    let f = fixture(&["u@x"]).await;
    let mut kv = HashMap::new();
    kv.insert("resend_api_key".to_string(), String::new());
    f.store.set_settings(&kv).await.unwrap();

    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Healthy, HealthState::Unhealthy)
        .await;

    assert!(sent(&f.mailer).is_empty());
}

#[tokio::test]
async fn no_recipients_means_no_alert() {
    let f = fixture(&[]).await;

    f.dispatcher
        .dispatch(&f.rule_id, HealthState::Healthy, HealthState::Unhealthy)
        .await;

    assert!(sent(&f.mailer).is_empty());
    let (_, total) = f.store.list_alert_history(10, 0).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn realerts_disabled_by_default() {
    let f = fixture(&["u@x"]).await;

    f.store
        .update_rule_state(&f.rule_id, "unhealthy")
        .await
        .unwrap();
    f.dispatcher.check_realerts().await;

    assert!(sent(&f.mailer).is_empty());
}

#[tokio::test]
async fn realert_waits_for_first_alert_and_threshold() {
    let f = fixture(&["u@x"]).await;
    let mut kv = HashMap::new();
    kv.insert("alert_realert_s".to_string(), "60".to_string());
    f.store.set_settings(&kv).await.unwrap();

    f.store
        .update_rule_state(&f.rule_id, "unhealthy")
        .await
        .unwrap();

    // Firing but never alerted: the transition path owns the first alert.
    f.dispatcher.check_realerts().await;
    assert!(sent(&f.mailer).is_empty());

    // A fresh alert is younger than the threshold.
    f.store
        .log_alert(&f.target_id, &f.rule_id, "u1", "firing", "[ALERT] core-switch is DOWN")
        .await
        .unwrap();
    f.dispatcher.check_realerts().await;
    assert!(sent(&f.mailer).is_empty());
}

#[tokio::test]
async fn test_email_requires_credentials() {
    let f = fixture(&[]).await;

    assert!(f.dispatcher.send_test_email("x@y").await.is_ok());
    assert_eq!(sent(&f.mailer).len(), 1);
    assert_eq!(sent(&f.mailer)[0].subject, "[Bekci] Test Email");

    let mut kv = HashMap::new();
    kv.insert("resend_api_key".to_string(), String::new());
    f.store.set_settings(&kv).await.unwrap();
    assert!(f.dispatcher.send_test_email("x@y").await.is_err());
}

#[test]
fn alert_templates_carry_name_host_and_timestamp() {
    let ts = Utc.with_ymd_and_hms(2025, 3, 9, 14, 30, 0).unwrap();

    let (subject, html) =
        render_email_alert("core-switch", "10.0.0.2", HealthState::Unhealthy, ts);
    assert_eq!(subject, "[ALERT] core-switch is DOWN");
    assert!(html.contains("core-switch"));
    assert!(html.contains("10.0.0.2"));
    assert!(html.contains("09/03/2025 14:30 UTC"));
    assert!(html.contains("DOWN"));

    let (subject, html) =
        render_email_alert("core-switch", "10.0.0.2", HealthState::Healthy, ts);
    assert_eq!(subject, "[RECOVERED] core-switch is UP");
    assert!(html.contains("RECOVERED"));
}

#[test]
fn realert_subject_rewrites_the_prefix() {
    assert_eq!(
        realert_subject("[ALERT] core-switch is DOWN"),
        "[RE-ALERT] core-switch is DOWN"
    );
    assert_eq!(realert_subject("odd subject"), "[RE-ALERT] odd subject");
}
