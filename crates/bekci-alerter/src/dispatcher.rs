use crate::templates::{realert_subject, render_email_alert, render_test_email};
use crate::Mailer;
use anyhow::Result;
use async_trait::async_trait;
use bekci_common::types::{AlertKind, HealthState};
use bekci_engine::TransitionSink;
use bekci_storage::Store;
use chrono::Utc;
use std::sync::Arc;

const DEFAULT_COOLDOWN_S: i64 = 1800;

/// Turns rule state transitions into alert emails.
///
/// Cooldown applies to firing alerts only; recoveries always go out. Every
/// attempted send is logged to alert history so operators can see attempts
/// whether or not the provider accepted them.
pub struct AlertDispatcher {
    store: Arc<Store>,
    mailer: Arc<dyn Mailer>,
}

impl AlertDispatcher {
    pub fn new(store: Arc<Store>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    pub async fn dispatch(&self, rule_id: &str, _old_state: HealthState, new_state: HealthState) {
        let target_id = match self.store.get_target_id_by_rule_id(rule_id).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::debug!(rule_id, "Alerter: no target linked to rule");
                return;
            }
            Err(e) => {
                tracing::error!(rule_id, error = %e, "Alerter: failed to get target for rule");
                return;
            }
        };

        let Some(settings) = self.email_settings().await else {
            return;
        };

        // Cooldown guards firing alerts only; recoveries bypass it.
        if new_state == HealthState::Unhealthy {
            let mut cooldown = self
                .store
                .get_setting_i64("alert_cooldown_s", DEFAULT_COOLDOWN_S)
                .await;
            if cooldown <= 0 {
                cooldown = DEFAULT_COOLDOWN_S;
            }
            match self.store.get_last_alert_time(rule_id).await {
                Ok(Some(last)) if (Utc::now() - last).num_seconds() < cooldown => {
                    tracing::debug!(rule_id, "Alerter: skipping alert, within cooldown");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(rule_id, error = %e, "Alerter: failed to read last alert time");
                    return;
                }
            }
        }

        let target = match self.store.get_target(&target_id).await {
            Ok(Some(t)) => t,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(target_id = %target_id, error = %e, "Alerter: failed to get target");
                return;
            }
        };

        let recipients = match self.store.list_target_recipients(&target_id).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(target_id = %target_id, error = %e, "Alerter: failed to get recipients");
                return;
            }
        };
        if recipients.is_empty() {
            tracing::debug!(target_id = %target_id, "Alerter: no recipients for target");
            return;
        }

        let kind = if new_state == HealthState::Healthy {
            AlertKind::Recovery
        } else {
            AlertKind::Firing
        };

        if settings.email_enabled {
            let (subject, html) =
                render_email_alert(&target.name, &target.host, new_state, Utc::now());

            for user in &recipients {
                if user.email.is_empty() {
                    continue;
                }
                match self
                    .mailer
                    .send(
                        &settings.api_key,
                        &settings.from_email,
                        &[user.email.clone()],
                        &subject,
                        &html,
                    )
                    .await
                {
                    Ok(()) => tracing::info!(
                        target = %target.name,
                        recipient = %user.username,
                        kind = %kind,
                        "Alerter: email sent"
                    ),
                    Err(e) => tracing::error!(
                        target = %target.name,
                        recipient = %user.username,
                        error = %e,
                        "Alerter: failed to send email"
                    ),
                }
                // Log regardless of send success, so we know we tried.
                if let Err(e) = self
                    .store
                    .log_alert(&target_id, rule_id, &user.id, &kind.to_string(), &subject)
                    .await
                {
                    tracing::error!(target_id = %target_id, rule_id, error = %e, "Alerter: failed to log alert");
                }
            }
        }

        if settings.signal_enabled {
            tracing::debug!("Alerter: signal alerting not yet implemented");
        }
    }

    /// Periodic tick: repeat still-firing alerts once their last alert is
    /// older than `alert_realert_s`.
    pub async fn check_realerts(&self) {
        let realert_s = self.store.get_setting_i64("alert_realert_s", 0).await;
        if realert_s <= 0 {
            return;
        }

        let Some(settings) = self.email_settings().await else {
            return;
        };

        let firing = match self.store.get_firing_rules().await {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(error = %e, "Alerter: failed to get firing rules");
                return;
            }
        };

        for (rule_id, target_id) in firing {
            let last = match self.store.get_last_alert_time(&rule_id).await {
                Ok(Some(last)) => last,
                // Never alerted: the transition path owns the first alert.
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(rule_id = %rule_id, error = %e, "Alerter: failed to read last alert time");
                    continue;
                }
            };
            if (Utc::now() - last).num_seconds() < realert_s {
                continue;
            }

            let Ok(Some(target)) = self.store.get_target(&target_id).await else {
                continue;
            };
            let Ok(recipients) = self.store.list_target_recipients(&target_id).await else {
                continue;
            };
            if recipients.is_empty() {
                continue;
            }

            if settings.email_enabled {
                let (subject, html) = render_email_alert(
                    &target.name,
                    &target.host,
                    HealthState::Unhealthy,
                    Utc::now(),
                );
                let subject = realert_subject(&subject);

                for user in &recipients {
                    if user.email.is_empty() {
                        continue;
                    }
                    match self
                        .mailer
                        .send(
                            &settings.api_key,
                            &settings.from_email,
                            &[user.email.clone()],
                            &subject,
                            &html,
                        )
                        .await
                    {
                        Ok(()) => tracing::info!(
                            target = %target.name,
                            recipient = %user.username,
                            "Alerter: re-alert email sent"
                        ),
                        Err(e) => tracing::error!(
                            target = %target.name,
                            recipient = %user.username,
                            error = %e,
                            "Alerter: re-alert email failed"
                        ),
                    }
                    if let Err(e) = self
                        .store
                        .log_alert(
                            &target_id,
                            &rule_id,
                            &user.id,
                            &AlertKind::ReAlert.to_string(),
                            &subject,
                        )
                        .await
                    {
                        tracing::error!(
                            target_id = %target_id,
                            rule_id = %rule_id,
                            error = %e,
                            "Alerter: failed to log re-alert"
                        );
                    }
                }
            }
        }
    }

    /// Send a fixed test message to verify the provider configuration.
    pub async fn send_test_email(&self, to: &str) -> Result<()> {
        let api_key = self.store.get_setting("resend_api_key").await?;
        let from_email = self.store.get_setting("alert_from_email").await?;
        if api_key.is_empty() || from_email.is_empty() {
            anyhow::bail!(
                "email alerting not configured: set resend_api_key and alert_from_email"
            );
        }

        let (subject, html) = render_test_email();
        self.mailer
            .send(&api_key, &from_email, &[to.to_string()], &subject, &html)
            .await
    }

    /// Resolve the alert method and provider credentials. `None` means the
    /// path is a no-op (disabled, or email selected without credentials).
    async fn email_settings(&self) -> Option<EmailSettings> {
        let method = match self.store.get_setting("alert_method").await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "Alerter: failed to read alert_method");
                return None;
            }
        };
        if method.is_empty() {
            return None;
        }

        let email_enabled = method == "email" || method == "email+signal";
        let signal_enabled = method == "signal" || method == "email+signal";

        let api_key = self.store.get_setting("resend_api_key").await.ok()?;
        let from_email = self.store.get_setting("alert_from_email").await.ok()?;

        if email_enabled && (api_key.is_empty() || from_email.is_empty()) {
            tracing::warn!(
                "Alerter: email alerting configured but resend_api_key or alert_from_email is empty"
            );
            return None;
        }

        Some(EmailSettings {
            email_enabled,
            signal_enabled,
            api_key,
            from_email,
        })
    }
}

struct EmailSettings {
    email_enabled: bool,
    signal_enabled: bool,
    api_key: String,
    from_email: String,
}

#[async_trait]
impl TransitionSink for AlertDispatcher {
    async fn dispatch(&self, rule_id: &str, old_state: HealthState, new_state: HealthState) {
        AlertDispatcher::dispatch(self, rule_id, old_state, new_state).await;
    }
}
