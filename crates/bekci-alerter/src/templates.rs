use bekci_common::types::HealthState;
use chrono::{DateTime, Utc};

/// Render the subject and HTML body for a firing or recovery alert.
pub fn render_email_alert(
    target_name: &str,
    target_host: &str,
    state: HealthState,
    ts: DateTime<Utc>,
) -> (String, String) {
    let timestamp = ts.format("%d/%m/%Y %H:%M UTC").to_string();

    match state {
        HealthState::Unhealthy => (
            format!("[ALERT] {target_name} is DOWN"),
            render_html(target_name, target_host, "DOWN", "#dc2626", &timestamp),
        ),
        HealthState::Healthy => (
            format!("[RECOVERED] {target_name} is UP"),
            render_html(target_name, target_host, "RECOVERED", "#16a34a", &timestamp),
        ),
    }
}

/// Rewrite a firing subject for the periodic re-alert loop.
pub fn realert_subject(subject: &str) -> String {
    match subject.strip_prefix("[ALERT]") {
        Some(rest) => format!("[RE-ALERT]{rest}"),
        None => format!("[RE-ALERT] {subject}"),
    }
}

pub fn render_test_email() -> (String, String) {
    let subject = "[Bekci] Test Email".to_string();
    let html = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;color:#1e293b;max-width:600px;margin:0 auto;padding:20px">
  <div style="border-left:4px solid #3b82f6;padding:12px 16px;background:#f8fafc;border-radius:0 6px 6px 0">
    <h2 style="margin:0 0 4px;font-size:18px;color:#3b82f6">Test Email</h2>
    <p style="margin:0;color:#64748b;font-size:14px">Your Bekci email alerting is configured correctly.</p>
  </div>
</body>
</html>"#
        .to_string();
    (subject, html)
}

fn render_html(
    target_name: &str,
    target_host: &str,
    state_label: &str,
    color: &str,
    timestamp: &str,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;color:#1e293b;max-width:600px;margin:0 auto;padding:20px">
  <div style="border-left:4px solid {color};padding:12px 16px;margin-bottom:20px;background:#f8fafc;border-radius:0 6px 6px 0">
    <h2 style="margin:0 0 4px;font-size:18px;color:{color}">{state_label} &mdash; {target_name}</h2>
    <p style="margin:0;color:#64748b;font-size:14px">{target_name} ({target_host})</p>
  </div>
  <p style="color:#94a3b8;font-size:12px;margin-top:24px">Sent by Bekci at {timestamp}</p>
</body>
</html>"#
    )
}
