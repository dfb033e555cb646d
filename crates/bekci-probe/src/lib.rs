//! Stateless network probes.
//!
//! Each probe maps `(host, config) -> ProbeResult`. Probe failures and
//! internal errors (bad config, missing privileges) surface as `down`
//! results with a human message; probes never return `Err`.

mod client;
mod dns;
mod http;
mod page_hash;
mod ping;
mod tcp;
mod tls_cert;

#[cfg(test)]
mod tests;

use bekci_common::types::{CheckKind, CheckStatus};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::Instant;

/// Outcome of a single probe run.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub status: CheckStatus,
    pub response_ms: i64,
    pub message: String,
    pub metrics: Map<String, Value>,
}

impl ProbeResult {
    pub fn up(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Up,
            response_ms: 0,
            message: message.into(),
            metrics: Map::new(),
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Down,
            response_ms: 0,
            message: message.into(),
            metrics: Map::new(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == CheckStatus::Up
    }
}

/// Per-check probe configuration: an opaque JSON object with defaulted
/// accessors. Unknown keys are ignored; malformed JSON reads as empty.
#[derive(Debug, Clone, Default)]
pub struct ProbeConfig(Map<String, Value>);

impl ProbeConfig {
    pub fn from_json(raw: &str) -> Self {
        if raw.is_empty() || raw == "{}" {
            return Self::default();
        }
        match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(map) => Self(map),
            Err(_) => Self::default(),
        }
    }

    pub fn str(&self, key: &str, default: &str) -> String {
        match self.0.get(key).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => default.to_string(),
        }
    }

    pub fn int(&self, key: &str, default: i64) -> i64 {
        match self.0.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            _ => default,
        }
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

/// Dispatch to the probe for `kind` and normalize the result: elapsed wall
/// time is stamped when the probe reported none, and the metrics map is
/// always present.
pub async fn run(kind: &str, host: &str, config: &ProbeConfig) -> ProbeResult {
    let start = Instant::now();

    let mut result = match CheckKind::from_str(kind) {
        Ok(CheckKind::Http) => http::run_http(host, config).await,
        Ok(CheckKind::Tcp) => tcp::run_tcp(host, config).await,
        Ok(CheckKind::Ping) => ping::run_ping(host, config).await,
        Ok(CheckKind::Dns) => dns::run_dns(host, config).await,
        Ok(CheckKind::PageHash) => page_hash::run_page_hash(host, config).await,
        Ok(CheckKind::TlsCert) => tls_cert::run_tls_cert(host, config).await,
        Err(_) => ProbeResult::down(format!("unknown check type: {kind}")),
    };

    if result.response_ms == 0 {
        result.response_ms = start.elapsed().as_millis() as i64;
    }
    result
}

/// Compose `host:port`, bracketing IPv6 literals.
pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Build an HTTP(S) URL for a host, optional port, and endpoint path.
pub(crate) fn build_url(scheme: &str, host: &str, port: i64, endpoint: &str) -> String {
    let host_part = if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    let mut url = if port > 0 {
        format!("{scheme}://{host_part}:{port}")
    } else {
        format!("{scheme}://{host_part}")
    };
    url.push_str(endpoint);
    url
}
