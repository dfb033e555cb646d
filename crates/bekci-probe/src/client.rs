use reqwest::redirect::Policy;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

/// Clients are memoized per configuration so connections get reused across
/// runs of the same check. Keyed on configuration, never on host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ClientKey {
    pub skip_tls_verify: bool,
    pub follow_redirects: bool,
    pub timeout_s: u64,
}

static CLIENTS: OnceLock<RwLock<HashMap<ClientKey, Client>>> = OnceLock::new();

pub(crate) fn shared_client(key: ClientKey) -> Result<Client, reqwest::Error> {
    let table = CLIENTS.get_or_init(|| RwLock::new(HashMap::new()));

    if let Some(client) = table.read().unwrap().get(&key) {
        return Ok(client.clone());
    }

    let redirect = if key.follow_redirects {
        Policy::limited(10)
    } else {
        Policy::none()
    };
    let client = Client::builder()
        .timeout(Duration::from_secs(key.timeout_s))
        .redirect(redirect)
        .danger_accept_invalid_certs(key.skip_tls_verify)
        .build()?;
    tracing::debug!(?key, "Built probe HTTP client");

    table.write().unwrap().entry(key).or_insert(client.clone());
    Ok(client)
}
