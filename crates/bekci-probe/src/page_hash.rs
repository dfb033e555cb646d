//! Page-hash probe: a tamper/defacement canary. Fetches the body, hashes it
//! with SHA-256, and compares against a captured baseline.

use crate::client::{shared_client, ClientKey};
use crate::{build_url, ProbeConfig, ProbeResult};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Instant;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub(crate) async fn run_page_hash(host: &str, config: &ProbeConfig) -> ProbeResult {
    let scheme = config.str("scheme", "https");
    let port = config.int("port", 0);
    let endpoint = config.str("endpoint", "/");
    let baseline_hash = config.str("baseline_hash", "");
    let skip_tls = config.bool("skip_tls_verify", false);
    let timeout_s = config.int("timeout_s", 10).max(1) as u64;

    let url = build_url(&scheme, host, port, &endpoint);

    let client = match shared_client(ClientKey {
        skip_tls_verify: skip_tls,
        follow_redirects: true,
        timeout_s,
    }) {
        Ok(c) => c,
        Err(e) => {
            let mut r = ProbeResult::down(format!("http client init: {e}"));
            r.metrics.insert("url".to_string(), json!(url));
            return r;
        }
    };

    let start = Instant::now();
    let mut resp = match client.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            let mut r = ProbeResult::down(e.to_string());
            r.response_ms = start.elapsed().as_millis() as i64;
            r.metrics.insert("url".to_string(), json!(url));
            return r;
        }
    };
    let elapsed = start.elapsed().as_millis() as i64;

    let mut body: Vec<u8> = Vec::new();
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => {
                let room = MAX_BODY_BYTES - body.len();
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if body.len() >= MAX_BODY_BYTES {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let mut r = ProbeResult::down(format!("failed to read body: {e}"));
                r.response_ms = elapsed;
                r.metrics.insert("url".to_string(), json!(url));
                return r;
            }
        }
    }

    let hash = hex_digest(&body);

    // No baseline yet: report up and hand the hash back for capture.
    if baseline_hash.is_empty() {
        let mut r = ProbeResult::up("baseline hash captured");
        r.response_ms = elapsed;
        r.metrics.insert("hash".to_string(), json!(hash));
        r.metrics.insert("url".to_string(), json!(url));
        r.metrics
            .insert("baseline_captured".to_string(), json!(true));
        return r;
    }

    let mut result = if hash == baseline_hash {
        ProbeResult::up("hash matches baseline")
    } else {
        ProbeResult::down("hash mismatch")
    };
    result.response_ms = elapsed;
    result.metrics.insert("hash".to_string(), json!(hash));
    result
        .metrics
        .insert("baseline_hash".to_string(), json!(baseline_hash));
    result.metrics.insert("url".to_string(), json!(url));
    result
}

pub(crate) fn hex_digest(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
