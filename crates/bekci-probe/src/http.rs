use crate::client::{shared_client, ClientKey};
use crate::{build_url, ProbeConfig, ProbeResult};
use serde_json::json;
use std::time::Instant;

pub(crate) async fn run_http(host: &str, config: &ProbeConfig) -> ProbeResult {
    let scheme = config.str("scheme", "https");
    let port = config.int("port", 0);
    let endpoint = config.str("endpoint", "/");
    let expect_status = config.int("expect_status", 200);
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
    // Latency is request start to headers received; the body is not read.
    let resp = client.get(&url).send().await;
    let elapsed = start.elapsed().as_millis() as i64;

    match resp {
        Ok(resp) => {
            let code = resp.status().as_u16() as i64;
            let final_url = resp.url().to_string();
            let mut result = if code == expect_status {
                ProbeResult::up(format!("HTTP {code}"))
            } else {
                ProbeResult::down(format!("expected {expect_status}, got {code}"))
            };
            result.response_ms = elapsed;
            result.metrics.insert("status_code".to_string(), json!(code));
            result.metrics.insert("url".to_string(), json!(final_url));
            result
        }
        Err(e) => {
            let mut result = ProbeResult::down(e.to_string());
            result.response_ms = elapsed;
            result.metrics.insert("url".to_string(), json!(url));
            result
        }
    }
}
