use crate::{join_host_port, ProbeConfig, ProbeResult};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

pub(crate) async fn run_tcp(host: &str, config: &ProbeConfig) -> ProbeResult {
    let port = config.int("port", 80).clamp(1, 65535) as u16;
    let timeout_s = config.int("timeout_s", 5).max(1) as u64;

    let addr = join_host_port(host, port);
    let start = Instant::now();

    let outcome = tokio::time::timeout(
        Duration::from_secs(timeout_s),
        TcpStream::connect(&addr),
    )
    .await;
    let elapsed = start.elapsed().as_millis() as i64;

    let mut result = match outcome {
        Ok(Ok(_stream)) => ProbeResult::up(format!("connected to {addr}")),
        Ok(Err(e)) => ProbeResult::down(format!("tcp connect failed: {e}")),
        Err(_) => ProbeResult::down(format!("tcp connect timed out after {timeout_s}s")),
    };
    result.response_ms = elapsed;
    result.metrics.insert("addr".to_string(), json!(addr));
    result
}
