use crate::{ProbeConfig, ProbeResult};
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioResolver;
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub(crate) async fn run_dns(host: &str, config: &ProbeConfig) -> ProbeResult {
    let query = config.str("query", host);
    let record_type = config.str("record_type", "A").to_uppercase();
    let expect_value = config.str("expect_value", "");
    let nameserver = config.str("nameserver", "");
    let timeout_s = config.int("timeout_s", 5).max(1) as u64;

    let rtype = match record_type.as_str() {
        "A" => RecordType::A,
        "AAAA" => RecordType::AAAA,
        "MX" => RecordType::MX,
        "CNAME" => RecordType::CNAME,
        other => return ProbeResult::down(format!("unsupported record type: {other}")),
    };

    let resolver = match build_resolver(&nameserver) {
        Ok(r) => r,
        Err(msg) => return ProbeResult::down(msg),
    };

    let start = Instant::now();
    let lookup = tokio::time::timeout(
        Duration::from_secs(timeout_s),
        resolver.lookup(query.as_str(), rtype),
    )
    .await;
    let elapsed = start.elapsed().as_millis() as i64;

    let mut metrics = serde_json::Map::new();
    metrics.insert("query".to_string(), json!(query));
    metrics.insert("record_type".to_string(), json!(record_type));

    let resolved: Vec<String> = match lookup {
        Ok(Ok(lookup)) => lookup.iter().filter_map(format_rdata).collect(),
        Ok(Err(e)) => {
            let mut result = ProbeResult::down(format!("DNS lookup failed: {e}"));
            result.response_ms = elapsed;
            result.metrics = metrics;
            return result;
        }
        Err(_) => {
            let mut result =
                ProbeResult::down(format!("DNS lookup timed out after {timeout_s}s"));
            result.response_ms = elapsed;
            result.metrics = metrics;
            return result;
        }
    };

    metrics.insert("resolved".to_string(), json!(resolved));

    let mut result = if !expect_value.is_empty() {
        let want = expect_value.trim_end_matches('.');
        if resolved.iter().any(|v| v.trim_end_matches('.') == want) {
            ProbeResult::up(format!("resolved: {}", resolved.join(", ")))
        } else {
            ProbeResult::down(format!(
                "expected {expect_value}, got {}",
                resolved.join(", ")
            ))
        }
    } else {
        ProbeResult::up(format!("resolved: {}", resolved.join(", ")))
    };
    result.response_ms = elapsed;
    result.metrics = metrics;
    result
}

/// System resolver by default; an explicit nameserver is plain UDP/TCP,
/// colonless input meaning port 53.
fn build_resolver(nameserver: &str) -> Result<TokioResolver, String> {
    if nameserver.is_empty() {
        return Ok(TokioResolver::builder_tokio()
            .map_err(|e| format!("system resolver unavailable: {e}"))?
            .build());
    }

    let addr: SocketAddr = parse_nameserver(nameserver)
        .ok_or_else(|| format!("invalid nameserver: {nameserver}"))?;
    let group = NameServerConfigGroup::from_ips_clear(&[addr.ip()], addr.port(), true);
    let config = ResolverConfig::from_parts(None, vec![], group);
    Ok(TokioResolver::builder_with_config(config, TokioConnectionProvider::default()).build())
}

pub(crate) fn parse_nameserver(nameserver: &str) -> Option<SocketAddr> {
    if let Ok(addr) = nameserver.parse::<SocketAddr>() {
        return Some(addr);
    }
    // Bare IP, no port
    nameserver
        .parse::<std::net::IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, 53))
}

fn format_rdata(rdata: &RData) -> Option<String> {
    match rdata {
        RData::A(a) => Some(a.to_string()),
        RData::AAAA(aaaa) => Some(aaaa.to_string()),
        RData::MX(mx) => Some(mx.exchange().to_string()),
        RData::CNAME(cname) => Some(cname.0.to_string()),
        _ => None,
    }
}
