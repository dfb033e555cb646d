use crate::{build_url, join_host_port, ProbeConfig};

#[test]
fn config_defaults_apply_to_missing_and_empty_keys() {
    let config = ProbeConfig::from_json(r#"{"scheme":"","port":8443,"skip_tls_verify":true}"#);
    assert_eq!(config.str("scheme", "https"), "https");
    assert_eq!(config.int("port", 0), 8443);
    assert!(config.bool("skip_tls_verify", false));
    assert_eq!(config.int("timeout_s", 10), 10);
    assert_eq!(config.str("endpoint", "/"), "/");
}

#[test]
fn config_tolerates_malformed_json() {
    let config = ProbeConfig::from_json("not json at all");
    assert_eq!(config.str("scheme", "https"), "https");
    assert_eq!(config.int("expect_status", 200), 200);
}

#[test]
fn config_accepts_float_encoded_integers() {
    // JSON numbers from the frontend often arrive as floats.
    let config = ProbeConfig::from_json(r#"{"port":443.0,"count":3.0}"#);
    assert_eq!(config.int("port", 0), 443);
    assert_eq!(config.int("count", 1), 3);
}

#[test]
fn url_building_brackets_ipv6() {
    assert_eq!(
        build_url("https", "example.com", 0, "/"),
        "https://example.com/"
    );
    assert_eq!(
        build_url("http", "example.com", 8080, "/health"),
        "http://example.com:8080/health"
    );
    assert_eq!(build_url("https", "2001:db8::1", 0, "/"), "https://[2001:db8::1]/");
    assert_eq!(
        build_url("https", "2001:db8::1", 8443, "/x"),
        "https://[2001:db8::1]:8443/x"
    );
}

#[test]
fn host_port_join_brackets_ipv6() {
    assert_eq!(join_host_port("example.com", 443), "example.com:443");
    assert_eq!(join_host_port("::1", 22), "[::1]:22");
}

#[test]
fn nameserver_parsing_defaults_to_port_53() {
    let addr = crate::dns::parse_nameserver("1.1.1.1").unwrap();
    assert_eq!(addr.port(), 53);
    let addr = crate::dns::parse_nameserver("1.1.1.1:5353").unwrap();
    assert_eq!(addr.port(), 5353);
    assert!(crate::dns::parse_nameserver("not-an-ip").is_none());
}

#[test]
fn sha256_digest_is_lowercase_hex() {
    let hash = crate::page_hash::hex_digest(b"");
    assert_eq!(
        hash,
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[tokio::test]
async fn unknown_kind_is_down_with_message() {
    let result = crate::run("snmp", "example.com", &ProbeConfig::default()).await;
    assert!(!result.is_up());
    assert!(result.message.contains("unknown check type"));
    assert!(result.metrics.is_empty());
}

#[tokio::test]
async fn tcp_probe_reports_down_on_unreachable_port() {
    // Reserved TEST-NET-1 address: connection cannot succeed.
    let config = ProbeConfig::from_json(r#"{"port":9999,"timeout_s":1}"#);
    let result = crate::run("tcp", "192.0.2.1", &config).await;
    assert!(!result.is_up());
    assert_eq!(
        result.metrics.get("addr").and_then(|v| v.as_str()),
        Some("192.0.2.1:9999")
    );
}

#[tokio::test]
async fn dns_probe_rejects_unsupported_record_type() {
    let config = ProbeConfig::from_json(r#"{"record_type":"TXT"}"#);
    let result = crate::run("dns", "example.com", &config).await;
    assert!(!result.is_up());
    assert!(result.message.contains("unsupported record type"));
}
