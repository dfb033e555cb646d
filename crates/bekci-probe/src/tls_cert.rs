//! TLS certificate expiry probe.
//!
//! Connects without trust validation so the chain can be read even when the
//! certificate is self-signed or already expired, then checks days remaining
//! on the leaf against the warning threshold.

use crate::{join_host_port, ProbeConfig, ProbeResult};
use chrono::{DateTime, Utc};
use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

pub(crate) async fn run_tls_cert(host: &str, config: &ProbeConfig) -> ProbeResult {
    let port = config.int("port", 443).clamp(1, 65535) as u16;
    let warn_days = config.int("warn_days", 30);
    let timeout_s = config.int("timeout_s", 10).max(1) as u64;

    let addr = join_host_port(host, port);
    let start = Instant::now();

    let leaf = match fetch_leaf_certificate(host, &addr, timeout_s).await {
        Ok(der) => der,
        Err(msg) => {
            let mut r = ProbeResult::down(msg);
            r.response_ms = start.elapsed().as_millis() as i64;
            r.metrics.insert("addr".to_string(), json!(addr));
            return r;
        }
    };
    let elapsed = start.elapsed().as_millis() as i64;

    let (_, cert) = match X509Certificate::from_der(&leaf) {
        Ok(parsed) => parsed,
        Err(e) => {
            let mut r = ProbeResult::down(format!("failed to parse certificate: {e}"));
            r.response_ms = elapsed;
            r.metrics.insert("addr".to_string(), json!(addr));
            return r;
        }
    };

    let not_before_ts = cert.validity().not_before.to_datetime().unix_timestamp();
    let not_after_ts = cert.validity().not_after.to_datetime().unix_timestamp();
    let not_before = DateTime::from_timestamp(not_before_ts, 0).unwrap_or_default();
    let not_after = DateTime::from_timestamp(not_after_ts, 0).unwrap_or_default();
    let now = Utc::now();
    let days_left = (not_after - now).num_seconds().div_euclid(86_400);

    let issuer = cert.issuer().to_string();
    let subject = cert.subject().to_string();

    let mut result = if days_left >= warn_days {
        ProbeResult::up(format!("cert valid, {days_left} days remaining"))
    } else if days_left < 0 {
        ProbeResult::down(format!("cert expired {} days ago", -days_left))
    } else {
        ProbeResult::down(format!(
            "cert expires in {days_left} days (warn threshold: {warn_days})"
        ))
    };
    result.response_ms = elapsed;
    result.metrics.insert("days_left".to_string(), json!(days_left));
    result.metrics.insert("issuer".to_string(), json!(issuer));
    result.metrics.insert("subject".to_string(), json!(subject));
    result
        .metrics
        .insert("not_after".to_string(), json!(not_after.to_rfc3339()));
    result
        .metrics
        .insert("not_before".to_string(), json!(not_before.to_rfc3339()));
    result
}

async fn fetch_leaf_certificate(
    host: &str,
    addr: &str,
    timeout_s: u64,
) -> Result<Vec<u8>, String> {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| format!("invalid server name: {e}"))?;

    let tcp = tokio::time::timeout(
        Duration::from_secs(timeout_s),
        TcpStream::connect(addr),
    )
    .await
    .map_err(|_| format!("TLS connect timed out after {timeout_s}s"))?
    .map_err(|e| format!("TLS connect failed: {e}"))?;

    let tls_stream = tokio::time::timeout(
        Duration::from_secs(timeout_s),
        connector.connect(server_name, tcp),
    )
    .await
    .map_err(|_| "TLS handshake timed out".to_string())?
    .map_err(|e| format!("TLS handshake failed: {e}"))?;

    let (_io, conn) = tls_stream.into_inner();
    let certs = conn
        .peer_certificates()
        .ok_or_else(|| "no certificates presented".to_string())?;
    if certs.is_empty() {
        return Err("no certificates presented".to_string());
    }
    Ok(certs[0].as_ref().to_vec())
}

/// Accepts any server certificate. The probe's contract is to read the
/// chain, not to judge trust; expiry is evaluated from the parsed leaf.
#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
