use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

/// Why a single probe failed. Every variant is per-host and non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// DNS failure, refused or unreachable host, or an unusable hostname.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connect plus handshake did not finish within the budget.
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// TLS negotiation failed, including certificate trust failures.
    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    /// The peer sent no certificate or its not-after could not be read.
    #[error("certificate parse failed: {0}")]
    CertificateParse(String),
}

impl ProbeError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Connection(_) => "ConnectionError",
            ProbeError::Timeout(_) => "TimeoutError",
            ProbeError::Handshake(_) => "HandshakeError",
            ProbeError::CertificateParse(_) => "CertificateParseError",
        }
    }
}

/// Retrieves the not-after timestamp of a host's leaf certificate.
#[async_trait]
pub trait ExpiryProber: Send + Sync {
    async fn probe(&self, hostname: &str, timeout: Duration) -> Result<DateTime<Utc>, ProbeError>;
}

/// Probes over a real TCP + TLS connection.
///
/// The handshake verifies the chain against the bundled Mozilla roots (or a
/// caller-supplied store), so an untrusted or expired chain is reported as
/// [`ProbeError::Handshake`].
pub struct TlsProber {
    connector: TlsConnector,
    port: u16,
}

impl TlsProber {
    pub fn new(port: u16) -> Result<Self, rustls::Error> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(root_store, port)
    }

    pub fn with_roots(root_store: RootCertStore, port: u16) -> Result<Self, rustls::Error> {
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            port,
        })
    }

    async fn fetch_leaf(
        &self,
        hostname: &str,
        server_name: ServerName<'static>,
    ) -> Result<CertificateDer<'static>, ProbeError> {
        let tcp = TcpStream::connect((hostname, self.port))
            .await
            .map_err(|e| ProbeError::Connection(format!("{hostname}:{}: {e}", self.port)))?;

        let tls_stream = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| ProbeError::Handshake(e.to_string()))?;

        let (_io, conn) = tls_stream.get_ref();
        conn.peer_certificates()
            .and_then(|certs| certs.first())
            .cloned()
            .ok_or_else(|| ProbeError::CertificateParse("peer presented no certificate".into()))
    }
}

#[async_trait]
impl ExpiryProber for TlsProber {
    async fn probe(&self, hostname: &str, timeout: Duration) -> Result<DateTime<Utc>, ProbeError> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Err(ProbeError::Connection("hostname is empty".into()));
        }
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|e| ProbeError::Connection(format!("invalid hostname '{hostname}': {e}")))?;

        // One budget for connect and handshake together.
        let leaf = tokio::time::timeout(timeout, self.fetch_leaf(hostname, server_name))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;

        not_after_from_der(leaf.as_ref())
    }
}

/// Reads the not-after field of a DER-encoded X.509 certificate.
pub fn not_after_from_der(der: &[u8]) -> Result<DateTime<Utc>, ProbeError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| ProbeError::CertificateParse(format!("invalid X.509 certificate: {e}")))?;
    let ts = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| ProbeError::CertificateParse(format!("not-after out of range: {ts}")))
}
