use std::sync::Arc;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::bootstrap::Endpoint;
use crate::error::UpstreamError;
use crate::pipelined::StreamDialer;

/// DNS-over-TLS dialer (§4.1): a TCP connect followed by a TLS handshake
/// against `endpoint.server_name()`, independent of whatever address was
/// actually dialled (bootstrap-address support).
#[derive(Debug, Clone)]
pub struct TlsDialer {
    endpoint: Endpoint,
    connector: TlsConnector,
}

impl TlsDialer {
    pub fn new(endpoint: Endpoint, client_config: ClientConfig) -> Self {
        Self {
            endpoint,
            connector: TlsConnector::from(Arc::new(client_config)),
        }
    }

    /// A connector trusting the common webpki roots, the usual default for
    /// public DoT resolvers.
    pub fn with_webpki_roots(endpoint: Endpoint) -> Self {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
        Self::new(endpoint, config)
    }
}

#[async_trait]
impl StreamDialer for TlsDialer {
    type Stream = TlsStream<TcpStream>;

    async fn dial(&self) -> Result<Self::Stream, UpstreamError> {
        let addr = self
            .endpoint
            .connect_addr()
            .ok_or_else(|| UpstreamError::Dial("no resolvable connect address".into()))?;
        let tcp = TcpStream::connect(addr).await.map_err(UpstreamError::Io)?;

        let server_name = ServerName::try_from(self.endpoint.server_name().to_string())
            .map_err(|_| UpstreamError::Dial(format!("invalid TLS server name: {}", self.endpoint.server_name())))?;

        self.connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| UpstreamError::Dial(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webpki_dialer_builds_without_panicking() {
        let endpoint = Endpoint::new("dns.example.com", 853);
        let _dialer = TlsDialer::with_webpki_roots(endpoint);
    }
}
