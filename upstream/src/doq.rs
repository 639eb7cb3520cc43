use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quinn::{ClientConfig, Endpoint};
use routedns_core::DnsMessage;
use tokio::sync::Mutex;

use crate::bootstrap::Endpoint as UpstreamEndpoint;
use crate::error::UpstreamError;

/// DNS-over-QUIC client (RFC 9250): one bidirectional stream per query
/// rather than id multiplexing (§4.1 "QUIC-specific variation"). The
/// connection is reused across queries; on stream-open failure it is closed
/// with the RFC 9250 "no error" code and re-dialled once before failing the
/// query.
pub struct DoqClient {
    id: String,
    endpoint: Endpoint,
    target: SocketAddr,
    server_name: String,
    client_config: ClientConfig,
    connection: Mutex<Option<quinn::Connection>>,
}

/// RFC 9250 §4.3: applications SHOULD use the "No Error" code when closing
/// a connection with no specific DoQ error to report.
const DOQ_NO_ERROR: quinn::VarInt = quinn::VarInt::from_u32(0);

impl DoqClient {
    pub fn new(id: impl Into<String>, endpoint: UpstreamEndpoint, client_config: ClientConfig) -> Result<Self, UpstreamError> {
        let target = endpoint
            .connect_addr()
            .ok_or_else(|| UpstreamError::Dial("no resolvable connect address".into()))?;
        let bind_addr: SocketAddr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" }.parse().unwrap();
        let mut quic_endpoint = Endpoint::client(bind_addr).map_err(|e| UpstreamError::Dial(e.to_string()))?;
        quic_endpoint.set_default_client_config(client_config.clone());

        Ok(Self {
            id: id.into(),
            endpoint: quic_endpoint,
            target,
            server_name: endpoint.server_name().to_string(),
            client_config,
            connection: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    async fn dial(&self) -> Result<quinn::Connection, UpstreamError> {
        self.endpoint
            .connect_with(self.client_config.clone(), self.target, &self.server_name)
            .map_err(|e| UpstreamError::Dial(e.to_string()))?
            .await
            .map_err(|e| UpstreamError::Dial(e.to_string()))
    }

    async fn connection(&self) -> Result<quinn::Connection, UpstreamError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            if conn.close_reason().is_none() {
                return Ok(conn.clone());
            }
        }
        let conn = self.dial().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn try_query_once(&self, bytes: &[u8], timeout: Duration) -> Result<Vec<u8>, UpstreamError> {
        let conn = self.connection().await?;
        let (mut send, mut recv) = tokio::time::timeout(timeout, conn.open_bi())
            .await
            .map_err(|_| UpstreamError::Timeout)?
            .map_err(|e| UpstreamError::Dial(e.to_string()))?;

        send.write_all(&(bytes.len() as u16).to_be_bytes())
            .await
            .map_err(|e| UpstreamError::Dial(e.to_string()))?;
        send.write_all(bytes).await.map_err(|e| UpstreamError::Dial(e.to_string()))?;
        send.finish().map_err(|e| UpstreamError::Dial(e.to_string()))?;

        tokio::time::timeout(timeout, recv.read_to_end(64 * 1024))
            .await
            .map_err(|_| UpstreamError::Timeout)?
            .map_err(|e| UpstreamError::Dial(e.to_string()))
    }

    pub async fn query(&self, query: &DnsMessage, timeout: Duration) -> Result<DnsMessage, UpstreamError> {
        let bytes = query.to_wire().map_err(UpstreamError::Encode)?;

        let result = self.try_query_once(&bytes, timeout).await;
        let raw = match result {
            Ok(raw) => raw,
            Err(_) => {
                // Stream-open (or send) failed: close and re-dial once, per §4.1.
                if let Some(conn) = self.connection.lock().await.take() {
                    conn.close(DOQ_NO_ERROR, b"");
                }
                self.try_query_once(&bytes, timeout).await?
            }
        };

        // DoQ frames the DNS message the same way as TCP: a 2-byte length
        // prefix, which `read_to_end` above has already stripped of nothing —
        // the prefix is still the first two bytes of the stream payload.
        let payload = raw.get(2..).ok_or(UpstreamError::Decode)?;
        let response = DnsMessage::from_wire(payload).map_err(|_| UpstreamError::Decode)?;
        if !response.question_matches(query) {
            return Err(UpstreamError::Decode);
        }
        Ok(response)
    }
}
