use std::time::Duration;

use routedns_core::DnsMessage;
use tokio::net::UdpSocket;

use crate::bootstrap::Endpoint;
use crate::error::UpstreamError;

/// UDP upstream client: a degenerate case of §4.1's pipelined design — no
/// persistent connection or pending table, each query is an independent
/// exchange bounded by a query timeout.
#[derive(Debug, Clone)]
pub struct UdpClient {
    id: String,
    endpoint: Endpoint,
    max_response_size: usize,
}

impl UdpClient {
    pub fn new(id: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            id: id.into(),
            endpoint,
            max_response_size: 4096,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn query(&self, query: &DnsMessage, timeout: Duration) -> Result<DnsMessage, UpstreamError> {
        let addr = self
            .endpoint
            .connect_addr()
            .ok_or_else(|| UpstreamError::Dial("no resolvable connect address".into()))?;

        let local_bind = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local_bind).await.map_err(UpstreamError::Io)?;
        socket.connect(addr).await.map_err(UpstreamError::Io)?;

        let bytes = query.to_wire().map_err(UpstreamError::Encode)?;

        tokio::time::timeout(timeout, socket.send(&bytes))
            .await
            .map_err(|_| UpstreamError::Timeout)?
            .map_err(UpstreamError::Io)?;

        let mut buf = vec![0u8; self.max_response_size];
        let len = tokio::time::timeout(timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| UpstreamError::Timeout)?
            .map_err(UpstreamError::Io)?;

        let response = DnsMessage::from_wire(&buf[..len]).map_err(|_| UpstreamError::Decode)?;
        if !response.question_matches(query) {
            return Err(UpstreamError::Decode);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;

    #[tokio::test]
    async fn exchanges_one_query_for_one_response() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let query = routedns_core::testing::fixed_query("example.com.", RecordType::A);
        let response = routedns_core::testing::fixed_a_response(&query, "1.2.3.4".parse().unwrap(), 60);
        let response_bytes = response.to_wire().unwrap();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let (len, peer) = server.recv_from(&mut buf).await.unwrap();
            let _ = len;
            server.send_to(&response_bytes, peer).await.unwrap();
        });

        let client = UdpClient::new("udp", Endpoint::new(server_addr.ip().to_string(), server_addr.port()));
        let result = client.query(&query, Duration::from_secs(1)).await.unwrap();
        assert_eq!(result.answers().len(), 1);
    }

    #[tokio::test]
    async fn times_out_when_nothing_answers() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        // Never respond; the socket stays bound so connect() succeeds but
        // no datagram ever arrives.

        let query = routedns_core::testing::fixed_query("example.com.", RecordType::A);
        let client = UdpClient::new("udp", Endpoint::new(server_addr.ip().to_string(), server_addr.port()));
        let result = client.query(&query, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(UpstreamError::Timeout)));
    }
}
