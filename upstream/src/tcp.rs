use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::bootstrap::Endpoint;
use crate::error::UpstreamError;
use crate::pipelined::StreamDialer;

/// Plain TCP dialer for the pipelined client (§4.1 "the same design is used
/// for plain TCP").
#[derive(Debug, Clone)]
pub struct TcpDialer {
    endpoint: Endpoint,
}

impl TcpDialer {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl StreamDialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self) -> Result<Self::Stream, UpstreamError> {
        let addr = self
            .endpoint
            .connect_addr()
            .ok_or_else(|| UpstreamError::Dial("no resolvable connect address".into()))?;
        TcpStream::connect(addr).await.map_err(UpstreamError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dials_a_live_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let dialer = TcpDialer::new(Endpoint::new(addr.ip().to_string(), addr.port()));
        assert!(dialer.dial().await.is_ok());
    }

    #[tokio::test]
    async fn dial_failure_surfaces_as_an_error() {
        let dialer = TcpDialer::new(Endpoint::new("127.0.0.1", 1));
        assert!(dialer.dial().await.is_err());
    }
}
