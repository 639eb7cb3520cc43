use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use webrtc_dtls::config::Config;
use webrtc_dtls::conn::DTLSConn;
use webrtc_util::conn::Conn;

use crate::bootstrap::Endpoint;
use crate::error::UpstreamError;
use crate::pipelined::StreamDialer;

/// DTLS dialer for the pipelined client (§4.1 "the same design is used
/// for... DTLS"). `webrtc-dtls`'s `DTLSConn` implements `AsyncRead`/
/// `AsyncWrite` over the handshake-protected datagram transport, so once
/// connected it slots into the same length-prefixed framing the TCP/DoT
/// dialers use.
#[derive(Debug, Clone)]
pub struct DtlsDialer {
    endpoint: Endpoint,
    config: Config,
}

impl DtlsDialer {
    pub fn new(endpoint: Endpoint, config: Config) -> Self {
        Self { endpoint, config }
    }
}

#[async_trait]
impl StreamDialer for DtlsDialer {
    type Stream = DtlsStream;

    async fn dial(&self) -> Result<Self::Stream, UpstreamError> {
        let addr = self
            .endpoint
            .connect_addr()
            .ok_or_else(|| UpstreamError::Dial("no resolvable connect address".into()))?;

        let local_bind = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let udp = UdpSocket::bind(local_bind).await.map_err(UpstreamError::Io)?;
        udp.connect(addr).await.map_err(UpstreamError::Io)?;

        let conn = DTLSConn::new(Arc::new(udp), self.config.clone(), true, None)
            .await
            .map_err(|e| UpstreamError::Dial(e.to_string()))?;

        Ok(DtlsStream { inner: Arc::new(conn) })
    }
}

/// An `AsyncRead + AsyncWrite` adapter over `webrtc_dtls::DTLSConn`'s
/// `webrtc_util::Conn` trait (`recv`/`send` rather than poll-based I/O).
pub struct DtlsStream {
    inner: Arc<DTLSConn>,
}

impl tokio::io::AsyncRead for DtlsStream {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let inner = self.inner.clone();
        let mut fut = Box::pin(async move {
            let mut tmp = vec![0u8; buf.remaining()];
            inner.recv(&mut tmp).await.map(|n| {
                tmp.truncate(n);
                tmp
            })
        });
        match fut.as_mut().poll(cx) {
            std::task::Poll::Ready(Ok(data)) => {
                buf.put_slice(&data);
                std::task::Poll::Ready(Ok(()))
            }
            std::task::Poll::Ready(Err(e)) => std::task::Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, e))),
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}

impl tokio::io::AsyncWrite for DtlsStream {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        let inner = self.inner.clone();
        let owned = buf.to_vec();
        let mut fut = Box::pin(async move { inner.send(&owned).await });
        match fut.as_mut().poll(cx) {
            std::task::Poll::Ready(Ok(n)) => std::task::Poll::Ready(Ok(n)),
            std::task::Poll::Ready(Err(e)) => std::task::Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, e))),
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }

    fn poll_flush(self: std::pin::Pin<&mut Self>, _cx: &mut std::task::Context<'_>) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: std::pin::Pin<&mut Self>, _cx: &mut std::task::Context<'_>) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}
