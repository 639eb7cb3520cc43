use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use routedns_core::ResolverHandle;
use webrtc_dtls::config::Config;
use webrtc_util::conn::Conn;

use crate::acl::Acl;
use crate::contract::{self, Outcome};
use crate::error::ListenerError;
use crate::framing::{read_framed, write_framed};

/// DNS-over-DTLS listener (RFC 8094 draft lineage, §4.6 "the same design is
/// used for... DTLS"): one handshake per accepted association, then the same
/// length-prefixed framing as TCP/DoT over the protected datagram stream.
pub struct DtlsListener {
    id: String,
    listener: Box<dyn webrtc_util::conn::Listener + Send + Sync>,
    root: ResolverHandle,
    acl: Arc<Acl>,
}

impl DtlsListener {
    pub async fn bind(id: impl Into<String>, addr: SocketAddr, config: Config, root: ResolverHandle, acl: Acl) -> Result<Self, ListenerError> {
        let listener = webrtc_dtls::listener::listen(addr, config)
            .await
            .map_err(|e| ListenerError::Tls(e.to_string()))?;
        Ok(Self {
            id: id.into(),
            listener: Box::new(listener),
            root,
            acl: Arc::new(acl),
        })
    }

    pub async fn run(self) {
        loop {
            let (conn, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::debug!(target: "routedns::listener", error = %err, "dtls accept failed");
                    return;
                }
            };
            let root = Arc::clone(&self.root);
            let acl = Arc::clone(&self.acl);
            let listener_id = self.id.clone();
            tokio::spawn(async move {
                let mut stream = DtlsStream { inner: conn };
                if let Err(err) = serve_connection(&mut stream, peer, root, acl, listener_id).await {
                    tracing::debug!(target: "routedns::listener", error = %err, "dtls connection ended");
                }
            });
        }
    }
}

async fn serve_connection(
    stream: &mut DtlsStream,
    peer: SocketAddr,
    root: ResolverHandle,
    acl: Arc<Acl>,
    listener_id: String,
) -> Result<(), ListenerError> {
    loop {
        let Some(wire) = read_framed(stream).await? else {
            return Ok(());
        };
        let client = contract::client_info_for(peer.ip(), listener_id.clone());
        match contract::handle_query(&root, &acl, &wire, client).await {
            Outcome::Respond(response) => write_framed(stream, &response).await?,
            Outcome::Drop => return Ok(()),
        }
    }
}

/// An `AsyncRead + AsyncWrite` adapter over `webrtc_util::conn::Conn`'s
/// `recv`/`send` methods, identical in shape to `routedns-upstream`'s own
/// `DtlsStream` dialer-side adapter (kept separate since that type is
/// private to the upstream crate and the two sides have no reason to share
/// code).
struct DtlsStream {
    inner: Arc<dyn Conn + Send + Sync>,
}

impl tokio::io::AsyncRead for DtlsStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut tokio::io::ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let inner = self.inner.clone();
        let mut fut = Box::pin(async move {
            let mut tmp = vec![0u8; buf.remaining()];
            inner.recv(&mut tmp).await.map(|n| {
                tmp.truncate(n);
                tmp
            })
        });
        match fut.as_mut().poll(cx) {
            Poll::Ready(Ok(data)) => {
                buf.put_slice(&data);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, e))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl tokio::io::AsyncWrite for DtlsStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        let inner = self.inner.clone();
        let owned = buf.to_vec();
        let mut fut: Pin<Box<dyn Future<Output = Result<usize, _>> + Send>> = Box::pin(async move { inner.send(&owned).await });
        match fut.as_mut().poll(cx) {
            Poll::Ready(Ok(n)) => Poll::Ready(Ok(n)),
            Poll::Ready(Err(e)) => Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, e))),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
