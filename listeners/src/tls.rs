use std::net::SocketAddr;
use std::sync::Arc;

use routedns_core::ResolverHandle;
use tokio::net::TcpListener as TokioTcpListener;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::acl::Acl;
use crate::contract::{self, Outcome};
use crate::error::ListenerError;
use crate::framing::{read_framed, write_framed};

/// DNS-over-TLS listener (DoT, RFC 7858): identical framing to plain TCP
/// (§4.6), wrapped in a TLS server handshake.
pub struct TlsListener {
    id: String,
    listener: TokioTcpListener,
    acceptor: TlsAcceptor,
    root: ResolverHandle,
    acl: Arc<Acl>,
}

impl TlsListener {
    pub async fn bind(
        id: impl Into<String>,
        addr: SocketAddr,
        server_config: ServerConfig,
        root: ResolverHandle,
        acl: Acl,
    ) -> std::io::Result<Self> {
        let listener = TokioTcpListener::bind(addr).await?;
        Ok(Self {
            id: id.into(),
            listener,
            acceptor: TlsAcceptor::from(Arc::new(server_config)),
            root,
            acl: Arc::new(acl),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let acceptor = self.acceptor.clone();
            let root = Arc::clone(&self.root);
            let acl = Arc::clone(&self.acl);
            let listener_id = self.id.clone();
            tokio::spawn(async move {
                let tls_stream = match acceptor.accept(stream).await {
                    Ok(s) => s,
                    Err(err) => {
                        tracing::debug!(target: "routedns::listener", error = %err, "tls handshake failed");
                        return;
                    }
                };
                let server_name = tls_stream
                    .get_ref()
                    .1
                    .server_name()
                    .map(|s| s.to_string());
                if let Err(err) = serve_connection(tls_stream, peer, root, acl, listener_id, server_name).await {
                    tracing::debug!(target: "routedns::listener", error = %err, "dot connection ended");
                }
            });
        }
    }
}

async fn serve_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    root: ResolverHandle,
    acl: Arc<Acl>,
    listener_id: String,
    tls_server_name: Option<String>,
) -> Result<(), ListenerError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        let Some(wire) = read_framed(&mut stream).await? else {
            return Ok(());
        };
        let mut client = contract::client_info_for(peer.ip(), listener_id.clone());
        if let Some(name) = &tls_server_name {
            client = client.with_tls_server_name(name.clone());
        }
        match contract::handle_query(&root, &acl, &wire, client).await {
            Outcome::Respond(response) => write_framed(&mut stream, &response).await?,
            Outcome::Drop => return Ok(()),
        }
    }
}
