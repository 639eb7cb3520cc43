use std::net::SocketAddr;
use std::sync::Arc;

use quinn::{Endpoint, ServerConfig};
use routedns_core::ResolverHandle;

use crate::acl::Acl;
use crate::contract::{self, Outcome};

/// DNS-over-QUIC listener (RFC 9250): accepts connections, and per
/// connection, one bidirectional stream per query. The client is expected to
/// reuse the connection across queries; the server places no limit on how
/// many streams it opens (mirrors `DoqClient`'s own connection-reuse model
/// on the upstream side).
pub struct DoqListener {
    id: String,
    endpoint: Endpoint,
    root: ResolverHandle,
    acl: Arc<Acl>,
}

impl DoqListener {
    pub fn bind(id: impl Into<String>, addr: SocketAddr, server_config: ServerConfig, root: ResolverHandle, acl: Acl) -> std::io::Result<Self> {
        let endpoint = Endpoint::server(server_config, addr)?;
        Ok(Self {
            id: id.into(),
            endpoint,
            root,
            acl: Arc::new(acl),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    pub async fn run(self) {
        while let Some(incoming) = self.endpoint.accept().await {
            let root = Arc::clone(&self.root);
            let acl = Arc::clone(&self.acl);
            let listener_id = self.id.clone();
            tokio::spawn(async move {
                let conn = match incoming.await {
                    Ok(conn) => conn,
                    Err(err) => {
                        tracing::debug!(target: "routedns::listener", error = %err, "doq handshake failed");
                        return;
                    }
                };
                let peer = conn.remote_address();
                loop {
                    let (send, recv) = match conn.accept_bi().await {
                        Ok(streams) => streams,
                        Err(_) => return,
                    };
                    let root = Arc::clone(&root);
                    let acl = Arc::clone(&acl);
                    let listener_id = listener_id.clone();
                    tokio::spawn(async move {
                        if let Err(err) = serve_stream(send, recv, peer, root, acl, listener_id).await {
                            tracing::debug!(target: "routedns::listener", error = %err, "doq stream failed");
                        }
                    });
                }
            });
        }
    }
}

async fn serve_stream(
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    peer: SocketAddr,
    root: ResolverHandle,
    acl: Arc<Acl>,
    listener_id: String,
) -> Result<(), crate::error::ListenerError> {
    let raw = recv.read_to_end(64 * 1024).await.map_err(|e| crate::error::ListenerError::Tls(e.to_string()))?;
    // RFC 9250: the stream payload carries the same 2-byte length prefix as
    // TCP/DoT, even though QUIC streams are already message-delimited.
    let wire = raw.get(2..).ok_or(crate::error::ListenerError::Decode)?;

    let client = contract::client_info_for(peer.ip(), listener_id);
    match contract::handle_query(&root, &acl, wire, client).await {
        Outcome::Respond(response) => {
            let bytes = response.to_wire().map_err(crate::error::ListenerError::Encode)?;
            send.write_all(&(bytes.len() as u16).to_be_bytes())
                .await
                .map_err(|e| crate::error::ListenerError::Tls(e.to_string()))?;
            send.write_all(&bytes).await.map_err(|e| crate::error::ListenerError::Tls(e.to_string()))?;
            send.finish().map_err(|e| crate::error::ListenerError::Tls(e.to_string()))?;
        }
        Outcome::Drop => {
            send.finish().map_err(|e| crate::error::ListenerError::Tls(e.to_string()))?;
        }
    }
    Ok(())
}
