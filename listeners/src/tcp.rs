use std::net::SocketAddr;
use std::sync::Arc;

use routedns_core::ResolverHandle;
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};

use crate::acl::Acl;
use crate::contract::{self, Outcome};
use crate::framing::{read_framed, write_framed};

/// TCP listener (§4.6): accepts connections, serves any number of
/// length-prefixed queries per connection until the client closes it or an
/// idle/decode error ends the loop. No truncation: TCP has no UDP payload
/// ceiling to respect.
pub struct TcpListener {
    id: String,
    listener: TokioTcpListener,
    root: ResolverHandle,
    acl: Arc<Acl>,
}

impl TcpListener {
    pub async fn bind(id: impl Into<String>, addr: SocketAddr, root: ResolverHandle, acl: Acl) -> std::io::Result<Self> {
        let listener = TokioTcpListener::bind(addr).await?;
        Ok(Self {
            id: id.into(),
            listener,
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
            let root = Arc::clone(&self.root);
            let acl = Arc::clone(&self.acl);
            let listener_id = self.id.clone();
            tokio::spawn(async move {
                if let Err(err) = serve_connection(stream, peer, root, acl, listener_id).await {
                    tracing::debug!(target: "routedns::listener", error = %err, "tcp connection ended");
                }
            });
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    root: ResolverHandle,
    acl: Arc<Acl>,
    listener_id: String,
) -> Result<(), crate::error::ListenerError> {
    loop {
        let Some(wire) = read_framed(&mut stream).await? else {
            return Ok(());
        };
        let client = contract::client_info_for(peer.ip(), listener_id.clone());
        match contract::handle_query(&root, &acl, &wire, client).await {
            Outcome::Respond(response) => write_framed(&mut stream, &response).await?,
            Outcome::Drop => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_a_response, fixed_query, StubResolver};

    #[tokio::test]
    async fn serves_two_queries_on_one_connection() {
        let query = fixed_query("example.com.", RecordType::A);
        let response = fixed_a_response(&query, "1.2.3.4".parse().unwrap(), 60);
        let stub: ResolverHandle = StubResolver::new("stub", response);

        let listener = TcpListener::bind("tcp-test", "127.0.0.1:0".parse().unwrap(), stub, Acl::new())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run());

        let mut conn = TcpStream::connect(addr).await.unwrap();
        write_framed(&mut conn, &query).await.unwrap();
        let first = read_framed(&mut conn).await.unwrap().unwrap();
        assert_eq!(routedns_core::DnsMessage::from_wire(&first).unwrap().answers().len(), 1);

        write_framed(&mut conn, &query).await.unwrap();
        let second = read_framed(&mut conn).await.unwrap().unwrap();
        assert_eq!(routedns_core::DnsMessage::from_wire(&second).unwrap().answers().len(), 1);
    }
}
