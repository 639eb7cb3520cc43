use std::net::SocketAddr;
use std::sync::Arc;

use routedns_core::ResolverHandle;
use tokio::net::UdpSocket;

use crate::acl::Acl;
use crate::contract::{self, Outcome};

const MAX_DATAGRAM_SIZE: usize = 4096;

/// Plain UDP listener (§4.6 "Listeners"): one datagram in, one datagram out,
/// truncated and TC-flagged if the response exceeds the query's negotiated
/// EDNS0 UDP payload size.
pub struct UdpListener {
    id: String,
    socket: Arc<UdpSocket>,
    root: ResolverHandle,
    acl: Arc<Acl>,
}

impl UdpListener {
    pub async fn bind(id: impl Into<String>, addr: SocketAddr, root: ResolverHandle, acl: Acl) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            id: id.into(),
            socket: Arc::new(socket),
            root,
            acl: Arc::new(acl),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs the receive loop until the socket errors. Each datagram is
    /// handled on its own spawned task so one slow resolve never stalls the
    /// next client (§6 "listeners must not serialize on a single query").
    pub async fn run(self) -> std::io::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            let wire = buf[..len].to_vec();
            let socket = Arc::clone(&self.socket);
            let root = Arc::clone(&self.root);
            let listener_id = self.id.clone();
            let negotiated_size = contract::DEFAULT_UDP_PAYLOAD_SIZE;
            let acl = Arc::clone(&self.acl);

            tokio::spawn(async move {
                let client = contract::client_info_for(peer.ip(), listener_id);
                match contract::handle_query(&root, &acl, &wire, client).await {
                    Outcome::Respond(mut response) => {
                        let bytes = contract::truncate_for_udp(&mut response, negotiated_size);
                        let _ = socket.send_to(&bytes, peer).await;
                    }
                    Outcome::Drop => {}
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_a_response, fixed_query, StubResolver};
    use std::time::Duration;

    #[tokio::test]
    async fn answers_a_udp_query() {
        let query = fixed_query("example.com.", RecordType::A);
        let response = fixed_a_response(&query, "1.2.3.4".parse().unwrap(), 60);
        let stub: ResolverHandle = StubResolver::new("stub", response);

        let listener = UdpListener::bind("udp-test", "127.0.0.1:0".parse().unwrap(), stub, Acl::new())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(addr).await.unwrap();
        client.send(&query.to_wire().unwrap()).await.unwrap();

        let mut buf = vec![0u8; 4096];
        let len = tokio::time::timeout(Duration::from_secs(1), client.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply = routedns_core::DnsMessage::from_wire(&buf[..len]).unwrap();
        assert_eq!(reply.answers().len(), 1);
    }
}
