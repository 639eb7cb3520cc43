use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use routedns_blocklist::Database;
use routedns_core::message::templated_response;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Where the client address to test comes from (§4.5 "Client-IP blocklist":
/// "optionally taking it from ECS instead").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAddrSource {
    SourceIp,
    Ecs,
}

/// Same blocking behaviour as [`crate::blocklist_filter::BlocklistFilter`]
/// but keyed on the client's address rather than the query name.
#[derive(Debug)]
pub struct ClientBlocklist {
    id: String,
    inner: ResolverHandle,
    blocklist: Arc<dyn Database>,
    source: ClientAddrSource,
}

impl ClientBlocklist {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, blocklist: Arc<dyn Database>, source: ClientAddrSource) -> Self {
        Self {
            id: id.into(),
            inner,
            blocklist,
            source,
        }
    }

    fn address_to_test(&self, query: &DnsMessage, client: &ClientInfo) -> Option<IpAddr> {
        match self.source {
            ClientAddrSource::SourceIp => Some(client.source_ip),
            ClientAddrSource::Ecs => query.client_subnet().map(|cs| cs.address()),
        }
    }
}

#[async_trait]
impl Resolver for ClientBlocklist {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let Some(addr) = self.address_to_test(query, client) else {
            return self.inner.resolve(query, client).await;
        };

        if self.blocklist.match_addr(addr).is_some() {
            return Ok(Some(templated_response(query, ResponseCode::Refused)));
        }

        self.inner.resolve(query, client).await
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_blocklist::CidrSet;
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};

    fn blocklist_with(cidr: &str) -> Arc<dyn Database> {
        let mut set = CidrSet::new("test");
        set.insert(ip_network::IpNetwork::V4(cidr.parse().unwrap()), "r1");
        Arc::new(set)
    }

    #[tokio::test]
    async fn blocked_source_ip_is_refused() {
        let inner = StubResolver::new("inner", fixed_query("example.com.", RecordType::A));
        let modifier = ClientBlocklist::new(
            "client-block",
            inner.clone() as ResolverHandle,
            blocklist_with("192.168.1.0/24"),
            ClientAddrSource::SourceIp,
        );
        let query = fixed_query("example.com.", RecordType::A);
        let response = modifier.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();
        assert_eq!(response.rcode(), ResponseCode::Refused);
        assert_eq!(inner.call_count(), 0);
    }

    #[tokio::test]
    async fn allowed_source_ip_forwards() {
        let inner = StubResolver::new("inner", fixed_query("example.com.", RecordType::A));
        let modifier = ClientBlocklist::new(
            "client-block",
            inner.clone() as ResolverHandle,
            blocklist_with("10.0.0.0/24"),
            ClientAddrSource::SourceIp,
        );
        let query = fixed_query("example.com.", RecordType::A);
        modifier.resolve(&query, &fixed_client_info()).await.unwrap();
        assert_eq!(inner.call_count(), 1);
    }
}
