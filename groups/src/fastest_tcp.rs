use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hickory_proto::rr::{RData, RecordType};
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};
use tokio::net::TcpStream;

/// Resolves once through its single inner resolver, then probes each
/// returned A/AAAA record with a parallel TCP connect and reorders the
/// answer section by probe latency (§4.4 "Fastest-TCP"). Non-IP queries and
/// queries with no address answers pass through unchanged.
#[derive(Debug)]
pub struct FastestTcpGroup {
    id: String,
    inner: ResolverHandle,
    probe_port: u16,
    probe_timeout: Duration,
}

impl FastestTcpGroup {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, probe_port: u16, probe_timeout: Duration) -> Self {
        Self {
            id: id.into(),
            inner,
            probe_port,
            probe_timeout,
        }
    }

    fn record_addr(record: &hickory_proto::rr::Record) -> Option<IpAddr> {
        match record.data()? {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        }
    }

    async fn probe(&self, addr: IpAddr) -> Duration {
        let target = SocketAddr::new(addr, self.probe_port);
        let start = Instant::now();
        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => start.elapsed(),
            _ => Duration::MAX,
        }
    }
}

#[async_trait]
impl Resolver for FastestTcpGroup {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let Some(question) = query.question() else {
            return self.inner.resolve(query, client).await;
        };

        if !matches!(question.query_type(), RecordType::A | RecordType::AAAA) {
            return self.inner.resolve(query, client).await;
        }

        let Some(mut response) = self.inner.resolve(query, client).await? else {
            return Ok(None);
        };

        let addrs: Vec<IpAddr> = response.answers().iter().filter_map(Self::record_addr).collect();
        if addrs.len() < 2 {
            return Ok(Some(response));
        }

        let mut latencies = Vec::with_capacity(addrs.len());
        for addr in &addrs {
            latencies.push(self.probe(*addr).await);
        }

        let mut indices: Vec<usize> = (0..addrs.len()).collect();
        indices.sort_by_key(|&i| latencies[i]);

        let mut by_addr: std::collections::HashMap<IpAddr, Vec<hickory_proto::rr::Record>> =
            std::collections::HashMap::new();
        for record in response.answers().iter().cloned() {
            if let Some(addr) = Self::record_addr(&record) {
                by_addr.entry(addr).or_default().push(record);
            }
        }
        let non_address: Vec<_> = response
            .answers()
            .iter()
            .filter(|r| Self::record_addr(r).is_none())
            .cloned()
            .collect();

        let mut reordered = non_address;
        for &i in &indices {
            if let Some(mut records) = by_addr.remove(&addrs[i]) {
                reordered.append(&mut records);
            }
        }
        *response.answers_mut() = reordered;

        Ok(Some(response))
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message, MessageType, Query};
    use hickory_proto::rr::{Name, RData, Record};
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};
    use std::net::Ipv4Addr;
    use std::str::FromStr;
    use tokio::net::TcpListener;

    fn response_with_addrs(addrs: &[Ipv4Addr]) -> DnsMessage {
        let name = Name::from_ascii("example.com.").unwrap();
        let mut msg = Message::new();
        msg.set_id(7);
        msg.set_message_type(MessageType::Response);
        msg.add_query(Query::query(name.clone(), RecordType::A));
        for addr in addrs {
            msg.add_answer(Record::from_rdata(name.clone(), 300, RData::A((*addr).into())));
        }
        DnsMessage::from_inner(msg)
    }

    #[tokio::test]
    async fn reorders_by_reachability() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let reachable = Ipv4Addr::from_str("127.0.0.1").unwrap();
        let unreachable = Ipv4Addr::from_str("127.0.0.2").unwrap();
        let response = response_with_addrs(&[unreachable, reachable]);
        let inner = StubResolver::new("inner", response);

        let group = FastestTcpGroup::new("fastest-tcp", inner as ResolverHandle, port, Duration::from_millis(100));

        let query = fixed_query("example.com.", RecordType::A);
        let result = group.resolve(&query, &fixed_client_info()).await.unwrap().unwrap();

        let first = FastestTcpGroup::record_addr(&result.answers()[0]).unwrap();
        assert_eq!(first, IpAddr::V4(reachable));
    }

    #[tokio::test]
    async fn non_address_query_passes_through_untouched() {
        let response = fixed_query("example.com.", RecordType::A);
        let inner = StubResolver::new("inner", response.clone());
        let group = FastestTcpGroup::new("fastest-tcp", inner as ResolverHandle, 0, Duration::from_millis(50));

        let name = Name::from_ascii("example.com.").unwrap();
        let mut msg = Message::new();
        msg.add_query(Query::query(name, RecordType::TXT));
        let query = DnsMessage::from_inner(msg);

        let result = group.resolve(&query, &fixed_client_info()).await.unwrap();
        assert!(result.is_some());
    }
}
