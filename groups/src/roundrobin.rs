use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Round-robin load balancing (§4.4). Query *n* goes to resolver `n mod k`.
/// Failure is not absorbed here; it propagates straight back to the caller.
#[derive(Debug)]
pub struct RoundRobinGroup {
    id: String,
    resolvers: Vec<ResolverHandle>,
    counter: AtomicUsize,
}

impl RoundRobinGroup {
    pub fn new(id: impl Into<String>, resolvers: Vec<ResolverHandle>) -> Self {
        assert!(!resolvers.is_empty(), "a group needs at least one resolver");
        Self {
            id: id.into(),
            resolvers,
            counter: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Resolver for RoundRobinGroup {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let resolver = &self.resolvers[n % self.resolvers.len()];
        resolver.resolve(query, client).await
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};

    #[tokio::test]
    async fn distributes_within_floor_ceil_bounds() {
        let response = fixed_query("example.com.", RecordType::A);
        let stubs: Vec<_> = (0..3).map(|i| StubResolver::new(format!("r{i}"), response.clone())).collect();
        let resolvers: Vec<ResolverHandle> = stubs.iter().map(|s| s.clone() as ResolverHandle).collect();

        let group = RoundRobinGroup::new("rr", resolvers);
        let query = fixed_query("example.com.", RecordType::A);
        let client = fixed_client_info();

        const N: usize = 10;
        for _ in 0..N {
            group.resolve(&query, &client).await.unwrap();
        }

        let k = stubs.len();
        for s in &stubs {
            assert!(s.call_count() >= N / k && s.call_count() <= N / k + 1);
        }
        assert_eq!(stubs.iter().map(|s| s.call_count()).sum::<usize>(), N);
    }
}
