use async_trait::async_trait;
use futures::future::select_ok;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Dispatches to every inner resolver in parallel and returns the first
/// success, cancelling the rest (§4.4 "Fastest"). If all fail, the last
/// error observed is returned.
#[derive(Debug)]
pub struct FastestGroup {
    id: String,
    resolvers: Vec<ResolverHandle>,
}

impl FastestGroup {
    pub fn new(id: impl Into<String>, resolvers: Vec<ResolverHandle>) -> Self {
        assert!(!resolvers.is_empty(), "a group needs at least one resolver");
        Self {
            id: id.into(),
            resolvers,
        }
    }
}

#[async_trait]
impl Resolver for FastestGroup {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        // `select_ok` resolves as soon as one future succeeds; the remaining
        // futures are dropped, which cancels their in-flight work (the
        // upstream client's enqueue-and-wait future is drop-safe).
        let futures = self
            .resolvers
            .iter()
            .map(|r| Box::pin(r.resolve(query, client)));

        match select_ok(futures).await {
            Ok((response, _remaining)) => Ok(response),
            Err(last_err) => Err(last_err),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_client_info, fixed_query, FailingResolver, StubResolver};

    #[tokio::test]
    async fn returns_first_success() {
        let response = fixed_query("example.com.", RecordType::A);
        let slow_fail = FailingResolver::new("slow", ResolveError::Timeout);
        let fast_ok = StubResolver::new("fast", response.clone());

        let group = FastestGroup::new(
            "fastest",
            vec![slow_fail as ResolverHandle, fast_ok as ResolverHandle],
        );

        let query = fixed_query("example.com.", RecordType::A);
        let response = group.resolve(&query, &fixed_client_info()).await.unwrap();
        assert!(response.is_some());
    }

    #[tokio::test]
    async fn all_failing_surfaces_last_error() {
        let r1 = FailingResolver::new("r1", ResolveError::Timeout);
        let r2 = FailingResolver::new("r2", ResolveError::Transport("down".into()));
        let group = FastestGroup::new("fastest", vec![r1 as ResolverHandle, r2 as ResolverHandle]);

        let query = fixed_query("example.com.", RecordType::A);
        let err = group.resolve(&query, &fixed_client_info()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Timeout | ResolveError::Transport(_)));
    }
}
