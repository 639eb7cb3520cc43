use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Fail-rotate group (§4.4). Forwards to the "currently active" resolver;
/// on failure (or `SERVFAIL`, if configured) advances the active index and
/// retries, up to one attempt per resolver. No automatic fall-back to the
/// prioritised order — that is [`crate::failback::FailBackGroup`].
#[derive(Debug)]
pub struct FailRotateGroup {
    id: String,
    resolvers: Vec<ResolverHandle>,
    active: AtomicUsize,
    retry_on_servfail: bool,
}

impl FailRotateGroup {
    pub fn new(id: impl Into<String>, resolvers: Vec<ResolverHandle>, retry_on_servfail: bool) -> Self {
        assert!(!resolvers.is_empty(), "a group needs at least one resolver");
        Self {
            id: id.into(),
            resolvers,
            active: AtomicUsize::new(0),
            retry_on_servfail,
        }
    }

    fn is_failure(&self, outcome: &Result<Option<DnsMessage>, ResolveError>) -> bool {
        match outcome {
            Err(_) => true,
            Ok(Some(resp)) if self.retry_on_servfail => resp.rcode() == ResponseCode::ServFail,
            _ => false,
        }
    }
}

#[async_trait]
impl Resolver for FailRotateGroup {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let k = self.resolvers.len();
        let start = self.active.load(Ordering::SeqCst);

        let mut last = None;
        for attempt in 0..k {
            let idx = (start + attempt) % k;
            let resolver = &self.resolvers[idx];
            let outcome = resolver.resolve(query, client).await;

            if !self.is_failure(&outcome) {
                self.active.store(idx, Ordering::SeqCst);
                return outcome;
            }

            tracing::warn!(group = %self.id, resolver = resolver.id(), attempt, "resolver failed, rotating");
            self.active.store((idx + 1) % k, Ordering::SeqCst);
            last = Some(outcome);
        }

        last.expect("k >= 1 guarantees at least one attempt")
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
    async fn rotates_past_failing_resolver_then_stays() {
        let ok_response = fixed_query("example.com.", RecordType::A);
        let r1 = FailingResolver::new("r1", ResolveError::Timeout);
        let r2 = StubResolver::new("r2", ok_response.clone());

        let group = FailRotateGroup::new(
            "fr",
            vec![r1.clone() as ResolverHandle, r2.clone() as ResolverHandle],
            false,
        );

        let query = fixed_query("example.com.", RecordType::A);
        let client = fixed_client_info();

        group.resolve(&query, &client).await.unwrap();
        assert_eq!(r1.call_count(), 1);
        assert_eq!(r2.call_count(), 1);

        // Next query goes straight to r2 (the now-active resolver).
        group.resolve(&query, &client).await.unwrap();
        assert_eq!(r1.call_count(), 1);
        assert_eq!(r2.call_count(), 2);
    }

    #[tokio::test]
    async fn all_failing_returns_last_failure() {
        let r1 = FailingResolver::new("r1", ResolveError::Timeout);
        let r2 = FailingResolver::new("r2", ResolveError::Transport("down".into()));

        let group = FailRotateGroup::new(
            "fr",
            vec![r1.clone() as ResolverHandle, r2.clone() as ResolverHandle],
            false,
        );

        let query = fixed_query("example.com.", RecordType::A);
        let err = group.resolve(&query, &fixed_client_info()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Transport(_)));
        assert_eq!(r1.call_count(), 1);
        assert_eq!(r2.call_count(), 1);
    }
}
