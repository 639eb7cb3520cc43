use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use parking_lot::Mutex;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Like [`crate::failrotate::FailRotateGroup`] but after `quiet_period` with no
/// failures, the active index resets to 0 — restoring the prioritised order
/// (§4.4 "Fail-back").
#[derive(Debug)]
pub struct FailBackGroup {
    id: String,
    resolvers: Vec<ResolverHandle>,
    active: AtomicUsize,
    retry_on_servfail: bool,
    quiet_period: Duration,
    last_failure: Mutex<Option<Instant>>,
}

impl FailBackGroup {
    pub fn new(
        id: impl Into<String>,
        resolvers: Vec<ResolverHandle>,
        retry_on_servfail: bool,
        quiet_period: Duration,
    ) -> Self {
        assert!(!resolvers.is_empty(), "a group needs at least one resolver");
        Self {
            id: id.into(),
            resolvers,
            active: AtomicUsize::new(0),
            retry_on_servfail,
            quiet_period,
            last_failure: Mutex::new(None),
        }
    }

    fn is_failure(&self, outcome: &Result<Option<DnsMessage>, ResolveError>) -> bool {
        match outcome {
            Err(_) => true,
            Ok(Some(resp)) if self.retry_on_servfail => resp.rcode() == ResponseCode::ServFail,
            _ => false,
        }
    }

    /// Reset to the prioritised order if the quiet period has elapsed since
    /// the last recorded failure. Called before every dispatch.
    fn maybe_reset(&self) {
        let mut last_failure = self.last_failure.lock();
        if let Some(t) = *last_failure {
            if t.elapsed() >= self.quiet_period {
                self.active.store(0, Ordering::SeqCst);
                *last_failure = None;
            }
        }
    }
}

#[async_trait]
impl Resolver for FailBackGroup {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        self.maybe_reset();

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

            *self.last_failure.lock() = Some(Instant::now());
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
    use std::time::Duration;

    #[tokio::test]
    async fn resets_to_priority_order_after_quiet_period() {
        let ok_response = fixed_query("example.com.", RecordType::A);
        let r1 = FailingResolver::new("r1", ResolveError::Timeout);
        let r2 = StubResolver::new("r2", ok_response.clone());

        let group = FailBackGroup::new(
            "fb",
            vec![r1.clone() as ResolverHandle, r2.clone() as ResolverHandle],
            false,
            Duration::from_millis(20),
        );

        let query = fixed_query("example.com.", RecordType::A);
        let client = fixed_client_info();

        group.resolve(&query, &client).await.unwrap();
        assert_eq!(group.active.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;

        // r1 is still failing, but the reset happens before dispatch, so we
        // should see r1 attempted again (and fail) before landing on r2.
        let calls_before = r1.call_count();
        group.resolve(&query, &client).await.unwrap();
        assert!(r1.call_count() > calls_before);
    }
}
