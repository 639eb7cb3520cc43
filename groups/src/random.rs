use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// Random load balancing with cool-off (§4.4 "Random"). A resolver that
/// fails is removed from the live set for `cool_off`; if the live set is
/// empty, the query fails outright.
#[derive(Debug)]
pub struct RandomGroup {
    id: String,
    resolvers: Vec<ResolverHandle>,
    cool_off: Duration,
    cooling_down_until: Mutex<Vec<Option<Instant>>>,
}

impl RandomGroup {
    pub fn new(id: impl Into<String>, resolvers: Vec<ResolverHandle>, cool_off: Duration) -> Self {
        assert!(!resolvers.is_empty(), "a group needs at least one resolver");
        let n = resolvers.len();
        Self {
            id: id.into(),
            resolvers,
            cool_off,
            cooling_down_until: Mutex::new(vec![None; n]),
        }
    }

    fn live_set(&self) -> Vec<usize> {
        let cooldowns = self.cooling_down_until.lock();
        (0..self.resolvers.len())
            .filter(|&i| match cooldowns[i] {
                Some(until) => Instant::now() >= until,
                None => true,
            })
            .collect()
    }
}

#[async_trait]
impl Resolver for RandomGroup {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let live = self.live_set();
        let Some(&idx) = live.choose(&mut rand::thread_rng()) else {
            tracing::warn!(group = %self.id, "no live resolvers left");
            return Err(ResolveError::Transport("no live resolvers in random group".into()));
        };

        let outcome = self.resolvers[idx].resolve(query, client).await;
        if outcome.is_err() {
            self.cooling_down_until.lock()[idx] = Some(Instant::now() + self.cool_off);
        }
        outcome
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_client_info, fixed_query, FailingResolver};

    #[tokio::test]
    async fn empty_live_set_fails_the_query() {
        let r1 = FailingResolver::new("r1", ResolveError::Timeout);
        let group = RandomGroup::new("rand", vec![r1 as ResolverHandle], Duration::from_secs(60));

        let query = fixed_query("example.com.", RecordType::A);
        group.resolve(&query, &fixed_client_info()).await.unwrap_err();

        let err = group.resolve(&query, &fixed_client_info()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Transport(_)));
    }
}
