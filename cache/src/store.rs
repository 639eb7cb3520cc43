use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use hickory_proto::op::{Message, OpCode, Query, ResponseCode};
use moka::future::Cache;
use moka::Expiry;
use tokio::sync::OnceCell;

use routedns_core::message::templated_response;
use routedns_core::{ClientInfo, DnsMessage, Metrics, ResolveError, Resolver, ResolverHandle};

use crate::entry::{CacheConfig, CacheEntry};
use crate::key::CacheKey;

type InflightResult = Result<Option<DnsMessage>, ResolveError>;

/// Per-key prefetch bookkeeping (§4.2 "Prefetch").
#[derive(Debug, Default)]
struct PrefetchState {
    hits: AtomicU32,
    errors: AtomicU32,
    frozen: AtomicBool,
}

/// Rebuilds a fresh outbound query from a cached response's question, for
/// the prefetch re-dispatch — the cache only keeps the response, not the
/// original request.
fn requery_from(question: &Query) -> DnsMessage {
    let mut msg = Message::new();
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    msg.add_query(question.clone());
    DnsMessage::from_inner(msg)
}

struct EntryExpiry;

impl Expiry<CacheKey, CacheEntry> for EntryExpiry {
    fn expire_after_create(&self, _key: &CacheKey, value: &CacheEntry, _created_at: Instant) -> Option<std::time::Duration> {
        Some(value.total_ttl())
    }
}

/// The caching resolver (§4.2). Wraps a single inner Resolver: on miss,
/// forwards and inserts; on hit, returns a deep copy with decremented TTLs.
///
/// The backing map (`moka::future::Cache`) owns capacity-bound eviction and
/// background expiry sweeping, which together implement the spec's "LRU
/// capacity" and "periodic GC" requirements; the per-lookup TTL-decrement
/// and below-zero eviction check is layered on top by this type, since that
/// is specific per-record behaviour `moka` has no notion of.
pub struct CacheResolver {
    id: String,
    inner: ResolverHandle,
    config: CacheConfig,
    store: Cache<CacheKey, CacheEntry>,
    inflight: DashMap<CacheKey, Arc<OnceCell<InflightResult>>>,
    prefetch: DashMap<CacheKey, Arc<PrefetchState>>,
    nxdomain_names: DashMap<String, SystemTime>,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for CacheResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheResolver")
            .field("id", &self.id)
            .field("inner", &self.inner.id())
            .finish()
    }
}

impl CacheResolver {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, config: CacheConfig, metrics: Arc<Metrics>) -> Self {
        let store = Cache::builder()
            .max_capacity(config.max_entries)
            .expire_after(EntryExpiry)
            .build();
        Self {
            id: id.into(),
            inner,
            config,
            store,
            inflight: DashMap::new(),
            prefetch: DashMap::new(),
            nxdomain_names: DashMap::new(),
            metrics,
        }
    }

    /// The TTL eligible responses are stored with, or `None` if the response
    /// must never be cached (§4.2 "Eligibility rules").
    fn cache_ttl(&self, response: &DnsMessage) -> Option<std::time::Duration> {
        if response.truncated() {
            return None;
        }

        match response.rcode() {
            ResponseCode::NXDomain => Some(
                response
                    .soa_minimum()
                    .map(|s| std::time::Duration::from_secs(s as u64))
                    .unwrap_or(self.config.default_negative_ttl),
            ),
            ResponseCode::ServFail if !self.config.cache_servfail => None,
            ResponseCode::ServFail => Some(self.config.default_negative_ttl),
            ResponseCode::NoError => response
                .answers()
                .iter()
                .chain(response.authority())
                .map(|r| r.ttl())
                .min()
                .map(|ttl| std::time::Duration::from_secs(ttl as u64)),
            _ => None,
        }
    }

    /// RFC 8020: an unexpired NXDOMAIN recorded for an ancestor name
    /// short-circuits any query below it.
    fn harden_hit(&self, query: &DnsMessage) -> Option<DnsMessage> {
        if !self.config.harden_below_nxdomain {
            return None;
        }
        let question = query.question()?;
        let now = SystemTime::now();
        let mut name = question.name().clone();
        while !name.is_root() {
            name = name.base_name();
            if name.is_root() {
                break;
            }
            let marker = CacheKey::nxdomain_marker(&name.to_ascii());
            if let Some(expires_at) = self.nxdomain_names.get(&marker).map(|e| *e) {
                if expires_at > now {
                    return Some(templated_response(query, ResponseCode::NXDomain));
                }
                self.nxdomain_names.remove(&marker);
            }
        }
        None
    }

    async fn store_entry(&self, key: CacheKey, response: &DnsMessage) {
        let Some(ttl) = self.cache_ttl(response) else { return };
        let mut stored = response.clone();
        stored.strip_opt();
        if stored.rcode() == ResponseCode::NXDomain && self.config.harden_below_nxdomain {
            if let Some(question) = stored.question() {
                let marker = CacheKey::nxdomain_marker(&question.name().to_ascii());
                self.nxdomain_names.insert(marker, SystemTime::now() + ttl);
            }
        }
        self.store.insert(key, CacheEntry::new(stored, ttl)).await;
    }

    /// All live entries, paired with a freshly synthesised query for each
    /// (the cache only keeps the response; `persistence::save` needs both),
    /// for §6 "Persisted state layout" shutdown snapshots.
    pub fn snapshot(&self) -> Vec<(DnsMessage, CacheEntry)> {
        self.store
            .iter()
            .filter_map(|(_, entry)| {
                let question = entry.response.question()?.clone();
                Some((requery_from(&question), entry))
            })
            .collect()
    }

    /// Reloads a snapshot taken by [`Self::snapshot`], skipping anything
    /// that already expired while the process was down.
    pub async fn restore(&self, entries: Vec<(DnsMessage, CacheEntry)>) {
        let now = SystemTime::now();
        for (query, entry) in entries {
            if entry.is_expired(now) {
                continue;
            }
            if let Some(key) = CacheKey::from_query(&query) {
                self.store.insert(key, entry).await;
            }
        }
    }

    fn maybe_prefetch(&self, key: CacheKey, entry: &CacheEntry) {
        if self.config.prefetch_hit_threshold == 0 {
            return;
        }
        let state = self.prefetch.entry(key.clone()).or_default().clone();
        if state.frozen.load(Ordering::SeqCst) {
            return;
        }
        let hits = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
        if hits < self.config.prefetch_hit_threshold {
            return;
        }

        let now = SystemTime::now();
        let remaining = entry.remaining(now).as_secs_f32();
        let total = entry.total_ttl().as_secs_f32().max(1.0);
        if remaining / total > self.config.prefetch_remaining_fraction {
            return;
        }

        let Some(question) = entry.response.question() else { return };
        let query = requery_from(question);

        let inner = self.inner.clone();
        let store = self.store.clone();
        let error_threshold = self.config.prefetch_error_threshold;
        let ttl_fn = {
            let negative = self.config.default_negative_ttl;
            let cache_servfail = self.config.cache_servfail;
            move |response: &DnsMessage| -> Option<std::time::Duration> {
                if response.truncated() {
                    return None;
                }
                match response.rcode() {
                    ResponseCode::NXDomain => Some(
                        response
                            .soa_minimum()
                            .map(|s| std::time::Duration::from_secs(s as u64))
                            .unwrap_or(negative),
                    ),
                    ResponseCode::ServFail if !cache_servfail => None,
                    ResponseCode::ServFail => Some(negative),
                    ResponseCode::NoError => response.answers().iter().map(|r| r.ttl()).min().map(|t| std::time::Duration::from_secs(t as u64)),
                    _ => None,
                }
            }
        };
        let client = ClientInfo::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), "cache-prefetch");

        tokio::spawn(async move {
            match inner.resolve(&query, &client).await {
                Ok(Some(response)) => {
                    if let Some(ttl) = ttl_fn(&response) {
                        store.insert(key, CacheEntry::new(response, ttl)).await;
                    }
                    state.hits.store(0, Ordering::SeqCst);
                }
                _ => {
                    let errors = state.errors.fetch_add(1, Ordering::SeqCst) + 1;
                    if errors >= error_threshold {
                        state.frozen.store(true, Ordering::SeqCst);
                    }
                }
            }
        });
    }
}

#[async_trait]
impl Resolver for CacheResolver {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let Some(key) = CacheKey::from_query(query) else {
            return self.inner.resolve(query, client).await;
        };

        if let Some(hardened) = self.harden_hit(query) {
            self.metrics.counter("cache.harden_hit").incr();
            return Ok(Some(hardened));
        }

        let now = SystemTime::now();
        if let Some(entry) = self.store.get(&key).await {
            if let Some(fresh) = entry.fresh_copy(now) {
                self.metrics.counter("cache.hit").incr();
                self.maybe_prefetch(key, &entry);
                return Ok(Some(fresh));
            }
            self.store.invalidate(&key);
        }
        self.metrics.counter("cache.miss").incr();

        let (cell, is_first) = match self.inflight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(o) => (o.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                let cell = Arc::new(OnceCell::new());
                v.insert(cell.clone());
                (cell, true)
            }
        };

        let result = cell
            .get_or_init(|| async { self.inner.resolve(query, client).await })
            .await
            .clone();

        if is_first {
            self.inflight.remove(&key);
            if let Ok(Some(response)) = &result {
                self.store_entry(key, response).await;
            }
        }

        result
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

    fn metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new())
    }

    #[tokio::test]
    async fn miss_then_hit_decrements_ttl() {
        let query = fixed_query("example.com.", RecordType::A);
        let response = routedns_core::testing::fixed_a_response(&query, "93.184.216.34".parse().unwrap(), 10);
        let inner = StubResolver::new("inner", response);

        let cache = CacheResolver::new("cache", inner.clone() as ResolverHandle, CacheConfig::default(), metrics());
        let client = fixed_client_info();

        let first = cache.resolve(&query, &client).await.unwrap().unwrap();
        assert_eq!(first.answers()[0].ttl(), 10);
        assert_eq!(inner.call_count(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;

        let second = cache.resolve(&query, &client).await.unwrap().unwrap();
        assert!(second.answers()[0].ttl() < 10);
        assert_eq!(inner.call_count(), 1, "hit must not re-dispatch upstream");
    }

    #[tokio::test]
    async fn truncated_responses_are_never_cached() {
        let query = fixed_query("example.com.", RecordType::A);
        let mut response = routedns_core::testing::fixed_a_response(&query, "93.184.216.34".parse().unwrap(), 10);
        response.set_truncated(true);
        let inner = StubResolver::new("inner", response);

        let cache = CacheResolver::new("cache", inner.clone() as ResolverHandle, CacheConfig::default(), metrics());
        let client = fixed_client_info();

        cache.resolve(&query, &client).await.unwrap();
        cache.resolve(&query, &client).await.unwrap();
        assert_eq!(inner.call_count(), 2, "truncated responses bypass the cache");
    }

    #[tokio::test]
    async fn concurrent_misses_single_flight_to_one_dispatch() {
        let query = fixed_query("example.com.", RecordType::A);
        let response = routedns_core::testing::fixed_a_response(&query, "93.184.216.34".parse().unwrap(), 30);
        let inner = StubResolver::new("inner", response);

        let cache = Arc::new(CacheResolver::new(
            "cache",
            inner.clone() as ResolverHandle,
            CacheConfig::default(),
            metrics(),
        ));
        let client = fixed_client_info();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let query = query.clone();
            let client = client.clone();
            tasks.push(tokio::spawn(async move { cache.resolve(&query, &client).await.unwrap() }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(inner.call_count(), 1, "single-flight must dedup concurrent misses");
    }

    #[tokio::test]
    async fn all_failing_does_not_poison_the_cache() {
        let query = fixed_query("example.com.", RecordType::A);
        let inner = FailingResolver::new("inner", ResolveError::Timeout);

        let cache = CacheResolver::new("cache", inner.clone() as ResolverHandle, CacheConfig::default(), metrics());
        let client = fixed_client_info();

        cache.resolve(&query, &client).await.unwrap_err();
        cache.resolve(&query, &client).await.unwrap_err();
        assert_eq!(inner.call_count(), 2);
    }
}
