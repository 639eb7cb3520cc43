use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use routedns_core::DnsMessage;

/// Configuration for a [`crate::store::CacheResolver`] (§4.2).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub default_negative_ttl: Duration,
    pub cache_servfail: bool,
    pub gc_interval: Duration,
    pub harden_below_nxdomain: bool,
    pub prefetch_hit_threshold: u32,
    pub prefetch_remaining_fraction: f32,
    pub prefetch_error_threshold: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
            default_negative_ttl: Duration::from_secs(60),
            cache_servfail: false,
            gc_interval: Duration::from_secs(30),
            harden_below_nxdomain: false,
            prefetch_hit_threshold: 0,
            prefetch_remaining_fraction: 0.1,
            prefetch_error_threshold: 3,
        }
    }
}

/// A stored cache entry (§3 "Cache entry").
///
/// `response` keeps its original, full-TTL records; the age is computed from
/// `inserted_at` at lookup time and applied via [`DnsMessage::decrement_ttls`],
/// so the stored copy never mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: DnsMessage,
    #[serde(with = "system_time_as_secs")]
    pub inserted_at: SystemTime,
    #[serde(with = "system_time_as_secs")]
    pub expires_at: SystemTime,
}

impl CacheEntry {
    pub fn new(response: DnsMessage, ttl: Duration) -> Self {
        let now = SystemTime::now();
        Self {
            response,
            inserted_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    pub fn remaining(&self, now: SystemTime) -> Duration {
        self.expires_at.duration_since(now).unwrap_or_default()
    }

    pub fn total_ttl(&self) -> Duration {
        self.expires_at.duration_since(self.inserted_at).unwrap_or_default()
    }

    /// A deep copy of the stored response with TTLs decremented by the
    /// elapsed age, or `None` if that would take any record to or below zero
    /// (§3 invariant b).
    pub fn fresh_copy(&self, now: SystemTime) -> Option<DnsMessage> {
        let age = now.duration_since(self.inserted_at).unwrap_or_default();
        let mut copy = self.response.clone();
        if copy.decrement_ttls(age) {
            Some(copy)
        } else {
            None
        }
    }
}

pub(crate) mod system_time_as_secs {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let secs = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        secs.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}
