//! A tiny atomic-counter metrics registry.
//!
//! Per §5 "Global mutable state is limited to the logger handle and a metrics
//! registry, both accessed via atomic counters". No exposition endpoint is
//! built here (out of scope, §1) — components just increment counters, and a
//! listener binary can read them out on shutdown or via its own surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A process-wide registry of named counters, keyed by a caller-chosen label
/// such as `"cache.hit"` or `"resolver.<id>.queries"`.
#[derive(Debug, Default)]
pub struct Metrics {
    counters: RwLock<HashMap<String, std::sync::Arc<Counter>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> std::sync::Arc<Counter> {
        if let Some(c) = self.counters.read().expect("metrics lock poisoned").get(name) {
            return c.clone();
        }
        let mut counters = self.counters.write().expect("metrics lock poisoned");
        counters
            .entry(name.to_string())
            .or_insert_with(|| std::sync::Arc::new(Counter::default()))
            .clone()
    }

    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counters
            .read()
            .expect("metrics lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.get()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_shared_by_name() {
        let metrics = Metrics::new();
        metrics.counter("cache.hit").incr();
        metrics.counter("cache.hit").incr();
        assert_eq!(metrics.counter("cache.hit").get(), 2);
    }
}
