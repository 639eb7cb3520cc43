use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Mutex;

use routedns_core::DnsMessage;
use tokio::sync::oneshot;

use crate::error::UpstreamError;

type Completion = oneshot::Sender<Result<DnsMessage, UpstreamError>>;

/// Allocates connection-scoped ids and tracks in-flight requests keyed by
/// them, per §4.1 steps 2-4 ("allocates a new connection-scoped id...
/// inserts the request into the pending table under that id").
///
/// The id counter is connection-scoped: every lazy re-dial starts a fresh
/// `PendingTable`, so there is no cross-connection collision risk beyond the
/// wraparound-and-retry below. Each entry also carries the caller's
/// original transaction id, restored onto the response before completion.
pub struct PendingTable {
    next_id: AtomicU16,
    entries: Mutex<HashMap<u16, (u16, Completion)>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU16::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a request under a fresh connection-scoped id, remembering
    /// its original (caller-visible) transaction id for restoration later.
    pub fn register(&self, original_id: u16, completion: Completion) -> u16 {
        let mut entries = self.entries.lock().expect("pending table lock poisoned");
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if let std::collections::hash_map::Entry::Vacant(slot) = entries.entry(id) {
                slot.insert((original_id, completion));
                return id;
            }
        }
    }

    /// Removes and completes the entry for `id`, restoring the caller's
    /// original transaction id onto `response` first. Returns `false` on a
    /// miss (§4.1 reader step 4: "on miss, logs and continues").
    pub fn complete(&self, id: u16, mut response: DnsMessage) -> bool {
        let entry = self.entries.lock().expect("pending table lock poisoned").remove(&id);
        match entry {
            Some((original_id, tx)) => {
                response.set_id(original_id);
                let _ = tx.send(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Evicts `id` and completes it with `error` (write-failure path, §4.1
    /// writer step 5).
    pub fn fail(&self, id: u16, error: UpstreamError) {
        if let Some((_, tx)) = self.entries.lock().expect("pending table lock poisoned").remove(&id) {
            let _ = tx.send(Err(error));
        }
    }

    /// Drains every pending entry with a transport-closed error (connection
    /// torn down: EOF, idle timeout, or a prior write failure).
    pub fn fail_all(&self, error_factory: impl Fn() -> UpstreamError) {
        let drained: Vec<_> = self.entries.lock().expect("pending table lock poisoned").drain().collect();
        for (_, tx) in drained.into_values() {
            let _ = tx.send(Err(error_factory()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("pending table lock poisoned").len()
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;

    #[tokio::test]
    async fn complete_restores_the_original_id() {
        let table = PendingTable::new();
        let (tx, rx) = oneshot::channel();
        let conn_id = table.register(42, tx);

        let mut response = routedns_core::testing::fixed_query("example.com.", RecordType::A);
        response.set_id(conn_id);
        assert!(table.complete(conn_id, response));

        let result = rx.await.unwrap().unwrap();
        assert_eq!(result.id(), 42);
    }

    #[tokio::test]
    async fn complete_on_unknown_id_is_a_harmless_miss() {
        let table = PendingTable::new();
        let response = routedns_core::testing::fixed_query("example.com.", RecordType::A);
        assert!(!table.complete(999, response));
    }

    #[tokio::test]
    async fn fail_all_closes_every_waiter_with_an_error() {
        let table = PendingTable::new();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        table.register(1, tx1);
        table.register(2, tx2);
        table.fail_all(|| UpstreamError::Cancelled);
        assert!(rx1.await.unwrap().is_err());
        assert!(rx2.await.unwrap().is_err());
    }
}
