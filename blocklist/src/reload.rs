use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::matcher::{Database, MatchResult};
use std::net::IpAddr;

/// Atomic hot-reload wrapper (§3 "Each database supports atomic `reload`").
///
/// The new snapshot is built off-path by the caller and swapped in under a
/// single pointer write; concurrent readers see either the old or the new
/// snapshot in full, never a partial mix.
#[derive(Debug)]
pub struct Reloadable<T> {
    current: ArcSwap<T>,
}

impl<T> Reloadable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn reload(&self, next: T) {
        self.current.store(Arc::new(next));
    }

    pub fn snapshot(&self) -> Arc<T> {
        self.current.load_full()
    }
}

impl<T: Database> Database for Reloadable<T> {
    fn match_name(&self, name: &str) -> Option<MatchResult> {
        self.snapshot().match_name(name)
    }

    fn match_addr(&self, addr: IpAddr) -> Option<MatchResult> {
        self.snapshot().match_addr(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_tree::DomainTree;

    #[test]
    fn reload_replaces_the_snapshot() {
        let mut initial = DomainTree::new("test");
        initial.insert("old.test", "r1");
        let reloadable = Reloadable::new(initial);
        assert!(reloadable.match_name("old.test").is_some());

        let mut next = DomainTree::new("test");
        next.insert("new.test", "r2");
        reloadable.reload(next);

        assert!(reloadable.match_name("old.test").is_none());
        assert!(reloadable.match_name("new.test").is_some());
    }
}
