use routedns_core::{Resolver, ResolverHandle};

use crate::predicate::Predicate;

/// A predicate paired with the resolver it should forward to (§3 "Route").
pub struct Route {
    pub id: String,
    pub predicate: Predicate,
    pub target: ResolverHandle,
}

impl Route {
    pub fn new(id: impl Into<String>, predicate: Predicate, target: ResolverHandle) -> Self {
        Self {
            id: id.into(),
            predicate,
            target,
        }
    }

    pub fn default_route(id: impl Into<String>, target: ResolverHandle) -> Self {
        Self::new(id, Predicate::default(), target)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("target", &self.target.id())
            .finish()
    }
}
