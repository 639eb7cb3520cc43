use std::collections::HashMap;
use std::sync::Arc;

use routedns_blocklist::Database;
use routedns_cache::CacheResolver;
use routedns_core::ResolverHandle;

use crate::error::ConfigError;
use crate::model::{Document, GroupSpec, ResolverSpec, RouterSpec};

/// Which table an id was declared in. Resolvers, groups and routers share one
/// reference namespace (anything that produces a [`ResolverHandle`]); an id
/// may not appear in more than one of the three.
enum Owner<'a> {
    Resolver(&'a ResolverSpec),
    Group(&'a GroupSpec),
    Router(&'a RouterSpec),
}

/// Builds the resolver DAG bottom-up: each id is resolved (and memoised) the
/// first time something depends on it, recursing into its own dependencies
/// first. A recursion-stack membership check catches cycles before any
/// listener binds (§6 "a cycle is a load-time error").
pub struct Builder<'a> {
    doc: &'a Document,
    built: HashMap<String, ResolverHandle>,
    blocklists: HashMap<String, Arc<dyn Database>>,
    stack: Vec<String>,
    /// Every `cache` resolver built, by id, kept alongside the type-erased
    /// `ResolverHandle` so the binary can snapshot/restore them at shutdown
    /// and startup (§6 "Persisted state layout") without downcasting.
    caches: HashMap<String, Arc<CacheResolver>>,
}

impl<'a> Builder<'a> {
    pub fn new(doc: &'a Document) -> Result<Self, ConfigError> {
        check_unique_ids(doc)?;
        Ok(Self {
            doc,
            built: HashMap::new(),
            blocklists: HashMap::new(),
            stack: Vec::new(),
            caches: HashMap::new(),
        })
    }

    /// Records a built cache resolver so it can be snapshotted/restored
    /// later. Called by `build::build_cache`.
    pub fn register_cache(&mut self, id: &str, cache: Arc<CacheResolver>) {
        self.caches.insert(id.to_string(), cache);
    }

    pub fn into_caches(self) -> HashMap<String, Arc<CacheResolver>> {
        self.caches
    }

    fn owner(&self, id: &str) -> Option<Owner<'a>> {
        if let Some(r) = self.doc.resolvers.get(id) {
            return Some(Owner::Resolver(r));
        }
        if let Some(g) = self.doc.groups.get(id) {
            return Some(Owner::Group(g));
        }
        if let Some(r) = self.doc.routers.get(id) {
            return Some(Owner::Router(r));
        }
        None
    }

    pub fn resolve(&mut self, id: &str) -> Result<ResolverHandle, ConfigError> {
        if let Some(handle) = self.built.get(id) {
            return Ok(handle.clone());
        }
        if self.stack.contains(&id.to_string()) {
            let mut cycle = self.stack.clone();
            cycle.push(id.to_string());
            return Err(ConfigError::Cycle(cycle));
        }
        let Some(owner) = self.owner(id) else {
            return Err(ConfigError::UnknownReference {
                referrer: self.stack.last().cloned().unwrap_or_else(|| "<root>".to_string()),
                target: id.to_string(),
            });
        };

        self.stack.push(id.to_string());
        let handle = match owner {
            Owner::Resolver(spec) => crate::build::build_resolver(self, id, spec)?,
            Owner::Group(spec) => crate::build::build_group(self, id, spec)?,
            Owner::Router(spec) => crate::build::build_router(self, id, spec)?,
        };
        self.stack.pop();

        self.built.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn blocklist(&mut self, id: &str) -> Result<Arc<dyn Database>, ConfigError> {
        if let Some(db) = self.blocklists.get(id) {
            return Ok(db.clone());
        }
        let spec = self
            .doc
            .blocklists
            .get(id)
            .ok_or_else(|| ConfigError::UnknownReference {
                referrer: "<blocklist>".to_string(),
                target: id.to_string(),
            })?;
        let db = crate::build::build_blocklist(id, spec)?;
        self.blocklists.insert(id.to_string(), db.clone());
        Ok(db)
    }
}

fn check_unique_ids(doc: &Document) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for id in doc.resolvers.keys().chain(doc.groups.keys()).chain(doc.routers.keys()) {
        if !seen.insert(id) {
            return Err(ConfigError::DuplicateId(id.clone()));
        }
    }
    Ok(())
}
