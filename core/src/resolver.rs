use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::client_info::ClientInfo;
use crate::error::ResolveError;
use crate::message::DnsMessage;

/// The single polymorphic capability everything in the pipeline implements
/// (§2, §9 "Polymorphism over a single capability").
///
/// A `nil`/absent response (the "drop" sentinel, §4.5) is modelled as
/// `Ok(None)`; the listener interprets that as "close the connection without
/// replying". Every other outcome is either a response (possibly NXDOMAIN,
/// REFUSED, a spoofed answer, ...) or a [`ResolveError`].
///
/// Implementations are shared references (`Arc<dyn Resolver>`): the same
/// handle is held by multiple routers/groups simultaneously and its lifetime
/// equals the lifetime of the built pipeline (§3 "Resolver handle"). The
/// pipeline is a DAG; load-time cycle detection in `routedns-config` means no
/// resolver ever needs a weak back-reference to another.
#[async_trait]
pub trait Resolver: Send + Sync + fmt::Debug {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError>;

    /// A stable, human-meaningful identifier, used in logs, metrics and
    /// `ResolveError::Upstream`. Configuration ids are a natural fit; this is
    /// intentionally not `Display`, since many resolvers compute it lazily.
    fn id(&self) -> &str;
}

/// The handle type held by composing resolvers (routers, groups, modifiers).
pub type ResolverHandle = Arc<dyn Resolver>;

#[async_trait]
impl<T> Resolver for Arc<T>
where
    T: Resolver + ?Sized,
{
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        (**self).resolve(query, client).await
    }

    fn id(&self) -> &str {
        (**self).id()
    }
}
