//! Test doubles shared across the workspace's crates.
//!
//! Grounded on the teacher's `firezone-tunnel::tests::stub_portal` pattern of
//! a single, reusable fake standing in for a real network collaborator.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::{Name, RData, Record, RecordType};

use crate::client_info::ClientInfo;
use crate::error::ResolveError;
use crate::message::DnsMessage;
use crate::resolver::Resolver;

pub fn fixed_client_info() -> ClientInfo {
    ClientInfo::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 123)), "test".to_string())
}

pub fn fixed_query(name: &str, rtype: RecordType) -> DnsMessage {
    let mut msg = Message::new();
    msg.set_id(1);
    msg.add_query(Query::query(Name::from_ascii(name).expect("valid test name"), rtype));
    DnsMessage::from_inner(msg)
}

pub fn fixed_a_response(query: &DnsMessage, addr: Ipv4Addr, ttl: u32) -> DnsMessage {
    let mut msg = Message::new();
    msg.set_id(query.id());
    msg.set_message_type(MessageType::Response);
    if let Some(q) = query.question() {
        msg.add_query(q.clone());
        msg.add_answer(Record::from_rdata(q.name().clone(), ttl, RData::A(addr.into())));
    }
    DnsMessage::from_inner(msg)
}

/// A [`Resolver`] that always returns a canned response and counts calls.
///
/// Used to assert invariants like "allowlist bypass dispatches upstream
/// exactly once" (§8) without any real network I/O.
#[derive(Debug)]
pub struct StubResolver {
    id: String,
    response: DnsMessage,
    calls: AtomicUsize,
}

impl StubResolver {
    pub fn new(id: impl Into<String>, response: DnsMessage) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            response,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for StubResolver {
    async fn resolve(
        &self,
        _query: &DnsMessage,
        _client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.response.clone()))
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// A [`Resolver`] that always fails, for exercising groups' failure handling.
#[derive(Debug)]
pub struct FailingResolver {
    id: String,
    error: ResolveError,
    calls: AtomicUsize,
}

impl FailingResolver {
    pub fn new(id: impl Into<String>, error: ResolveError) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            error,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for FailingResolver {
    async fn resolve(
        &self,
        _query: &DnsMessage,
        _client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    fn id(&self) -> &str {
        &self.id
    }
}
