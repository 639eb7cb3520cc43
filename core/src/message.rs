//! DNS message wrapper, EDNS0 helpers, templated responses and padding.
//!
//! Everything here is a thin, owned wrapper around [`hickory_proto::op::Message`].
//! Wire encoding/decoding is delegated to `hickory-proto`; this module only adds
//! the behaviour the pipeline's components need repeatedly (TTL decay, OPT
//! stripping, template responses, RFC 7830 padding).

use std::net::IpAddr;
use std::time::Duration;

use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::opt::{ClientSubnet, EdnsCode, EdnsOption};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};

use crate::error::ResolveError;

/// An owned DNS message moving through the pipeline.
///
/// Cloning is a deep copy; callers that receive a cache hit or a group's
/// shared response are always handed an owned, mutation-safe value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage(Message);

/// Serialises to/from wire format (§6 "Persisted state layout" stores
/// entries as their wire bytes, not a structural re-encoding).
impl serde::Serialize for DnsMessage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = self.to_wire().map_err(serde::ser::Error::custom)?;
        serializer.serialize_bytes(&bytes)
    }
}

impl<'de> serde::Deserialize<'de> for DnsMessage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <Vec<u8>>::deserialize(deserializer)?;
        DnsMessage::from_wire(&bytes).map_err(serde::de::Error::custom)
    }
}

impl DnsMessage {
    pub fn from_inner(message: Message) -> Self {
        Self(message)
    }

    pub fn into_inner(self) -> Message {
        self.0
    }

    pub fn inner(&self) -> &Message {
        &self.0
    }

    pub fn inner_mut(&mut self) -> &mut Message {
        &mut self.0
    }

    /// Parse a wire-format buffer, per RFC 1035 (EDNS0 per RFC 6891 via `hickory-proto`).
    pub fn from_wire(buf: &[u8]) -> Result<Self, ResolveError> {
        let msg = Message::from_bytes(buf).map_err(|_| ResolveError::Malformed)?;
        if msg.queries().is_empty() {
            return Err(ResolveError::Malformed);
        }
        Ok(Self(msg))
    }

    pub fn to_wire(&self) -> Result<Vec<u8>, ResolveError> {
        self.0.to_bytes().map_err(|_| ResolveError::Malformed)
    }

    pub fn id(&self) -> u16 {
        self.0.id()
    }

    pub fn set_id(&mut self, id: u16) -> &mut Self {
        self.0.set_id(id);
        self
    }

    pub fn question(&self) -> Option<&Query> {
        self.0.queries().first()
    }

    pub fn question_mut(&mut self) -> Option<&mut Query> {
        self.0.queries_mut().first_mut()
    }

    /// True if `other`'s question section is identical to ours (name, type, class).
    ///
    /// Used by the upstream client to validate that a response actually answers
    /// the query that was sent, per §4.1.
    pub fn question_matches(&self, other: &DnsMessage) -> bool {
        match (self.question(), other.question()) {
            (Some(a), Some(b)) => {
                a.name() == b.name() && a.query_type() == b.query_type() && a.query_class() == b.query_class()
            }
            _ => false,
        }
    }

    pub fn set_response(&mut self) -> &mut Self {
        self.0.set_message_type(MessageType::Response);
        self
    }

    pub fn rcode(&self) -> ResponseCode {
        self.0.response_code()
    }

    pub fn set_rcode(&mut self, code: ResponseCode) -> &mut Self {
        self.0.set_response_code(code);
        self
    }

    pub fn truncated(&self) -> bool {
        self.0.truncated()
    }

    pub fn set_truncated(&mut self, tc: bool) -> &mut Self {
        self.0.set_truncated(tc);
        self
    }

    pub fn answers(&self) -> &[Record] {
        self.0.answers()
    }

    pub fn answers_mut(&mut self) -> &mut Vec<Record> {
        self.0.answers_mut()
    }

    pub fn authority(&self) -> &[Record] {
        self.0.name_servers()
    }

    pub fn authority_mut(&mut self) -> &mut Vec<Record> {
        self.0.name_servers_mut()
    }

    pub fn additionals(&self) -> &[Record] {
        self.0.additionals()
    }

    pub fn additionals_mut(&mut self) -> &mut Vec<Record> {
        self.0.additionals_mut()
    }

    /// Every record across answer/authority/additional sections.
    pub fn all_records(&self) -> impl Iterator<Item = &Record> {
        self.0
            .answers()
            .iter()
            .chain(self.0.name_servers())
            .chain(self.0.additionals())
    }

    pub fn retain_answers(&mut self, mut keep: impl FnMut(&Record) -> bool) {
        self.0.answers_mut().retain(|r| keep(r));
    }

    /// Decrement every stored record's TTL by `age`, per the cache-hit invariant
    /// in §3/§8: record TTLs must be strictly less than stored and strictly
    /// greater than zero, or the entry is a miss.
    ///
    /// Returns `false` (and leaves the message unchanged) if any record's
    /// adjusted TTL would be <= 0.
    pub fn decrement_ttls(&mut self, age: Duration) -> bool {
        let age_secs = age.as_secs().min(u32::MAX as u64) as u32;

        for record in self
            .0
            .answers()
            .iter()
            .chain(self.0.name_servers())
            .chain(self.0.additionals())
        {
            if record.ttl() <= age_secs {
                return false;
            }
        }

        for record in self.0.answers_mut() {
            record.set_ttl(record.ttl() - age_secs);
        }
        for record in self.0.name_servers_mut() {
            record.set_ttl(record.ttl() - age_secs);
        }
        for record in self.0.additionals_mut() {
            record.set_ttl(record.ttl() - age_secs);
        }

        true
    }

    pub fn apply_ttl_bounds(&mut self, min: Option<u32>, max: Option<u32>) {
        let clamp = |ttl: u32| -> u32 {
            let ttl = min.map_or(ttl, |m| ttl.max(m));
            max.map_or(ttl, |m| ttl.min(m))
        };
        for record in self.0.answers_mut() {
            record.set_ttl(clamp(record.ttl()));
        }
        for record in self.0.name_servers_mut() {
            record.set_ttl(clamp(record.ttl()));
        }
        for record in self.0.additionals_mut() {
            record.set_ttl(clamp(record.ttl()));
        }
    }

    /// The SOA minimum field from the authority section, if any (negative-cache TTL).
    pub fn soa_minimum(&self) -> Option<u32> {
        self.0.name_servers().iter().find_map(|r| match r.data() {
            Some(RData::SOA(soa)) => Some(soa.minimum()),
            _ => None,
        })
    }

    /// OPT is a pseudo-record with per-connection semantics; it must never be
    /// cached (§9 "OPT record handling around caching").
    pub fn strip_opt(&mut self) {
        self.0.take_edns();
    }

    pub fn edns(&self) -> Option<&Edns> {
        self.0.extensions().as_ref()
    }

    /// Ensure an OPT record exists with the given advertised UDP payload size,
    /// creating one if absent. The listener calls this on the way out using
    /// *its own* negotiated size, never a cached one.
    pub fn ensure_edns(&mut self, udp_payload_size: u16) -> &mut Edns {
        if self.0.extensions().is_none() {
            let mut edns = Edns::new();
            edns.set_max_payload(udp_payload_size);
            self.0.set_edns(edns);
        }
        let edns = self.0.extensions_mut().as_mut().expect("just inserted");
        edns.set_max_payload(udp_payload_size);
        edns
    }

    pub fn client_subnet(&self) -> Option<ClientSubnet> {
        self.0.extensions().as_ref().and_then(|edns| {
            edns.options()
                .get(EdnsCode::Subnet)
                .and_then(|opt| match opt {
                    EdnsOption::Subnet(cs) => Some(*cs),
                    _ => None,
                })
        })
    }

    pub fn set_client_subnet(&mut self, subnet: ClientSubnet) {
        let edns = self.ensure_edns(1232);
        edns.options_mut().insert(EdnsOption::Subnet(subnet));
    }

    pub fn remove_client_subnet(&mut self) {
        if let Some(edns) = self.0.extensions_mut().as_mut() {
            edns.options_mut().remove(EdnsCode::Subnet);
        }
    }

    /// RFC 7830/8467 padding: appends an OPT `PADDING` option so the wire size
    /// becomes a multiple of `block_size`. No-op if the client did not
    /// advertise padding support (no empty PADDING option present already).
    pub fn pad_to_block_size(&mut self, block_size: usize) -> Result<(), ResolveError> {
        if self.0.extensions().is_none() {
            return Ok(());
        }
        let current_len = self.to_wire()?.len();
        let remainder = current_len % block_size;
        if remainder == 0 {
            return Ok(());
        }
        let pad_len = block_size - remainder;
        if let Some(edns) = self.0.extensions_mut().as_mut() {
            edns.options_mut()
                .insert(EdnsOption::Unknown(12, vec![0u8; pad_len]));
        }
        Ok(())
    }
}

/// Build a templated response: a single question carried over from the query,
/// the given rcode, no answers. Used by the static responder and by
/// blocklist/filter short-circuits.
pub fn templated_response(query: &DnsMessage, rcode: ResponseCode) -> DnsMessage {
    let mut response = Message::new();
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(query.inner().recursion_desired());
    response.set_recursion_available(true);
    response.set_response_code(rcode);
    if let Some(q) = query.question() {
        response.add_query(q.clone());
    }
    DnsMessage(response)
}

/// A static A/AAAA answer built from scratch, e.g. for spoofed blocklist
/// responses or a static responder's fixed-IP rule.
pub fn spoofed_address_response(query: &DnsMessage, name: &Name, ip: IpAddr, ttl: u32) -> DnsMessage {
    let mut response = templated_response(query, ResponseCode::NoError);
    let rdata = match ip {
        IpAddr::V4(v4) => RData::A(v4.into()),
        IpAddr::V6(v6) => RData::AAAA(v6.into()),
    };
    let rtype = match ip {
        IpAddr::V4(_) => RecordType::A,
        IpAddr::V6(_) => RecordType::AAAA,
    };
    let record = Record::from_rdata(name.clone(), ttl, rdata).set_rr_type_hint(rtype);
    response.inner_mut().add_answer(record);
    response
}

/// Small helper: most record constructors in `hickory-proto` infer `rr_type`
/// from the rdata, but spelling it out keeps call sites legible; this is a
/// no-op shim kept so the call sites above read declaratively.
trait RecordTypeHint {
    fn set_rr_type_hint(self, rtype: RecordType) -> Self;
}

impl RecordTypeHint for Record {
    fn set_rr_type_hint(mut self, rtype: RecordType) -> Self {
        self.set_record_type(rtype);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn query_message(name: &str, rtype: RecordType) -> DnsMessage {
        let mut msg = Message::new();
        msg.set_id(42);
        msg.add_query(Query::query(Name::from_ascii(name).unwrap(), rtype));
        DnsMessage(msg)
    }

    #[test]
    fn decrement_ttls_evicts_at_zero() {
        let mut msg = spoofed_address_response(
            &query_message("example.com.", RecordType::A),
            &Name::from_ascii("example.com.").unwrap(),
            Ipv4Addr::new(1, 2, 3, 4).into(),
            5,
        );
        assert!(!msg.decrement_ttls(Duration::from_secs(5)));
        assert!(msg.decrement_ttls(Duration::from_secs(1)));
        assert_eq!(msg.answers()[0].ttl(), 4);
    }

    #[test]
    fn question_matches_requires_name_type_class() {
        let a = query_message("example.com.", RecordType::A);
        let b = query_message("example.com.", RecordType::A);
        let c = query_message("example.org.", RecordType::A);
        assert!(a.question_matches(&b));
        assert!(!a.question_matches(&c));
    }

    #[test]
    fn templated_response_carries_question() {
        let query = query_message("blocked.test.", RecordType::A);
        let resp = templated_response(&query, ResponseCode::NXDomain);
        assert_eq!(resp.rcode(), ResponseCode::NXDomain);
        assert_eq!(resp.question().unwrap().name(), query.question().unwrap().name());
    }
}
