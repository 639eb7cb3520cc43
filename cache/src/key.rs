//! Cache key fingerprinting (§3 "Cache entry").
//!
//! The key is the question (name, type, class) plus a compact digest of any
//! EDNS0 Client Subnet option, so that ECS-varying responses for the same
//! name don't collide in the cache.

use hickory_proto::op::Query;
use hickory_proto::rr::rdata::opt::ClientSubnet;

use routedns_core::DnsMessage;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    name: String,
    record_type: u16,
    class: u16,
    ecs: Option<(u8, u8, Vec<u8>)>,
}

impl CacheKey {
    pub fn from_query(query: &DnsMessage) -> Option<Self> {
        let question = query.question()?;
        Some(Self::from_parts(question, query.client_subnet()))
    }

    fn from_parts(question: &Query, ecs: Option<ClientSubnet>) -> Self {
        Self {
            name: question.name().to_ascii().to_ascii_lowercase(),
            record_type: u16::from(question.query_type()),
            class: u16::from(question.query_class()),
            ecs: ecs.map(digest_subnet),
        }
    }

    /// The key for the parent-zone NXDOMAIN marker used by harden-below-NXDOMAIN
    /// (§4.2): name only, no type/class/ECS, since non-existence applies to the
    /// whole name regardless of what was queried.
    pub fn nxdomain_marker(name: &str) -> String {
        name.to_ascii_lowercase()
    }
}

/// A compact digest (family, mask, masked address bytes) so two ECS options
/// that address the same subnet under different representations still
/// collide onto one key.
fn digest_subnet(cs: ClientSubnet) -> (u8, u8, Vec<u8>) {
    let addr = cs.address();
    let source_prefix = cs.source_prefix();
    let family = match addr {
        std::net::IpAddr::V4(_) => 1u8,
        std::net::IpAddr::V6(_) => 2u8,
    };
    (family, source_prefix, addr_bytes_masked(addr, source_prefix))
}

fn addr_bytes_masked(addr: std::net::IpAddr, prefix: u8) -> Vec<u8> {
    match addr {
        std::net::IpAddr::V4(v4) => mask_bytes(&v4.octets(), prefix),
        std::net::IpAddr::V6(v6) => mask_bytes(&v6.octets(), prefix),
    }
}

fn mask_bytes(bytes: &[u8], prefix: u8) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let full_bytes = (prefix / 8) as usize;
    let rem_bits = prefix % 8;
    for b in out.iter_mut().skip(full_bytes.min(out.len())) {
        *b = 0;
    }
    if full_bytes < out.len() && rem_bits > 0 {
        let mask = !0u8 << (8 - rem_bits);
        out[full_bytes] &= mask;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::fixed_query;

    #[test]
    fn case_insensitive_name_collapses_to_one_key() {
        let a = fixed_query("Example.COM.", RecordType::A);
        let b = fixed_query("example.com.", RecordType::A);
        assert_eq!(CacheKey::from_query(&a), CacheKey::from_query(&b));
    }

    #[test]
    fn different_record_types_are_different_keys() {
        let a = fixed_query("example.com.", RecordType::A);
        let b = fixed_query("example.com.", RecordType::AAAA);
        assert_ne!(CacheKey::from_query(&a), CacheKey::from_query(&b));
    }
}
