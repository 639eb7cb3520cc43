use std::net::IpAddr;

use hickory_proto::op::ResponseCode;
use routedns_core::message::templated_response;
use routedns_core::{ClientInfo, DnsMessage, ResolverHandle};

use crate::acl::Acl;

/// The default EDNS0 UDP payload size a listener advertises when it has no
/// client-negotiated value to fall back on (conservative, avoids
/// fragmentation on most paths).
pub const DEFAULT_UDP_PAYLOAD_SIZE: u16 = 1232;

/// What the listener contract (§6) decided to do with a decoded query:
/// answer with bytes, or drop the connection/datagram silently.
pub enum Outcome {
    Respond(DnsMessage),
    Drop,
}

/// The listener contract shared by every concrete transport (§4.6, §6):
/// decode, populate `ClientInfo`, ACL check, call the root resolver, and
/// translate the result (including any leaked error) into a response or a
/// drop instruction. Padding and UDP-specific truncation are applied by the
/// caller afterwards, since they depend on transport (UDP truncates; DoH/
/// DoT typically don't).
pub async fn handle_query(root: &ResolverHandle, acl: &Acl, wire: &[u8], client: ClientInfo) -> Outcome {
    let query = match DnsMessage::from_wire(wire) {
        Ok(q) if q.question().is_some() => q,
        Ok(q) => return Outcome::Respond(templated_response(&q, ResponseCode::FormErr)),
        Err(_) => return Outcome::Drop,
    };

    if !acl.permits(client.source_ip) {
        return Outcome::Respond(templated_response(&query, ResponseCode::Refused));
    }

    match root.resolve(&query, &client).await {
        Ok(Some(response)) => Outcome::Respond(response),
        Ok(None) => Outcome::Drop,
        Err(err) => {
            tracing::warn!(target: "routedns::listener", listener = %client.listener_id, error = %err, "resolver error, answering SERVFAIL");
            Outcome::Respond(templated_response(&query, ResponseCode::ServFail))
        }
    }
}

/// Applies RFC 7830/8467 padding if the original query advertised support
/// for it (an empty PADDING option present).
pub fn apply_padding_if_requested(query: &DnsMessage, response: &mut DnsMessage, block_size: usize) {
    const PADDING_OPTION_CODE: u16 = 12;
    let client_requested_padding = query
        .edns()
        .map(|edns| {
            edns.options()
                .get(hickory_proto::rr::rdata::opt::EdnsCode::Unknown(PADDING_OPTION_CODE))
                .is_some()
        })
        .unwrap_or(false);
    if client_requested_padding {
        let _ = response.pad_to_block_size(block_size);
    }
}

/// Truncates an over-size UDP response and sets TC, per §6 "truncate UDP
/// responses larger than the negotiated EDNS0 UDP size and set TC".
pub fn truncate_for_udp(response: &mut DnsMessage, negotiated_size: u16) -> Vec<u8> {
    let bytes = response.to_wire().unwrap_or_default();
    if bytes.len() <= negotiated_size as usize {
        return bytes;
    }
    response.retain_answers(|_| false);
    response.authority_mut().clear();
    response.additionals_mut().clear();
    response.set_truncated(true);
    response.to_wire().unwrap_or_default()
}

pub fn client_info_for(source_ip: IpAddr, listener_id: impl Into<String>) -> ClientInfo {
    ClientInfo::new(source_ip, listener_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_a_response, fixed_client_info, fixed_query, StubResolver};
    use routedns_core::Resolver;

    #[tokio::test]
    async fn acl_denial_returns_refused() {
        let mut acl = Acl::new();
        acl.allow(ip_network::IpNetwork::V4("10.0.0.0/8".parse().unwrap()));
        let inner = StubResolver::new("inner", fixed_query("example.com.", RecordType::A));
        let client = fixed_client_info();
        let query = fixed_query("example.com.", RecordType::A);
        let wire = query.to_wire().unwrap();

        let outcome = handle_query(&(inner as ResolverHandle), &acl, &wire, client).await;
        match outcome {
            Outcome::Respond(response) => assert_eq!(response.rcode(), ResponseCode::Refused),
            Outcome::Drop => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn resolver_error_becomes_servfail() {
        let acl = Acl::new();
        let inner = routedns_core::testing::FailingResolver::new("inner", routedns_core::ResolveError::Timeout);
        let client = fixed_client_info();
        let query = fixed_query("example.com.", RecordType::A);
        let wire = query.to_wire().unwrap();

        let outcome = handle_query(&(inner as ResolverHandle), &acl, &wire, client).await;
        match outcome {
            Outcome::Respond(response) => assert_eq!(response.rcode(), ResponseCode::ServFail),
            Outcome::Drop => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn drop_sentinel_propagates() {
        let acl = Acl::new();
        let response = fixed_a_response(&fixed_query("example.com.", RecordType::A), "1.2.3.4".parse().unwrap(), 60);
        let inner = StubResolver::new("inner", response);
        let _ = inner.resolve(&fixed_query("x.", RecordType::A), &fixed_client_info()).await;

        #[derive(Debug)]
        struct Dropper;
        #[async_trait::async_trait]
        impl Resolver for Dropper {
            async fn resolve(&self, _q: &DnsMessage, _c: &ClientInfo) -> Result<Option<DnsMessage>, routedns_core::ResolveError> {
                Ok(None)
            }
            fn id(&self) -> &str {
                "drop"
            }
        }
        let root: ResolverHandle = std::sync::Arc::new(Dropper);
        let query = fixed_query("example.com.", RecordType::A);
        let wire = query.to_wire().unwrap();
        let outcome = handle_query(&root, &acl, &wire, fixed_client_info()).await;
        assert!(matches!(outcome, Outcome::Drop));
    }

    #[tokio::test]
    async fn malformed_wire_bytes_drop() {
        let acl = Acl::new();
        let inner = StubResolver::new("inner", fixed_query("example.com.", RecordType::A));
        let outcome = handle_query(&(inner as ResolverHandle), &acl, &[0xFF, 0x00], fixed_client_info()).await;
        assert!(matches!(outcome, Outcome::Drop));
    }
}
