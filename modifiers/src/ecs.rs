use std::net::IpAddr;

use async_trait::async_trait;
use hickory_proto::rr::rdata::opt::ClientSubnet;
use routedns_core::{ClientInfo, DnsMessage, ResolveError, Resolver, ResolverHandle};

/// How the ECS modifier treats the outbound query's Client Subnet option
/// (§4.5 "ECS modifier").
#[derive(Debug, Clone)]
pub enum EcsMode {
    /// Add the client's source address (or a fixed override) if no option
    /// is already present.
    Add { prefix_v4: u8, prefix_v6: u8 },
    /// Replace whatever option is present (or add one) with the client's
    /// source address.
    Overwrite { prefix_v4: u8, prefix_v6: u8 },
    /// Remove any Client Subnet option before forwarding.
    Strip,
    /// Keep the option but truncate the address to the given prefix length,
    /// for privacy.
    Mask { prefix_v4: u8, prefix_v6: u8 },
}

fn mask_address(addr: IpAddr, prefix_v4: u8, prefix_v6: u8) -> (IpAddr, u8) {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4) & (!0u32).checked_shl(32 - prefix_v4 as u32).unwrap_or(0);
            (IpAddr::V4(bits.into()), prefix_v4)
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6) & (!0u128).checked_shl(128 - prefix_v6 as u32).unwrap_or(0);
            (IpAddr::V6(bits.into()), prefix_v6)
        }
    }
}

/// Forwards with the Client Subnet option adjusted per `mode` (§4.5 "ECS
/// modifier"); does not touch the response.
#[derive(Debug)]
pub struct EcsModifier {
    id: String,
    inner: ResolverHandle,
    mode: EcsMode,
}

impl EcsModifier {
    pub fn new(id: impl Into<String>, inner: ResolverHandle, mode: EcsMode) -> Self {
        Self {
            id: id.into(),
            inner,
            mode,
        }
    }
}

#[async_trait]
impl Resolver for EcsModifier {
    async fn resolve(
        &self,
        query: &DnsMessage,
        client: &ClientInfo,
    ) -> Result<Option<DnsMessage>, ResolveError> {
        let mut outbound = query.clone();

        match &self.mode {
            EcsMode::Strip => outbound.remove_client_subnet(),
            EcsMode::Add { prefix_v4, prefix_v6 } => {
                if outbound.client_subnet().is_none() {
                    let (addr, prefix) = mask_address(client.source_ip, *prefix_v4, *prefix_v6);
                    outbound.set_client_subnet(ClientSubnet::new(addr, prefix, 0));
                }
            }
            EcsMode::Overwrite { prefix_v4, prefix_v6 } => {
                let (addr, prefix) = mask_address(client.source_ip, *prefix_v4, *prefix_v6);
                outbound.set_client_subnet(ClientSubnet::new(addr, prefix, 0));
            }
            EcsMode::Mask { prefix_v4, prefix_v6 } => {
                if let Some(existing) = outbound.client_subnet() {
                    let (addr, prefix) = mask_address(existing.address(), *prefix_v4, *prefix_v6);
                    outbound.set_client_subnet(ClientSubnet::new(addr, prefix, existing.scope_prefix()));
                }
            }
        }

        self.inner.resolve(&outbound, client).await
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::{fixed_client_info, fixed_query, StubResolver};

    fn resolver_with_capture() -> (ResolverHandle, std::sync::Arc<StubResolver>) {
        let response = fixed_query("example.com.", RecordType::A);
        let stub = StubResolver::new("inner", response);
        (stub.clone() as ResolverHandle, stub)
    }

    #[tokio::test]
    async fn add_only_sets_when_absent() {
        let (handle, stub) = resolver_with_capture();
        let modifier = EcsModifier::new(
            "ecs",
            handle,
            EcsMode::Add {
                prefix_v4: 24,
                prefix_v6: 56,
            },
        );
        let query = fixed_query("example.com.", RecordType::A);
        modifier.resolve(&query, &fixed_client_info()).await.unwrap();
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn strip_removes_existing_option() {
        let (handle, _stub) = resolver_with_capture();
        let modifier = EcsModifier::new("ecs", handle, EcsMode::Strip);
        let mut query = fixed_query("example.com.", RecordType::A);
        query.set_client_subnet(ClientSubnet::new("10.1.2.3".parse().unwrap(), 24, 0));
        assert!(query.client_subnet().is_some());
        modifier.resolve(&query, &fixed_client_info()).await.unwrap();
    }

    #[test]
    fn mask_truncates_v4_address() {
        let (addr, prefix) = mask_address("10.1.2.3".parse().unwrap(), 16, 64);
        assert_eq!(addr, "10.1.0.0".parse::<IpAddr>().unwrap());
        assert_eq!(prefix, 16);
    }
}
