use std::net::IpAddr;

use ip_network::IpNetwork;
use ip_network_table::IpNetworkTable;

/// CIDR allowlist access-control check (§6 "apply an access-control check
/// (CIDR allowlist)"). An empty allowlist permits every source, matching
/// the common "no ACL configured" default.
#[derive(Debug, Default)]
pub struct Acl {
    allowed: IpNetworkTable<()>,
    configured: bool,
}

impl Acl {
    pub fn new() -> Self {
        Self {
            allowed: IpNetworkTable::new(),
            configured: false,
        }
    }

    pub fn allow(&mut self, network: IpNetwork) {
        self.allowed.insert(network, ());
        self.configured = true;
    }

    pub fn permits(&self, addr: IpAddr) -> bool {
        !self.configured || self.allowed.longest_match(addr).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_acl_allows_everything() {
        let acl = Acl::new();
        assert!(acl.permits("1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn configured_acl_denies_outside_any_network() {
        let mut acl = Acl::new();
        acl.allow(IpNetwork::V4("10.0.0.0/8".parse().unwrap()));
        assert!(acl.permits("10.1.2.3".parse().unwrap()));
        assert!(!acl.permits("8.8.8.8".parse().unwrap()));
    }
}
