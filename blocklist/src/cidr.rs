use std::net::IpAddr;

use ip_network::IpNetwork;
use ip_network_table::IpNetworkTable;

use crate::matcher::{Database, MatchResult};

/// Longest-prefix-match CIDR set for client-IP and response-IP blocking
/// (§3 "CIDR set"), supporting both address families via `ip_network_table`.
#[derive(Debug, Default)]
pub struct CidrSet {
    list_name: String,
    table: IpNetworkTable<String>,
}

impl CidrSet {
    pub fn new(list_name: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            table: IpNetworkTable::new(),
        }
    }

    pub fn insert(&mut self, network: IpNetwork, rule_id: impl Into<String>) {
        self.table.insert(network, rule_id.into());
    }

    pub fn len(&self) -> usize {
        self.table.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.table.iter().next().is_none()
    }
}

impl Database for CidrSet {
    fn match_addr(&self, addr: IpAddr) -> Option<MatchResult> {
        let (_, rule_id) = self.table.longest_match(addr)?;
        Some(MatchResult::new(self.list_name.clone(), rule_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(cidr: &str) -> IpNetwork {
        IpNetwork::V4(cidr.parse().unwrap())
    }

    #[test]
    fn longest_prefix_wins() {
        let mut set = CidrSet::new("test");
        set.insert(v4("10.0.0.0/8"), "broad");
        set.insert(v4("10.1.2.0/24"), "specific");

        let hit = set.match_addr("10.1.2.3".parse().unwrap()).unwrap();
        assert_eq!(hit.rule_id, "specific");

        let hit = set.match_addr("10.9.9.9".parse().unwrap()).unwrap();
        assert_eq!(hit.rule_id, "broad");
    }

    #[test]
    fn outside_any_network_is_a_miss() {
        let mut set = CidrSet::new("test");
        set.insert(v4("10.0.0.0/8"), "broad");
        assert!(set.match_addr("8.8.8.8".parse().unwrap()).is_none());
    }
}
