use std::collections::HashMap;
use std::net::IpAddr;

use crate::matcher::{Database, MatchResult};

/// A hosts-file style name-to-address mapping (§3 "Hosts-file"). `None`
/// means the configured address was the zero address, which is treated as
/// NXDOMAIN rather than a spoofed answer.
#[derive(Debug, Default)]
pub struct HostsFile {
    list_name: String,
    entries: HashMap<String, Option<IpAddr>>,
}

fn is_zero(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_unspecified(),
    }
}

impl HostsFile {
    pub fn new(list_name: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, addr: IpAddr) {
        let addr = if is_zero(&addr) { None } else { Some(addr) };
        self.entries.insert(name.into().trim_end_matches('.').to_ascii_lowercase(), addr);
    }

    /// Parses standard `/etc/hosts` syntax: `<address> <name> [aliases...]`,
    /// blank lines and `#` comments ignored.
    pub fn from_lines(list_name: impl Into<String>, text: &str) -> Self {
        let mut hosts = Self::new(list_name);
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(addr) = parts.next().and_then(|a| a.parse::<IpAddr>().ok()) else {
                continue;
            };
            for name in parts {
                hosts.insert(name, addr);
            }
        }
        hosts
    }
}

impl Database for HostsFile {
    fn match_name(&self, name: &str) -> Option<MatchResult> {
        let key = name.trim_end_matches('.').to_ascii_lowercase();
        let addr = self.entries.get(&key)?;
        let result = MatchResult::new(self.list_name.clone(), key);
        Some(match addr {
            Some(ip) => result.with_ip_overrides(vec![*ip]),
            None => result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address_means_nxdomain() {
        let hosts = HostsFile::from_lines("test", "0.0.0.0 blocked.test");
        let hit = hosts.match_name("blocked.test").unwrap();
        assert!(hit.ip_overrides.is_empty());
    }

    #[test]
    fn nonzero_address_spoofs() {
        let hosts = HostsFile::from_lines("test", "10.0.0.1 pi.hole extra.alias");
        assert_eq!(hosts.match_name("pi.hole").unwrap().ip_overrides, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(hosts.match_name("extra.alias").unwrap().ip_overrides, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);
    }
}
