use std::net::IpAddr;

/// The result of a blocklist hit (§3 "Blocklist match result"): which list
/// and rule matched, plus any spoofed answers the database can supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub list_name: String,
    pub rule_id: String,
    pub ip_overrides: Vec<IpAddr>,
    pub name_overrides: Vec<String>,
}

impl MatchResult {
    pub fn new(list_name: impl Into<String>, rule_id: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            rule_id: rule_id.into(),
            ip_overrides: Vec::new(),
            name_overrides: Vec::new(),
        }
    }

    pub fn with_ip_overrides(mut self, ips: Vec<IpAddr>) -> Self {
        self.ip_overrides = ips;
        self
    }

    pub fn with_name_overrides(mut self, names: Vec<String>) -> Self {
        self.name_overrides = names;
        self
    }
}

/// The common capability every blocklist database variant exposes (§3
/// "Blocklist databases... each exposing the same match operation"). A
/// database only implements the method(s) that make sense for its input
/// shape; the other is the default no-match.
pub trait Database: Send + Sync + std::fmt::Debug {
    fn match_name(&self, _name: &str) -> Option<MatchResult> {
        None
    }

    fn match_addr(&self, _addr: IpAddr) -> Option<MatchResult> {
        None
    }
}
