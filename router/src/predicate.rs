use std::collections::HashSet;
use std::net::IpAddr;

use chrono::{Local, Timelike, Weekday};
use hickory_proto::rr::{DNSClass, RecordType};
use ip_network::IpNetwork;
use regex::Regex;
use routedns_core::ClientInfo;
use routedns_core::DnsMessage;

/// A time-of-day window, inclusive of both ends, compared against the local
/// clock (§3 "before/after times of day (local clock)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub after_secs: u32,
    pub before_secs: u32,
}

impl TimeWindow {
    fn contains(&self, secs_since_midnight: u32) -> bool {
        if self.after_secs <= self.before_secs {
            (self.after_secs..=self.before_secs).contains(&secs_since_midnight)
        } else {
            // Window wraps past midnight, e.g. 22:00-06:00.
            secs_since_midnight >= self.after_secs || secs_since_midnight <= self.before_secs
        }
    }
}

/// A route predicate (§3 "Route"). Every attribute is optional; `None` means
/// "do not restrict". A predicate with every attribute `None` is the default
/// route and matches every query.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    pub query_name: Option<Regex>,
    pub record_types: Option<HashSet<RecordType>>,
    pub class: Option<DNSClass>,
    pub source_networks: Option<Vec<IpNetwork>>,
    pub weekdays: Option<HashSet<Weekday>>,
    pub time_window: Option<TimeWindow>,
    pub doh_path: Option<Regex>,
    pub listener_id: Option<Regex>,
    pub tls_server_name: Option<Regex>,
    pub invert: bool,
}

impl Predicate {
    pub fn is_default(&self) -> bool {
        self.query_name.is_none()
            && self.record_types.is_none()
            && self.class.is_none()
            && self.source_networks.is_none()
            && self.weekdays.is_none()
            && self.time_window.is_none()
            && self.doh_path.is_none()
            && self.listener_id.is_none()
            && self.tls_server_name.is_none()
    }

    /// Logical AND of every populated attribute, then inverted if `invert`.
    pub fn matches(&self, query: &DnsMessage, client: &ClientInfo) -> bool {
        let raw = self.matches_uninverted(query, client);
        raw != self.invert
    }

    fn matches_uninverted(&self, query: &DnsMessage, client: &ClientInfo) -> bool {
        let Some(question) = query.question() else {
            return false;
        };

        if let Some(re) = &self.query_name {
            if !re.is_match(&question.name().to_ascii()) {
                return false;
            }
        }

        if let Some(types) = &self.record_types {
            if !types.contains(&question.query_type()) {
                return false;
            }
        }

        if let Some(class) = &self.class {
            if question.query_class() != *class {
                return false;
            }
        }

        if let Some(networks) = &self.source_networks {
            if !networks.iter().any(|n| network_contains(n, client.source_ip)) {
                return false;
            }
        }

        if self.weekdays.is_some() || self.time_window.is_some() {
            let now = Local::now();
            if let Some(days) = &self.weekdays {
                if !days.contains(&now.weekday()) {
                    return false;
                }
            }
            if let Some(window) = &self.time_window {
                let secs = now.num_seconds_from_midnight();
                if !window.contains(secs) {
                    return false;
                }
            }
        }

        if let Some(re) = &self.doh_path {
            match &client.doh_path {
                Some(p) if re.is_match(p) => {}
                _ => return false,
            }
        }

        if let Some(re) = &self.listener_id {
            if !re.is_match(&client.listener_id) {
                return false;
            }
        }

        if let Some(re) = &self.tls_server_name {
            match &client.tls_server_name {
                Some(name) if re.is_match(name) => {}
                _ => return false,
            }
        }

        true
    }
}

fn network_contains(network: &IpNetwork, addr: IpAddr) -> bool {
    match (network, addr) {
        (IpNetwork::V4(n), IpAddr::V4(a)) => n.contains(a),
        (IpNetwork::V6(n), IpAddr::V6(a)) => n.contains(a),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routedns_core::testing::{fixed_client_info, fixed_query};

    #[test]
    fn empty_predicate_is_default_and_matches_everything() {
        let pred = Predicate::default();
        assert!(pred.is_default());
        let query = fixed_query("example.com.", RecordType::A);
        assert!(pred.matches(&query, &fixed_client_info()));
    }

    #[test]
    fn source_network_predicate() {
        let mut pred = Predicate::default();
        pred.source_networks = Some(vec![IpNetwork::V4(
            "192.168.1.123/32".parse().unwrap(),
        )]);

        let query = fixed_query("facebook.com.", RecordType::A);
        assert!(pred.matches(&query, &fixed_client_info()));

        let mut other = fixed_client_info();
        other.source_ip = "192.168.1.124".parse().unwrap();
        assert!(!pred.matches(&query, &other));
    }

    #[test]
    fn inversion_flips_the_result() {
        let mut pred = Predicate::default();
        pred.record_types = Some([RecordType::AAAA].into_iter().collect());
        pred.invert = true;

        let query = fixed_query("example.com.", RecordType::A);
        assert!(pred.matches(&query, &fixed_client_info()));
    }
}
