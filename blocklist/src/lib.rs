//! Blocklist database variants (§3 "Blocklist databases") and the atomic
//! hot-reload wrapper shared by all of them.

pub mod cidr;
pub mod domain_tree;
pub mod geoip;
pub mod hosts;
pub mod matcher;
pub mod regex_list;
pub mod reload;

pub use cidr::CidrSet;
pub use domain_tree::DomainTree;
pub use geoip::GeoIp;
pub use hosts::HostsFile;
pub use matcher::{Database, MatchResult};
pub use regex_list::RegexList;
pub use reload::Reloadable;
