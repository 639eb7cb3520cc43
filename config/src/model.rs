use std::collections::HashMap;

use serde::Deserialize;

/// The top-level shape of a configuration file (§6 "Configuration file"):
/// four tables, each a map keyed by a unique id. Multiple files are merged
/// table-by-table, key-by-key, with later files overriding earlier ones for
/// the same id.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub resolvers: HashMap<String, ResolverSpec>,
    #[serde(default)]
    pub groups: HashMap<String, GroupSpec>,
    #[serde(default)]
    pub routers: HashMap<String, RouterSpec>,
    #[serde(default)]
    pub listeners: HashMap<String, ListenerSpec>,
    #[serde(default)]
    pub blocklists: HashMap<String, BlocklistSpec>,
}

impl Document {
    /// Merges `other` into `self`, key by key, `other` winning on conflict
    /// (§6 "later files win per key").
    pub fn merge(&mut self, other: Document) {
        self.resolvers.extend(other.resolvers);
        self.groups.extend(other.groups);
        self.routers.extend(other.routers);
        self.listeners.extend(other.listeners);
        self.blocklists.extend(other.blocklists);
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResolverSpec {
    Udp(UpstreamSpec),
    Tcp(UpstreamSpec),
    Tls(UpstreamSpec),
    Doh(DohSpec),
    Doq(UpstreamSpec),
    Dtls(UpstreamSpec),
    Cache(CacheSpec),
    TtlClamp(TtlClampSpec),
    Ecs(EcsSpec),
    Collapse(CollapseSpec),
    Static(StaticSpec),
    Drop(SingleIdSpec),
    Truncate(SingleIdSpec),
    TruncateRetry(TruncateRetrySpec),
    Blocklist(BlocklistFilterSpec),
    ClientBlocklist(ClientBlocklistSpec),
    ResponseBlocklist(ResponseBlocklistSpec),
    Replace(ReplaceSpec),
    QueryLog(QueryLogSpec),
    Syslog(SyslogSpec),
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSpec {
    pub address: String,
    #[serde(default)]
    pub bootstrap_ip: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// TLS/DTLS/DoQ server name, if it differs from `address`'s hostname.
    #[serde(default)]
    pub server_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DohSpec {
    pub url: String,
    #[serde(default)]
    pub method: DohMethodSpec,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DohMethodSpec {
    #[default]
    Post,
    Get,
}

fn default_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSpec {
    pub resolver: String,
    #[serde(default)]
    pub max_entries: Option<u64>,
    #[serde(default)]
    pub default_negative_ttl_secs: Option<u64>,
    #[serde(default)]
    pub cache_servfail: Option<bool>,
    #[serde(default)]
    pub harden_below_nxdomain: Option<bool>,
    #[serde(default)]
    pub prefetch_hit_threshold: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TtlClampSpec {
    pub resolver: String,
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EcsSpec {
    pub resolver: String,
    pub mode: EcsModeSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum EcsModeSpec {
    Add { prefix_v4: u8, prefix_v6: u8 },
    Overwrite { prefix_v4: u8, prefix_v6: u8 },
    Strip,
    Mask { prefix_v4: u8, prefix_v6: u8 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollapseSpec {
    pub resolver: String,
    #[serde(default)]
    pub empty_rcode: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "template", rename_all = "kebab-case")]
pub enum StaticSpec {
    Rcode { rcode: String },
    Address { ip: String, ttl: u32 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SingleIdSpec {
    #[serde(default)]
    pub resolver: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TruncateRetrySpec {
    pub resolver: String,
    pub retry: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlocklistFilterSpec {
    pub resolver: String,
    pub blocklist: String,
    #[serde(default)]
    pub allowlist: Option<String>,
    #[serde(default)]
    pub action: BlockActionSpec,
    #[serde(default)]
    pub divert: Option<String>,
    #[serde(default)]
    pub ede: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockActionSpec {
    #[default]
    Nxdomain,
    Divert,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientBlocklistSpec {
    pub resolver: String,
    pub blocklist: String,
    #[serde(default)]
    pub source: ClientAddrSourceSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientAddrSourceSpec {
    #[default]
    SourceIp,
    Ecs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseBlocklistSpec {
    pub resolver: String,
    #[serde(default)]
    pub ip_blocklist: Option<String>,
    #[serde(default)]
    pub name_blocklist: Option<String>,
    #[serde(default)]
    pub action: ResponseBlockActionSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseBlockActionSpec {
    Filter,
    #[default]
    Nxdomain,
    Divert,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceSpec {
    pub resolver: String,
    pub rules: Vec<ReplaceRuleSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceRuleSpec {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryLogSpec {
    pub resolver: String,
    #[serde(default)]
    pub verbosity: QueryLogVerbositySpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryLogVerbositySpec {
    #[default]
    QueryOnly,
    QueryAndResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyslogSpec {
    pub resolver: String,
    #[serde(default)]
    pub format: SyslogFormatSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyslogFormatSpec {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GroupSpec {
    RoundRobin {
        resolvers: Vec<String>,
    },
    FailRotate {
        resolvers: Vec<String>,
        #[serde(default)]
        retry_on_servfail: bool,
    },
    FailBack {
        resolvers: Vec<String>,
        #[serde(default)]
        retry_on_servfail: bool,
        #[serde(default = "default_quiet_period_ms")]
        quiet_period_ms: u64,
    },
    Random {
        resolvers: Vec<String>,
        #[serde(default)]
        cool_off_ms: u64,
    },
    Fastest {
        resolvers: Vec<String>,
    },
    FastestTcp {
        resolver: String,
        #[serde(default = "default_probe_port")]
        probe_port: u16,
        #[serde(default = "default_timeout_ms")]
        probe_timeout_ms: u64,
    },
}

fn default_quiet_period_ms() -> u64 {
    60_000
}

fn default_probe_port() -> u16 {
    53
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterSpec {
    pub routes: Vec<RouteSpec>,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteSpec {
    pub resolver: String,
    #[serde(default)]
    pub predicate: PredicateSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredicateSpec {
    #[serde(default)]
    pub query_name: Option<String>,
    #[serde(default)]
    pub record_types: Option<Vec<String>>,
    #[serde(default)]
    pub source_networks: Option<Vec<String>>,
    #[serde(default)]
    pub weekdays: Option<Vec<String>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub doh_path: Option<String>,
    #[serde(default)]
    pub listener_id: Option<String>,
    #[serde(default)]
    pub tls_server_name: Option<String>,
    #[serde(default)]
    pub invert: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ListenerSpec {
    Udp(PlainListenerSpec),
    Tcp(PlainListenerSpec),
    Tls(TlsListenerSpec),
    Doh(DohListenerSpec),
    Doq(TlsListenerSpec),
    Dtls(DtlsListenerSpec),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlainListenerSpec {
    pub address: String,
    pub resolver: String,
    #[serde(default)]
    pub allow: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsListenerSpec {
    pub address: String,
    pub resolver: String,
    pub cert_path: String,
    pub key_path: String,
    #[serde(default)]
    pub allow: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DtlsListenerSpec {
    pub address: String,
    pub resolver: String,
    pub cert_path: String,
    pub key_path: String,
    #[serde(default)]
    pub allow: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DohListenerSpec {
    pub address: String,
    pub resolver: String,
    #[serde(default = "default_doh_path")]
    pub path: String,
    pub cert_path: String,
    pub key_path: String,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

fn default_doh_path() -> String {
    "/dns-query".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BlocklistSpec {
    DomainTree { path: String },
    Cidr { path: String },
    Hosts { path: String },
    Regex { path: String },
    GeoIp { path: String, geoname_ids: Vec<u32> },
}
