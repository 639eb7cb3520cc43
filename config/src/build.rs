use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use ip_network::IpNetwork;
use regex::Regex;
use routedns_blocklist::{CidrSet, Database, DomainTree, GeoIp, HostsFile, RegexList};
use routedns_cache::{CacheConfig, CacheResolver};
use routedns_core::{Metrics, ResolverHandle};
use routedns_groups::{FailBackGroup, FailRotateGroup, FastestGroup, FastestTcpGroup, RandomGroup, RoundRobinGroup};
use routedns_modifiers::{
    BlockAction, BlocklistFilter, ClientAddrSource, ClientBlocklist, Collapse, DropModifier, EcsMode, EcsModifier, QueryLog, LogVerbosity,
    Replace, ResponseBlockAction, ResponseBlocklist, StaticResponder, Syslog, Template, TruncateRetry, TtlClamp, Truncate as TruncateModifier,
    RecordFormat,
};
use routedns_router::{Predicate, Route, RouterResolver, TimeWindow};
use routedns_upstream::{
    DohClient, DohMethod, DohResolver, DoqClient, DoqResolver, DtlsDialer, Endpoint, PipelineConfig, PipelinedClient, StreamResolver, TcpDialer,
    TlsDialer, UdpClient, UdpResolver,
};

use crate::error::ConfigError;
use crate::graph::Builder;
use crate::model::{
    BlockActionSpec, BlocklistFilterSpec, BlocklistSpec, CacheSpec, ClientAddrSourceSpec, ClientBlocklistSpec, CollapseSpec, DohMethodSpec,
    DohSpec, EcsModeSpec, EcsSpec, GroupSpec, PredicateSpec, QueryLogSpec, QueryLogVerbositySpec, ReplaceSpec, ResolverSpec,
    ResponseBlockActionSpec, ResponseBlocklistSpec, RouterSpec, StaticSpec, SyslogFormatSpec, SyslogSpec, TruncateRetrySpec,
    TtlClampSpec, UpstreamSpec,
};

fn parse_endpoint(spec: &UpstreamSpec) -> Result<Endpoint, ConfigError> {
    let (host, port) = spec.address.rsplit_once(':').ok_or_else(|| ConfigError::InvalidValue {
        id: spec.address.clone(),
        field: "address".into(),
        reason: "expected host:port".into(),
    })?;
    let port: u16 = port.parse().map_err(|_| ConfigError::InvalidValue {
        id: spec.address.clone(),
        field: "address".into(),
        reason: "invalid port".into(),
    })?;
    let mut endpoint = Endpoint::new(spec.server_name.clone().unwrap_or_else(|| host.to_string()), port);
    if let Some(ip) = &spec.bootstrap_ip {
        let ip: IpAddr = ip.parse().map_err(|_| ConfigError::InvalidValue {
            id: ip.clone(),
            field: "bootstrap_ip".into(),
            reason: "invalid IP address".into(),
        })?;
        endpoint = endpoint.with_bootstrap_ip(ip);
    }
    Ok(endpoint)
}

fn default_quic_client_config() -> Result<quinn::ClientConfig, ConfigError> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let rustls_config = rustls::ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
    let quic_config = quinn::crypto::rustls::QuicClientConfig::try_from(rustls_config)
        .map_err(|e| ConfigError::InvalidValue { id: "doq".into(), field: "tls".into(), reason: e.to_string() })?;
    Ok(quinn::ClientConfig::new(Arc::new(quic_config)))
}

pub fn build_resolver(builder: &mut Builder, id: &str, spec: &ResolverSpec) -> Result<ResolverHandle, ConfigError> {
    let handle: ResolverHandle = match spec {
        ResolverSpec::Udp(u) => {
            let client = UdpClient::new(id, parse_endpoint(u)?);
            Arc::new(UdpResolver::new(client, Duration::from_millis(u.timeout_ms)))
        }
        ResolverSpec::Tcp(u) => {
            let dialer = TcpDialer::new(parse_endpoint(u)?);
            let client = Arc::new(PipelinedClient::new(id, dialer, PipelineConfig::default()));
            Arc::new(StreamResolver::new(client, Duration::from_millis(u.timeout_ms)))
        }
        ResolverSpec::Tls(u) => {
            let dialer = TlsDialer::with_webpki_roots(parse_endpoint(u)?);
            let client = Arc::new(PipelinedClient::new(id, dialer, PipelineConfig::default()));
            Arc::new(StreamResolver::new(client, Duration::from_millis(u.timeout_ms)))
        }
        ResolverSpec::Dtls(u) => {
            let dialer = DtlsDialer::new(parse_endpoint(u)?, webrtc_dtls::config::Config::default());
            let client = Arc::new(PipelinedClient::new(id, dialer, PipelineConfig::default()));
            Arc::new(StreamResolver::new(client, Duration::from_millis(u.timeout_ms)))
        }
        ResolverSpec::Doh(d) => {
            let method = match d.method {
                DohMethodSpec::Get => DohMethod::Get,
                DohMethodSpec::Post => DohMethod::Post,
            };
            let client = DohClient::new(id, d.url.clone(), method).map_err(|e| ConfigError::InvalidValue {
                id: id.to_string(),
                field: "url".into(),
                reason: e.to_string(),
            })?;
            Arc::new(DohResolver::new(client, Duration::from_millis(d.timeout_ms)))
        }
        ResolverSpec::Doq(u) => {
            let client_config = default_quic_client_config()?;
            let client = DoqClient::new(id, parse_endpoint(u)?, client_config).map_err(|e| ConfigError::InvalidValue {
                id: id.to_string(),
                field: "address".into(),
                reason: e.to_string(),
            })?;
            Arc::new(DoqResolver::new(client, Duration::from_millis(u.timeout_ms)))
        }
        ResolverSpec::Cache(c) => build_cache(builder, id, c)?,
        ResolverSpec::TtlClamp(c) => build_ttl_clamp(builder, id, c)?,
        ResolverSpec::Ecs(c) => build_ecs(builder, id, c)?,
        ResolverSpec::Collapse(c) => build_collapse(builder, id, c)?,
        ResolverSpec::Static(c) => build_static(id, c)?,
        ResolverSpec::Drop(c) => {
            let _ = &c.resolver;
            Arc::new(DropModifier::new(id))
        }
        ResolverSpec::Truncate(_) => Arc::new(TruncateModifier::new(id)),
        ResolverSpec::TruncateRetry(c) => build_truncate_retry(builder, id, c)?,
        ResolverSpec::Blocklist(c) => build_blocklist_filter(builder, id, c)?,
        ResolverSpec::ClientBlocklist(c) => build_client_blocklist(builder, id, c)?,
        ResolverSpec::ResponseBlocklist(c) => build_response_blocklist(builder, id, c)?,
        ResolverSpec::Replace(c) => build_replace(builder, id, c)?,
        ResolverSpec::QueryLog(c) => build_query_log(builder, id, c)?,
        ResolverSpec::Syslog(c) => build_syslog(builder, id, c)?,
    };
    Ok(handle)
}

fn build_cache(builder: &mut Builder, id: &str, c: &CacheSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let mut config = CacheConfig::default();
    if let Some(v) = c.max_entries {
        config.max_entries = v;
    }
    if let Some(v) = c.default_negative_ttl_secs {
        config.default_negative_ttl = Duration::from_secs(v);
    }
    if let Some(v) = c.cache_servfail {
        config.cache_servfail = v;
    }
    if let Some(v) = c.harden_below_nxdomain {
        config.harden_below_nxdomain = v;
    }
    if let Some(v) = c.prefetch_hit_threshold {
        config.prefetch_hit_threshold = v;
    }
    let cache = Arc::new(CacheResolver::new(id, inner, config, Arc::new(Metrics::new())));
    builder.register_cache(id, cache.clone());
    Ok(cache)
}

fn build_ttl_clamp(builder: &mut Builder, id: &str, c: &TtlClampSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    Ok(Arc::new(TtlClamp::new(id, inner, c.min, c.max)))
}

fn build_ecs(builder: &mut Builder, id: &str, c: &EcsSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let mode = match c.mode {
        EcsModeSpec::Add { prefix_v4, prefix_v6 } => EcsMode::Add { prefix_v4, prefix_v6 },
        EcsModeSpec::Overwrite { prefix_v4, prefix_v6 } => EcsMode::Overwrite { prefix_v4, prefix_v6 },
        EcsModeSpec::Strip => EcsMode::Strip,
        EcsModeSpec::Mask { prefix_v4, prefix_v6 } => EcsMode::Mask { prefix_v4, prefix_v6 },
    };
    Ok(Arc::new(EcsModifier::new(id, inner, mode)))
}

fn build_collapse(builder: &mut Builder, id: &str, c: &CollapseSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let rcode = match &c.empty_rcode {
        Some(s) => parse_rcode(id, s)?,
        None => ResponseCode::NXDomain,
    };
    Ok(Arc::new(Collapse::new(id, inner, rcode)))
}

fn build_static(id: &str, c: &StaticSpec) -> Result<ResolverHandle, ConfigError> {
    let template = match c {
        StaticSpec::Rcode { rcode } => Template::Rcode(parse_rcode(id, rcode)?),
        StaticSpec::Address { ip, ttl } => {
            let ip: IpAddr = ip.parse().map_err(|_| ConfigError::InvalidValue {
                id: id.to_string(),
                field: "ip".into(),
                reason: "invalid IP address".into(),
            })?;
            Template::Address { ip, ttl: *ttl }
        }
    };
    Ok(Arc::new(StaticResponder::new(id, template)))
}

fn build_truncate_retry(builder: &mut Builder, id: &str, c: &TruncateRetrySpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let retry = builder.resolve(&c.retry)?;
    Ok(Arc::new(TruncateRetry::new(id, inner, retry)))
}

fn build_blocklist_filter(builder: &mut Builder, id: &str, c: &BlocklistFilterSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let blocklist = builder.blocklist(&c.blocklist)?;
    let action = match c.action {
        BlockActionSpec::Nxdomain => BlockAction::Nxdomain,
        BlockActionSpec::Divert => {
            let target = c.divert.as_ref().ok_or_else(|| ConfigError::InvalidValue {
                id: id.to_string(),
                field: "divert".into(),
                reason: "divert action requires a 'divert' resolver id".into(),
            })?;
            BlockAction::Divert(builder.resolve(target)?)
        }
    };
    let mut filter = BlocklistFilter::new(id, inner, blocklist, action);
    if let Some(allow_id) = &c.allowlist {
        filter = filter.with_allowlist(builder.blocklist(allow_id)?);
    }
    if let Some(ede) = &c.ede {
        filter = filter.with_ede(leak_str(ede));
    }
    Ok(Arc::new(filter))
}

/// `BlocklistFilter::with_ede` takes a `&'static str` (an EDE extra-text
/// constant); configured text is leaked once at load time rather than
/// threading a lifetime through the whole resolver DAG, since the handful of
/// distinct messages a deployment configures live for the process lifetime
/// anyway.
fn leak_str(s: &str) -> &'static str {
    Box::leak(s.to_string().into_boxed_str())
}

fn build_client_blocklist(builder: &mut Builder, id: &str, c: &ClientBlocklistSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let blocklist = builder.blocklist(&c.blocklist)?;
    let source = match c.source {
        ClientAddrSourceSpec::SourceIp => ClientAddrSource::SourceIp,
        ClientAddrSourceSpec::Ecs => ClientAddrSource::Ecs,
    };
    Ok(Arc::new(ClientBlocklist::new(id, inner, blocklist, source)))
}

fn build_response_blocklist(builder: &mut Builder, id: &str, c: &ResponseBlocklistSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let action = match c.action {
        ResponseBlockActionSpec::Filter => ResponseBlockAction::Filter,
        ResponseBlockActionSpec::Nxdomain => ResponseBlockAction::Nxdomain,
        ResponseBlockActionSpec::Divert => ResponseBlockAction::Divert,
    };
    let mut modifier = ResponseBlocklist::new(id, inner, action);
    if let Some(ip_id) = &c.ip_blocklist {
        modifier = modifier.with_ip_blocklist(builder.blocklist(ip_id)?);
    }
    if let Some(name_id) = &c.name_blocklist {
        modifier = modifier.with_name_blocklist(builder.blocklist(name_id)?);
    }
    Ok(Arc::new(modifier))
}

fn build_replace(builder: &mut Builder, id: &str, c: &ReplaceSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let mut replace = Replace::new(id, inner);
    for rule in &c.rules {
        replace = replace.with_rule(&rule.pattern, rule.replacement.clone()).map_err(|e| ConfigError::InvalidValue {
            id: id.to_string(),
            field: "rules.pattern".into(),
            reason: e.to_string(),
        })?;
    }
    Ok(Arc::new(replace))
}

fn build_query_log(builder: &mut Builder, id: &str, c: &QueryLogSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let verbosity = match c.verbosity {
        QueryLogVerbositySpec::QueryOnly => LogVerbosity::QueryOnly,
        QueryLogVerbositySpec::QueryAndResponse => LogVerbosity::QueryAndResponse,
    };
    Ok(Arc::new(QueryLog::new(id, inner, verbosity)))
}

fn build_syslog(builder: &mut Builder, id: &str, c: &SyslogSpec) -> Result<ResolverHandle, ConfigError> {
    let inner = builder.resolve(&c.resolver)?;
    let format = match c.format {
        SyslogFormatSpec::Text => RecordFormat::Text,
        SyslogFormatSpec::Json => RecordFormat::Json,
    };
    Ok(Arc::new(Syslog::new(id, inner, format)))
}

pub fn build_group(builder: &mut Builder, id: &str, spec: &GroupSpec) -> Result<ResolverHandle, ConfigError> {
    let handle: ResolverHandle = match spec {
        GroupSpec::RoundRobin { resolvers } => Arc::new(RoundRobinGroup::new(id, resolve_all(builder, resolvers)?)),
        GroupSpec::FailRotate { resolvers, retry_on_servfail } => {
            Arc::new(FailRotateGroup::new(id, resolve_all(builder, resolvers)?, *retry_on_servfail))
        }
        GroupSpec::FailBack { resolvers, retry_on_servfail, quiet_period_ms } => Arc::new(FailBackGroup::new(
            id,
            resolve_all(builder, resolvers)?,
            *retry_on_servfail,
            Duration::from_millis(*quiet_period_ms),
        )),
        GroupSpec::Random { resolvers, cool_off_ms } => {
            Arc::new(RandomGroup::new(id, resolve_all(builder, resolvers)?, Duration::from_millis(*cool_off_ms)))
        }
        GroupSpec::Fastest { resolvers } => Arc::new(FastestGroup::new(id, resolve_all(builder, resolvers)?)),
        GroupSpec::FastestTcp { resolver, probe_port, probe_timeout_ms } => {
            let inner = builder.resolve(resolver)?;
            Arc::new(FastestTcpGroup::new(id, inner, *probe_port, Duration::from_millis(*probe_timeout_ms)))
        }
    };
    Ok(handle)
}

fn resolve_all(builder: &mut Builder, ids: &[String]) -> Result<Vec<ResolverHandle>, ConfigError> {
    ids.iter().map(|id| builder.resolve(id)).collect()
}

pub fn build_router(builder: &mut Builder, id: &str, spec: &RouterSpec) -> Result<ResolverHandle, ConfigError> {
    let mut routes = Vec::with_capacity(spec.routes.len());
    for (idx, route_spec) in spec.routes.iter().enumerate() {
        let target = builder.resolve(&route_spec.resolver)?;
        let predicate = parse_predicate(id, &route_spec.predicate)?;
        routes.push(Route::new(format!("{id}-route-{idx}"), predicate, target));
    }
    if let Some(default_id) = &spec.default {
        let target = builder.resolve(default_id)?;
        routes.push(Route::default_route(format!("{id}-default"), target));
    }
    Ok(Arc::new(RouterResolver::new(id, routes)))
}

fn parse_predicate(router_id: &str, spec: &PredicateSpec) -> Result<Predicate, ConfigError> {
    let mut predicate = Predicate::default();
    if let Some(pattern) = &spec.query_name {
        predicate.query_name = Some(Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
            id: router_id.to_string(),
            field: "predicate.query_name".into(),
            reason: e.to_string(),
        })?);
    }
    if let Some(types) = &spec.record_types {
        let mut set = HashSet::new();
        for t in types {
            set.insert(parse_record_type(router_id, t)?);
        }
        predicate.record_types = Some(set);
    }
    if let Some(networks) = &spec.source_networks {
        let mut parsed = Vec::with_capacity(networks.len());
        for n in networks {
            let net: IpNetwork = n.parse().map_err(|_| ConfigError::InvalidValue {
                id: router_id.to_string(),
                field: "predicate.source_networks".into(),
                reason: format!("invalid CIDR '{n}'"),
            })?;
            parsed.push(net);
        }
        predicate.source_networks = Some(parsed);
    }
    if let Some(days) = &spec.weekdays {
        let mut set = HashSet::new();
        for d in days {
            set.insert(parse_weekday(router_id, d)?);
        }
        predicate.weekdays = Some(set);
    }
    if let (Some(after), Some(before)) = (&spec.after, &spec.before) {
        predicate.time_window = Some(TimeWindow {
            after_secs: parse_time_of_day(router_id, after)?,
            before_secs: parse_time_of_day(router_id, before)?,
        });
    }
    if let Some(pattern) = &spec.doh_path {
        predicate.doh_path = Some(Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
            id: router_id.to_string(),
            field: "predicate.doh_path".into(),
            reason: e.to_string(),
        })?);
    }
    if let Some(pattern) = &spec.listener_id {
        predicate.listener_id = Some(Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
            id: router_id.to_string(),
            field: "predicate.listener_id".into(),
            reason: e.to_string(),
        })?);
    }
    if let Some(pattern) = &spec.tls_server_name {
        predicate.tls_server_name = Some(Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
            id: router_id.to_string(),
            field: "predicate.tls_server_name".into(),
            reason: e.to_string(),
        })?);
    }
    predicate.invert = spec.invert;
    Ok(predicate)
}

fn parse_record_type(id: &str, s: &str) -> Result<RecordType, ConfigError> {
    s.to_ascii_uppercase().parse::<RecordType>().map_err(|_| ConfigError::InvalidValue {
        id: id.to_string(),
        field: "predicate.record_types".into(),
        reason: format!("unknown record type '{s}'"),
    })
}

fn parse_weekday(id: &str, s: &str) -> Result<chrono::Weekday, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "mon" | "monday" => Ok(chrono::Weekday::Mon),
        "tue" | "tuesday" => Ok(chrono::Weekday::Tue),
        "wed" | "wednesday" => Ok(chrono::Weekday::Wed),
        "thu" | "thursday" => Ok(chrono::Weekday::Thu),
        "fri" | "friday" => Ok(chrono::Weekday::Fri),
        "sat" | "saturday" => Ok(chrono::Weekday::Sat),
        "sun" | "sunday" => Ok(chrono::Weekday::Sun),
        other => Err(ConfigError::InvalidValue {
            id: id.to_string(),
            field: "predicate.weekdays".into(),
            reason: format!("unknown weekday '{other}'"),
        }),
    }
}

/// Parses `HH:MM:SS` into seconds since midnight.
fn parse_time_of_day(id: &str, s: &str) -> Result<u32, ConfigError> {
    let parts: Vec<&str> = s.split(':').collect();
    let invalid = || ConfigError::InvalidValue {
        id: id.to_string(),
        field: "predicate.after/before".into(),
        reason: format!("expected HH:MM:SS, got '{s}'"),
    };
    if parts.len() != 3 {
        return Err(invalid());
    }
    let h: u32 = parts[0].parse().map_err(|_| invalid())?;
    let m: u32 = parts[1].parse().map_err(|_| invalid())?;
    let s: u32 = parts[2].parse().map_err(|_| invalid())?;
    Ok(h * 3600 + m * 60 + s)
}

fn parse_rcode(id: &str, s: &str) -> Result<ResponseCode, ConfigError> {
    match s.to_ascii_uppercase().as_str() {
        "NOERROR" => Ok(ResponseCode::NoError),
        "FORMERR" => Ok(ResponseCode::FormErr),
        "SERVFAIL" => Ok(ResponseCode::ServFail),
        "NXDOMAIN" => Ok(ResponseCode::NXDomain),
        "NOTIMP" => Ok(ResponseCode::NotImp),
        "REFUSED" => Ok(ResponseCode::Refused),
        other => Err(ConfigError::InvalidValue {
            id: id.to_string(),
            field: "rcode".into(),
            reason: format!("unknown rcode '{other}'"),
        }),
    }
}

pub fn build_blocklist(id: &str, spec: &BlocklistSpec) -> Result<Arc<dyn Database>, ConfigError> {
    let db: Arc<dyn Database> = match spec {
        BlocklistSpec::DomainTree { path } => {
            let mut tree = DomainTree::new(id);
            for (n, pattern) in read_lines(id, path)?.iter().enumerate() {
                tree.insert(pattern, format!("line {}", n + 1));
            }
            Arc::new(tree)
        }
        BlocklistSpec::Cidr { path } => {
            let mut set = CidrSet::new(id);
            for (n, line) in read_lines(id, path)?.iter().enumerate() {
                let net: IpNetwork = line.parse().map_err(|_| ConfigError::InvalidValue {
                    id: id.to_string(),
                    field: "path".into(),
                    reason: format!("invalid CIDR on line {}: '{line}'", n + 1),
                })?;
                set.insert(net, format!("line {}", n + 1));
            }
            Arc::new(set)
        }
        BlocklistSpec::Hosts { path } => {
            let mut hosts = HostsFile::new(id);
            for line in read_lines(id, path)? {
                if let Some((addr, name)) = line.split_once(char::is_whitespace) {
                    if let Ok(ip) = addr.trim().parse::<IpAddr>() {
                        hosts.insert(name.trim().to_string(), ip);
                    }
                }
            }
            Arc::new(hosts)
        }
        BlocklistSpec::Regex { path } => {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.clone(), source: e })?;
            RegexList::from_lines(id, &text).map(Arc::new).map_err(|e| ConfigError::InvalidValue {
                id: id.to_string(),
                field: "path".into(),
                reason: e.to_string(),
            })?
        }
        BlocklistSpec::GeoIp { path, geoname_ids } => {
            let ids: HashSet<u32> = geoname_ids.iter().copied().collect();
            Arc::new(GeoIp::open(id, path, ids).map_err(|e| ConfigError::InvalidValue {
                id: id.to_string(),
                field: "path".into(),
                reason: e.to_string(),
            })?)
        }
    };
    Ok(db)
}

fn read_lines(id: &str, path: &str) -> Result<Vec<String>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.clone(), source: e })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            let _ = id;
            l.to_string()
        })
        .collect())
}
