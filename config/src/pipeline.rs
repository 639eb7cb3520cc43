use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use ip_network::IpNetwork;
use routedns_cache::CacheResolver;
use routedns_listeners::{Acl, DohListener, DoqListener, TcpListener, TlsListener, UdpListener};

use crate::error::ConfigError;
use crate::graph::Builder;
use crate::model::{Document, ListenerSpec};
use crate::tls_material;

/// Every concrete listener a configuration produced, ready to be run.
///
/// DoH is served with `axum_server` since [`DohListener`] only builds the
/// `axum::Router`; every other kind owns its own accept loop.
pub struct Pipeline {
    pub udp: Vec<UdpListener>,
    pub tcp: Vec<TcpListener>,
    pub tls: Vec<TlsListener>,
    pub doq: Vec<DoqListener>,
    pub doh: Vec<DohServable>,
    /// Every `cache` resolver declared, by id, for shutdown/startup
    /// persistence (§6 "Persisted state layout"). The binary decides
    /// whether and where to actually read/write snapshot files.
    pub caches: HashMap<String, Arc<CacheResolver>>,
}

pub struct DohServable {
    pub addr: SocketAddr,
    pub server_config: rustls::ServerConfig,
    pub router: axum::Router,
}

/// Builds every resolver, group and router referenced by at least one
/// listener, then binds each listener (§6 "a configuration describes a
/// complete, runnable pipeline").
///
/// DTLS listeners are parsed but not started: wiring a certificate into
/// `webrtc_dtls::config::Config` has no grounding anywhere in the example
/// pack, so rather than guess at its shape this is left a named gap (logged
/// at load time) instead of a fabricated implementation.
pub async fn build_pipeline(doc: &Document) -> Result<Pipeline, ConfigError> {
    let mut builder = Builder::new(doc)?;
    let mut pipeline =
        Pipeline { udp: Vec::new(), tcp: Vec::new(), tls: Vec::new(), doq: Vec::new(), doh: Vec::new(), caches: HashMap::new() };

    for (id, spec) in &doc.listeners {
        match spec {
            ListenerSpec::Udp(l) => {
                let root = builder.resolve(&l.resolver)?;
                let acl = build_acl(id, &l.allow)?;
                let addr = parse_addr(id, &l.address)?;
                let listener = UdpListener::bind(id.clone(), addr, root, acl)
                    .await
                    .map_err(|e| ConfigError::ListenerBind { id: id.clone(), reason: e.to_string() })?;
                pipeline.udp.push(listener);
            }
            ListenerSpec::Tcp(l) => {
                let root = builder.resolve(&l.resolver)?;
                let acl = build_acl(id, &l.allow)?;
                let addr = parse_addr(id, &l.address)?;
                let listener = TcpListener::bind(id.clone(), addr, root, acl)
                    .await
                    .map_err(|e| ConfigError::ListenerBind { id: id.clone(), reason: e.to_string() })?;
                pipeline.tcp.push(listener);
            }
            ListenerSpec::Tls(l) => {
                let root = builder.resolve(&l.resolver)?;
                let acl = build_acl(id, &l.allow)?;
                let addr = parse_addr(id, &l.address)?;
                let server_config = tls_material::load_server_config(&l.cert_path, &l.key_path)?;
                let listener = TlsListener::bind(id.clone(), addr, server_config, root, acl)
                    .await
                    .map_err(|e| ConfigError::ListenerBind { id: id.clone(), reason: e.to_string() })?;
                pipeline.tls.push(listener);
            }
            ListenerSpec::Doq(l) => {
                let root = builder.resolve(&l.resolver)?;
                let acl = build_acl(id, &l.allow)?;
                let addr = parse_addr(id, &l.address)?;
                let server_config = tls_material::load_quic_server_config(&l.cert_path, &l.key_path)?;
                let listener = DoqListener::bind(id.clone(), addr, server_config, root, acl)
                    .map_err(|e| ConfigError::ListenerBind { id: id.clone(), reason: e.to_string() })?;
                pipeline.doq.push(listener);
            }
            ListenerSpec::Doh(l) => {
                let root = builder.resolve(&l.resolver)?;
                let acl = build_acl(id, &l.allow)?;
                let trusted_proxies = build_acl(id, &l.trusted_proxies)?;
                let addr = parse_addr(id, &l.address)?;
                let server_config = tls_material::load_server_config(&l.cert_path, &l.key_path)?;
                let router = DohListener::new(id.clone(), l.path.clone(), root, acl, trusted_proxies).into_router();
                pipeline.doh.push(DohServable { addr, server_config, router });
            }
            ListenerSpec::Dtls(_) => {
                tracing::warn!(
                    target: "routedns::config",
                    listener = %id,
                    "DTLS listener configured but not started: certificate wiring into webrtc_dtls::config::Config is unimplemented"
                );
            }
        }
    }

    pipeline.caches = builder.into_caches();
    Ok(pipeline)
}

impl Pipeline {
    /// Runs every bound listener concurrently until one of them exits
    /// (normally that only happens on an unrecoverable accept-loop error).
    pub async fn run(self) -> Result<(), ConfigError> {
        let mut tasks: Vec<tokio::task::JoinHandle<Result<(), String>>> = Vec::new();

        for listener in self.udp {
            tasks.push(tokio::spawn(async move { listener.run().await.map_err(|e| e.to_string()) }));
        }
        for listener in self.tcp {
            tasks.push(tokio::spawn(async move { listener.run().await.map_err(|e| e.to_string()) }));
        }
        for listener in self.tls {
            tasks.push(tokio::spawn(async move { listener.run().await.map_err(|e| e.to_string()) }));
        }
        for listener in self.doq {
            tasks.push(tokio::spawn(async move {
                listener.run().await;
                Ok(())
            }));
        }
        for servable in self.doh {
            tasks.push(tokio::spawn(async move {
                let tls_config = axum_server::tls_rustls::RustlsConfig::from_config(Arc::new(servable.server_config));
                axum_server::bind_rustls(servable.addr, tls_config)
                    .serve(servable.router.into_make_service_with_connect_info::<SocketAddr>())
                    .await
                    .map_err(|e| e.to_string())
            }));
        }

        let outcome = futures::future::try_join_all(tasks.into_iter().map(|task| async move {
            match task.await {
                Ok(inner) => inner,
                Err(join_err) => Err(join_err.to_string()),
            }
        }))
        .await;

        outcome
            .map(|_| ())
            .map_err(|reason| ConfigError::ListenerBind { id: "<runtime>".to_string(), reason })
    }
}

fn build_acl(owner: &str, entries: &[String]) -> Result<Acl, ConfigError> {
    let mut acl = Acl::new();
    for entry in entries {
        let network: IpNetwork = entry.parse().map_err(|_| ConfigError::InvalidValue {
            id: owner.to_string(),
            field: "allow".into(),
            reason: format!("invalid CIDR '{entry}'"),
        })?;
        acl.allow(network);
    }
    Ok(acl)
}

fn parse_addr(id: &str, address: &str) -> Result<SocketAddr, ConfigError> {
    address.parse().map_err(|_| ConfigError::InvalidValue {
        id: id.to_string(),
        field: "address".into(),
        reason: format!("invalid socket address '{address}'"),
    })
}
