use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use routedns_core::ResolverHandle;
use serde::Deserialize;

use crate::acl::Acl;
use crate::contract::{self, Outcome};

const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// DNS-over-HTTPS listener (RFC 8484), GET and POST on a single path, served
/// over HTTP/1.1 or HTTP/2 by `axum`/`axum-server` (the teacher's own HTTP
/// stack).
#[derive(Clone)]
pub struct DohListener {
    state: AppState,
    path: String,
}

#[derive(Clone)]
struct AppState {
    root: ResolverHandle,
    acl: Arc<Acl>,
    listener_id: Arc<str>,
    trusted_proxies: Arc<Acl>,
}

#[derive(Deserialize)]
struct GetParams {
    dns: String,
}

impl DohListener {
    pub fn new(id: impl Into<String>, path: impl Into<String>, root: ResolverHandle, acl: Acl, trusted_proxies: Acl) -> Self {
        Self {
            state: AppState {
                root,
                acl: Arc::new(acl),
                listener_id: Arc::from(id.into()),
                trusted_proxies: Arc::new(trusted_proxies),
            },
            path: path.into(),
        }
    }

    /// Builds the `axum::Router`. Callers serve it with `axum_server` (TLS)
    /// or `axum::serve` (plaintext, e.g. behind a reverse proxy).
    pub fn into_router(self) -> Router {
        Router::new()
            .route(&self.path, get(handle_get).post(handle_post))
            .with_state(self.state)
    }
}

async fn handle_get(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<GetParams>,
) -> Response {
    let wire = match URL_SAFE_NO_PAD.decode(params.dns.as_bytes()) {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    respond(&state, peer, &headers, &wire).await
}

async fn handle_post(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    respond(&state, peer, &headers, &body).await
}

async fn respond(state: &AppState, peer: SocketAddr, headers: &HeaderMap, wire: &[u8]) -> Response {
    let source_ip = resolve_client_ip(state, peer, headers);
    let client = contract::client_info_for(source_ip, state.listener_id.to_string());

    match contract::handle_query(&state.root, &state.acl, wire, client).await {
        Outcome::Respond(response) => match response.to_wire() {
            Ok(bytes) => ([(axum::http::header::CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)], bytes).into_response(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        },
        Outcome::Drop => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Honors `X-Forwarded-For` only when the immediate peer is a configured
/// trusted proxy; the last non-loopback entry is taken as the real client.
/// An invalid or absent header falls back to the immediate peer.
fn resolve_client_ip(state: &AppState, peer: SocketAddr, headers: &HeaderMap) -> IpAddr {
    if !state.trusted_proxies.permits(peer.ip()) {
        return peer.ip();
    }
    let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) else {
        return peer.ip();
    };
    value
        .split(',')
        .map(str::trim)
        .filter_map(|s| s.parse::<IpAddr>().ok())
        .filter(|ip| !ip.is_loopback())
        .next_back()
        .unwrap_or_else(|| {
            tracing::debug!(target: "routedns::listener", "invalid X-Forwarded-For, using peer address");
            peer.ip()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::RecordType;
    use routedns_core::testing::StubResolver;

    #[test]
    fn trusted_proxy_xff_picks_last_non_loopback() {
        let mut trusted = Acl::new();
        trusted.allow(ip_network::IpNetwork::V4("10.0.0.0/8".parse().unwrap()));
        let state = AppState {
            root: StubResolver::new("stub", routedns_core::testing::fixed_query("example.com.", RecordType::A)),
            acl: Arc::new(Acl::new()),
            listener_id: Arc::from("doh-test"),
            trusted_proxies: Arc::new(trusted),
        };
        let peer: SocketAddr = "10.0.0.1:5353".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 127.0.0.1".parse().unwrap());
        assert_eq!(resolve_client_ip(&state, peer, &headers), "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn untrusted_peer_xff_is_ignored() {
        let mut trusted = Acl::new();
        trusted.allow(ip_network::IpNetwork::V4("10.0.0.0/8".parse().unwrap()));
        let state = AppState {
            root: StubResolver::new("stub", routedns_core::testing::fixed_query("example.com.", RecordType::A)),
            acl: Arc::new(Acl::new()),
            listener_id: Arc::from("doh-test"),
            trusted_proxies: Arc::new(trusted),
        };
        let peer: SocketAddr = "8.8.8.8:5353".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        assert_eq!(resolve_client_ip(&state, peer, &headers), peer.ip());
    }
}
