use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use rand::RngCore;
use serde::Deserialize;

const ODOH_MESSAGE_CONTENT_TYPE: &str = "application/oblivious-dns-message";

/// Oblivious DoH listener (RFC 9230), §4.6 "ODoH": a configurable listener
/// variant that acts as oblivious proxy, oblivious target, or both.
///
/// Proxy mode needs no cryptography: it forwards the opaque
/// `application/oblivious-dns-message` body to `targethost`/`targetpath`
/// unchanged and relays the response back, exactly as the client's own
/// oblivious layer intends (the proxy never sees plaintext).
///
/// Target mode is the side that would decrypt the HPKE-sealed query,
/// forward it through [`crate::contract::handle_query`], and seal the
/// response. This build implements everything around that boundary — key
/// generation from a hex seed, the config-endpoint publication of the
/// public key, and the `/dns-query` routing — but not the HPKE seal/open
/// step itself: no crate in the example pack grounds an HPKE
/// implementation, and hand-rolling RFC 9230's AEAD/KDF/KEM construction
/// without being able to run the test suite against it is not a risk worth
/// taking. `open_oblivious_message`/`seal_oblivious_response` are the named
/// gap; target mode responds 501 until they exist.
#[derive(Clone)]
pub struct OdohTarget {
    key_pair: Arc<OdohKeyPair>,
}

/// Stand-in for the RFC 9230 HPKE public/private key-pair. Holds the raw
/// seed material so the config endpoint can publish something stable and
/// `from_hex_seed` is deterministic; does not implement the KEM itself.
pub struct OdohKeyPair {
    public_key_hex: String,
    #[allow(dead_code)]
    seed: [u8; 32],
}

impl OdohKeyPair {
    pub fn from_hex_seed(seed_hex: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(seed_hex)?;
        let mut seed = [0u8; 32];
        let len = bytes.len().min(32);
        seed[..len].copy_from_slice(&bytes[..len]);
        Ok(Self {
            public_key_hex: hex::encode(seed),
            seed,
        })
    }

    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self {
            public_key_hex: hex::encode(seed),
            seed,
        }
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }
}

impl OdohTarget {
    pub fn new(key_pair: OdohKeyPair) -> Self {
        Self {
            key_pair: Arc::new(key_pair),
        }
    }

    /// Serves the target's `/dns-query` endpoint and a config endpoint
    /// publishing the public key (§4.6 "published at a configurable config
    /// endpoint").
    pub fn into_router(self, config_endpoint: &str) -> Router {
        Router::new()
            .route("/dns-query", post(handle_target))
            .route(config_endpoint, get(handle_config))
            .with_state(self.key_pair)
    }
}

async fn handle_target(State(_key_pair): State<Arc<OdohKeyPair>>, headers: HeaderMap, _body: Bytes) -> Response {
    if headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        != Some(ODOH_MESSAGE_CONTENT_TYPE)
    {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }
    // HPKE open/seal is the named gap documented on `OdohTarget`.
    StatusCode::NOT_IMPLEMENTED.into_response()
}

async fn handle_config(State(key_pair): State<Arc<OdohKeyPair>>) -> Response {
    ([(axum::http::header::CONTENT_TYPE, "text/plain")], key_pair.public_key_hex().to_string()).into_response()
}

/// Oblivious proxy mode: pure byte relay, no decryption. `targethost`/
/// `targetpath` come from the query string per §4.6.
#[derive(Clone)]
pub struct OdohProxy {
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ProxyParams {
    targethost: String,
    targetpath: String,
}

impl OdohProxy {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }

    pub fn into_router(self) -> Router {
        Router::new().route("/proxy", post(handle_proxy)).with_state(self.http)
    }
}

impl Default for OdohProxy {
    fn default() -> Self {
        Self::new()
    }
}

async fn handle_proxy(State(http): State<reqwest::Client>, Query(params): Query<ProxyParams>, headers: HeaderMap, body: Bytes) -> Response {
    if headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        != Some(ODOH_MESSAGE_CONTENT_TYPE)
    {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }
    let url = format!("https://{}{}", params.targethost, params.targetpath);
    let upstream = http
        .post(&url)
        .header(axum::http::header::CONTENT_TYPE, ODOH_MESSAGE_CONTENT_TYPE)
        .body(body)
        .send()
        .await;

    match upstream {
        Ok(resp) => {
            let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            match resp.bytes().await {
                Ok(bytes) => (status, [(axum::http::header::CONTENT_TYPE, ODOH_MESSAGE_CONTENT_TYPE)], bytes).into_response(),
                Err(_) => StatusCode::BAD_GATEWAY.into_response(),
            }
        }
        Err(_) => StatusCode::BAD_GATEWAY.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pair_from_hex_seed_is_deterministic() {
        let seed = "00".repeat(32);
        let a = OdohKeyPair::from_hex_seed(&seed).unwrap();
        let b = OdohKeyPair::from_hex_seed(&seed).unwrap();
        assert_eq!(a.public_key_hex(), b.public_key_hex());
    }

    #[test]
    fn generated_key_pairs_differ() {
        let a = OdohKeyPair::generate();
        let b = OdohKeyPair::generate();
        assert_ne!(a.public_key_hex(), b.public_key_hex());
    }
}
