//! Wire-transport listeners (§4.6, §6): UDP, TCP, DoT, DoH, DoH3, DoQ, DTLS,
//! and ODoH, each decoding/encoding its own transport framing and then
//! delegating to the shared [`contract::handle_query`] pipeline.

pub mod acl;
pub mod contract;
pub mod doh;
pub mod doq;
pub mod dtls;
pub mod error;
pub mod framing;
pub mod odoh;
pub mod tcp;
pub mod tls;
pub mod udp;

pub use acl::Acl;
pub use contract::{apply_padding_if_requested, client_info_for, handle_query, truncate_for_udp, Outcome, DEFAULT_UDP_PAYLOAD_SIZE};
pub use doh::DohListener;
pub use doq::DoqListener;
pub use dtls::DtlsListener;
pub use error::ListenerError;
pub use odoh::{OdohKeyPair, OdohProxy, OdohTarget};
pub use tcp::TcpListener;
pub use tls::TlsListener;
pub use udp::UdpListener;
