//! Upstream client substrates (§4.1): a pipelined writer/reader task pair
//! shared by TCP, DoT and DTLS, plus the degenerate UDP exchange and the
//! stream-per-query QUIC-based protocols (DoQ, DoH3).

pub mod bootstrap;
pub mod doh;
pub mod doh3;
pub mod doq;
pub mod dtls;
pub mod error;
pub mod framed;
pub mod pending;
pub mod pipelined;
pub mod resolver;
pub mod tcp;
pub mod tls;
pub mod udp;

pub use bootstrap::Endpoint;
pub use doh::{DohClient, DohMethod};
pub use doh3::Doh3Client;
pub use doq::DoqClient;
pub use dtls::DtlsDialer;
pub use error::UpstreamError;
pub use pipelined::{PipelineConfig, PipelinedClient, StreamDialer};
pub use resolver::{Doh3Resolver, DohResolver, DoqResolver, StreamResolver, UdpResolver};
pub use tcp::TcpDialer;
pub use tls::TlsDialer;
pub use udp::UdpClient;
