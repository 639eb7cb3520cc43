//! Shared types and behaviour for every component of the resolver pipeline.
//!
//! This crate has no network code of its own; it defines the vocabulary
//! (`Resolver`, `DnsMessage`, `ClientInfo`, `ResolveError`) that every other
//! crate in the workspace composes.

pub mod client_info;
pub mod ede;
pub mod error;
pub mod message;
pub mod metrics;
pub mod resolver;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client_info::ClientInfo;
pub use ede::{attach_extended_error, read_extended_error, ExtendedErrorCode};
pub use error::ResolveError;
pub use message::DnsMessage;
pub use metrics::Metrics;
pub use resolver::{Resolver, ResolverHandle};
