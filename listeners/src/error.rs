use thiserror::Error;

/// Listener-side transport errors. Kept separate from `routedns_core::ResolveError`:
/// these describe framing/socket failures the caller handles by closing a
/// connection, not by answering a query.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode response: {0}")]
    Encode(routedns_core::ResolveError),

    #[error("received an undecodable frame")]
    Decode,

    #[error("message of {0} bytes exceeds the 2-byte length prefix")]
    MessageTooLarge(usize),

    #[error("tls error: {0}")]
    Tls(String),
}
