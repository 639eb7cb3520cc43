use routedns_core::ResolveError;
use thiserror::Error;

/// Transport-level failures, translated to `ResolveError` at the
/// `Resolver` boundary (§4.1, §7).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("i/o error: {0}")]
    Io(#[source] std::io::Error),

    #[error("failed to encode query: {0}")]
    Encode(#[source] ResolveError),

    #[error("failed to decode response")]
    Decode,

    #[error("message too large to frame ({0} bytes)")]
    MessageTooLarge(usize),

    #[error("dial failed: {0}")]
    Dial(String),

    #[error("request queue is closed")]
    QueueClosed,

    #[error("query timed out")]
    Timeout,

    #[error("response channel closed before completion")]
    Cancelled,
}

impl From<UpstreamError> for ResolveError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout => ResolveError::Timeout,
            UpstreamError::Decode => ResolveError::Malformed,
            other => ResolveError::Transport(other.to_string()),
        }
    }
}
