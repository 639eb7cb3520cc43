use thiserror::Error;

/// The §7 error kinds, shared by every component in the pipeline.
///
/// A "filter match" (NXDOMAIN, spoof, diversion) is deliberately *not* a
/// variant here: per §7 it is a successful response, not an error.
#[derive(Debug, Error, Clone)]
pub enum ResolveError {
    #[error("malformed query")]
    Malformed,

    #[error("policy denied source")]
    PolicyDenied,

    #[error("upstream query timed out")]
    Timeout,

    #[error("upstream transport failure: {0}")]
    Transport(String),

    #[error("upstream response question did not match query")]
    QuestionMismatch,

    #[error("no route matched and no default route is configured")]
    NoRoute,

    #[error("resolver {resolver} failed: {source}")]
    Upstream {
        resolver: String,
        #[source]
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    pub fn upstream(resolver: impl Into<String>, source: ResolveError) -> Self {
        ResolveError::Upstream {
            resolver: resolver.into(),
            source: Box::new(source),
        }
    }

    /// Whether this failure should be treated the same as a `SERVFAIL` by a
    /// fail-rotate/fail-back group (§4.4): timeouts and transport errors are
    /// retryable, malformed/policy/mismatch are not resolver-health signals.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResolveError::Timeout | ResolveError::Transport(_) | ResolveError::QuestionMismatch
        ) || matches!(self, ResolveError::Upstream { source, .. } if source.is_transient())
    }
}
