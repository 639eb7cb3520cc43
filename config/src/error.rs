use thiserror::Error;

/// Load-time configuration errors (§6 "Configuration file"). None of these
/// can occur after a listener binds — the whole pipeline is built, or the
/// process never starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: toml::de::Error },

    #[error("failed to read {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("'{referrer}' references unknown id '{target}'")]
    UnknownReference { referrer: String, target: String },

    #[error("dependency cycle detected among: {0:?}")]
    Cycle(Vec<String>),

    #[error("duplicate id '{0}' used across resolvers/groups/routers")]
    DuplicateId(String),

    #[error("invalid value for '{field}' on '{id}': {reason}")]
    InvalidValue { id: String, field: String, reason: String },

    #[error("listener '{id}' failed to bind: {reason}")]
    ListenerBind { id: String, reason: String },
}
