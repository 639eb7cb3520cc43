use std::net::IpAddr;

/// Per-query metadata attached by the listener (§3 "Client Info").
///
/// Cheap to clone: routers and groups pass it down by reference or clone it
/// into spawned tasks (e.g. the "fastest" group's parallel dispatch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub source_ip: IpAddr,
    pub listener_id: String,
    pub tls_server_name: Option<String>,
    pub doh_path: Option<String>,
}

impl ClientInfo {
    pub fn new(source_ip: IpAddr, listener_id: impl Into<String>) -> Self {
        Self {
            source_ip,
            listener_id: listener_id.into(),
            tls_server_name: None,
            doh_path: None,
        }
    }

    pub fn with_tls_server_name(mut self, name: impl Into<String>) -> Self {
        self.tls_server_name = Some(name.into());
        self
    }

    pub fn with_doh_path(mut self, path: impl Into<String>) -> Self {
        self.doh_path = Some(path.into());
        self
    }
}
