use std::net::{IpAddr, SocketAddr};

/// An upstream endpoint's connect address and the hostname used for
/// TLS SNI / HTTP `Host`, decoupled per §4.1 "Bootstrap address": when a
/// bootstrap IP is configured, the connect uses it directly while the
/// configured hostname still drives SNI/Host, avoiding a circular
/// dependency on the system resolver to look up the upstream's own name.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub hostname: String,
    pub port: u16,
    pub bootstrap_ip: Option<IpAddr>,
}

impl Endpoint {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            bootstrap_ip: None,
        }
    }

    pub fn with_bootstrap_ip(mut self, ip: IpAddr) -> Self {
        self.bootstrap_ip = Some(ip);
        self
    }

    /// The address to actually connect/dial. Falls back to resolving
    /// `hostname` as a literal IP (a plain `host:port` upstream, the common
    /// case); a non-literal hostname with no bootstrap IP is a
    /// configuration error caught at load time by `routedns-config`.
    pub fn connect_addr(&self) -> Option<SocketAddr> {
        if let Some(ip) = self.bootstrap_ip {
            return Some(SocketAddr::new(ip, self.port));
        }
        self.hostname.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, self.port))
    }

    /// The name to present for SNI / HTTP Host, always the configured
    /// hostname regardless of which address is actually dialled.
    pub fn server_name(&self) -> &str {
        &self.hostname
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_ip_overrides_the_connect_address_but_not_server_name() {
        let endpoint = Endpoint::new("dns.example.com", 853).with_bootstrap_ip("10.0.0.1".parse().unwrap());
        assert_eq!(endpoint.connect_addr().unwrap().ip().to_string(), "10.0.0.1");
        assert_eq!(endpoint.server_name(), "dns.example.com");
    }

    #[test]
    fn literal_ip_hostname_needs_no_bootstrap() {
        let endpoint = Endpoint::new("9.9.9.9", 853);
        assert_eq!(endpoint.connect_addr().unwrap().ip().to_string(), "9.9.9.9");
    }
}
