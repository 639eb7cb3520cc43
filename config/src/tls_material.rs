use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::ConfigError;

fn read_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let file = std::fs::File::open(path).map_err(|e| ConfigError::Io { path: path.to_string(), source: e })?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::Io { path: path.to_string(), source: e })
}

fn read_key(path: &str) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let file = std::fs::File::open(path).map_err(|e| ConfigError::Io { path: path.to_string(), source: e })?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ConfigError::Io { path: path.to_string(), source: e })?
        .ok_or_else(|| ConfigError::InvalidValue {
            id: path.to_string(),
            field: "key_path".into(),
            reason: "no private key found in file".into(),
        })
}

/// Loads a cert chain and private key into a server-side [`rustls::ServerConfig`],
/// shared by the TLS and DTLS-adjacent (DoQ) listeners.
pub fn load_server_config(cert_path: &str, key_path: &str) -> Result<rustls::ServerConfig, ConfigError> {
    let certs = read_certs(cert_path)?;
    let key = read_key(key_path)?;
    rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ConfigError::InvalidValue { id: cert_path.to_string(), field: "cert_path".into(), reason: e.to_string() })
}

/// Builds a `quinn::ServerConfig` for the DoQ listener from the same PEM files.
pub fn load_quic_server_config(cert_path: &str, key_path: &str) -> Result<quinn::ServerConfig, ConfigError> {
    let certs = read_certs(cert_path)?;
    let key = read_key(key_path)?;
    quinn::ServerConfig::with_single_cert(certs, key)
        .map_err(|e| ConfigError::InvalidValue { id: cert_path.to_string(), field: "cert_path".into(), reason: e.to_string() })
}
