//! Certificate loading and the rustls/quinn server configurations the
//! DoT and DoQ listeners consume. The handshakes themselves belong to
//! those libraries; this module only feeds them material.

use crate::config::ConfigFile;
use crate::error::TriDnsError;
use crate::DOQ_ALPN;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TriDnsError> {
    let mut reader = BufReader::new(
        File::open(path)
            .map_err(|error| TriDnsError::Tls(format!("failed to open {path:?}: {error}")))?,
    );
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| TriDnsError::Tls(format!("failed to read certs from {path:?}: {error}")))?;
    if certs.is_empty() {
        return Err(TriDnsError::Tls(format!("no certificates in {path:?}")));
    }
    Ok(certs)
}

pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TriDnsError> {
    let mut reader = BufReader::new(
        File::open(path)
            .map_err(|error| TriDnsError::Tls(format!("failed to open {path:?}: {error}")))?,
    );
    rustls_pemfile::private_key(&mut reader)
        .map_err(|error| TriDnsError::Tls(format!("failed to read key from {path:?}: {error}")))?
        .ok_or_else(|| TriDnsError::Tls(format!("no private key in {path:?}")))
}

fn base_server_config(config: &ConfigFile) -> Result<rustls::ServerConfig, TriDnsError> {
    let (cert_file, key_file) = config.tls_material()?;
    let certs = load_certs(&cert_file)?;
    let key = load_key(&key_file)?;
    rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|error| TriDnsError::Tls(format!("failed to build TLS config: {error}")))
}

/// The TLS config for the DoT listener.
pub fn dot_server_config(config: &ConfigFile) -> Result<Arc<rustls::ServerConfig>, TriDnsError> {
    Ok(Arc::new(base_server_config(config)?))
}

/// The QUIC server config for the DoQ listener; advertises the `doq`
/// ALPN.
pub fn doq_server_config(config: &ConfigFile) -> Result<quinn::ServerConfig, TriDnsError> {
    let mut tls = base_server_config(config)?;
    tls.alpn_protocols = vec![DOQ_ALPN.to_vec()];
    let crypto = quinn::crypto::rustls::QuicServerConfig::try_from(tls)
        .map_err(|error| TriDnsError::Quic(format!("failed to build QUIC crypto: {error}")))?;
    Ok(quinn::ServerConfig::with_crypto(Arc::new(crypto)))
}
