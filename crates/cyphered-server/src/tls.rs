//! TLS configuration from PEM files
use crate::server::FileServerError;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tracing::info;

/// Load TLS certificates from a PEM file
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, FileServerError> {
    let file = File::open(path)
        .map_err(|e| FileServerError::TlsError(format!("Failed to open cert file: {}", e)))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FileServerError::TlsError(format!("Failed to parse certs: {}", e)))?;

    if certs.is_empty() {
        return Err(FileServerError::TlsError(format!(
            "No certificate found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// Load private key from a PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, FileServerError> {
    let file = File::open(path)
        .map_err(|e| FileServerError::TlsError(format!("Failed to open key file: {}", e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| FileServerError::TlsError(format!("Failed to parse key: {}", e)))?
        .ok_or_else(|| FileServerError::TlsError("No private key found".to_string()))
}

/// Build an acceptor for a certificate/key pair, offering h2 and http/1.1
pub fn tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, FileServerError> {
    info!("Loading TLS certificate from: {}", cert_path.display());
    let certs = load_certs(cert_path)?;

    info!("Loading TLS private key from: {}", key_path.display());
    let key = load_private_key(key_path)?;

    let mut tls_config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| FileServerError::TlsError(format!("Invalid TLS versions: {}", e)))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| FileServerError::TlsError(format!("Invalid cert/key: {}", e)))?;
    tls_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}
