// ============================================
// File: crates/aries-server/src/tls.rs
// ============================================
//! # TLS Certificate Provider
//!
//! ## Creation Reason
//! The secure listener needs a certificate the server does not own. The
//! provider hides where it comes from; the bundled one reads PEM files.
//!
//! ## Main Functionality
//! - `CertificateProvider`: yields a ready `rustls::ServerConfig`
//! - `PemCertificateProvider`: PEM chain + PKCS#8 / PKCS#1 / SEC1 key
//!
//! ## ⚠️ Important Note for Next Developer
//! - Files are read when the server starts, not when it is built. A bad
//!   certificate is a bootstrap failure, not a configuration error
//! - The ring crypto provider is selected explicitly so the process-wide
//!   default provider is never needed
//!
//! ## Last Modified
//! v0.1.0 - Initial PEM certificate provider

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::info;

use crate::error::{Result, ServerError};

/// Source of the secure listener's TLS configuration.
#[async_trait]
pub trait CertificateProvider: Send + Sync + 'static {
    /// Builds the server-side TLS configuration.
    ///
    /// # Errors
    /// `Certificate` if the credentials cannot be loaded.
    async fn server_config(&self) -> Result<Arc<rustls::ServerConfig>>;
}

/// Loads a certificate chain and private key from PEM files.
#[derive(Debug, Clone)]
pub struct PemCertificateProvider {
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl PemCertificateProvider {
    #[must_use]
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    async fn read(path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| ServerError::certificate(path.display().to_string(), e.to_string()))
    }

    fn parse_certs(path: &Path, pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
        let certs = rustls_pemfile::certs(&mut &pem[..])
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| ServerError::certificate(path.display().to_string(), e.to_string()))?;
        if certs.is_empty() {
            return Err(ServerError::certificate(
                path.display().to_string(),
                "no certificates found",
            ));
        }
        Ok(certs)
    }

    fn parse_key(path: &Path, pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
        rustls_pemfile::private_key(&mut &pem[..])
            .map_err(|e| ServerError::certificate(path.display().to_string(), e.to_string()))?
            .ok_or_else(|| ServerError::certificate(path.display().to_string(), "no private key found"))
    }
}

#[async_trait]
impl CertificateProvider for PemCertificateProvider {
    async fn server_config(&self) -> Result<Arc<rustls::ServerConfig>> {
        let cert_pem = Self::read(&self.cert_path).await?;
        let key_pem = Self::read(&self.key_path).await?;

        let certs = Self::parse_certs(&self.cert_path, &cert_pem)?;
        let key = Self::parse_key(&self.key_path, &key_pem)?;
        let chain_len = certs.len();

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ServerError::certificate(self.cert_path.display().to_string(), e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| ServerError::certificate(self.cert_path.display().to_string(), e.to_string()))?;

        info!(cert = %self.cert_path.display(), chain_len, "TLS certificate loaded");
        Ok(Arc::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_pair(dir: &Path) -> (PathBuf, PathBuf) {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        std::fs::write(&cert_path, cert.cert.pem()).unwrap();
        std::fs::write(&key_path, cert.key_pair.serialize_pem()).unwrap();
        (cert_path, key_path)
    }

    #[tokio::test]
    async fn test_loads_self_signed_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (cert_path, key_path) = write_pair(dir.path());

        let config = PemCertificateProvider::new(cert_path, key_path)
            .server_config()
            .await
            .unwrap();
        assert!(config.alpn_protocols.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = PemCertificateProvider::new(dir.path().join("nope.pem"), dir.path().join("nope.key"));

        let err = provider.server_config().await.unwrap_err();
        assert!(matches!(err, ServerError::Certificate { .. }));
        assert!(err.is_bootstrap_error());
    }

    #[tokio::test]
    async fn test_key_file_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let (cert_path, _key_path) = write_pair(dir.path());

        // A certificate is not a key.
        let err = PemCertificateProvider::new(&cert_path, &cert_path)
            .server_config()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no private key found"));
    }
}
