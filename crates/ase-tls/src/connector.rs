//! TLS connector for establishing encrypted connections.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector as TokioTlsConnector;
use tokio_rustls::client::TlsStream;

use crate::config::TlsConfig;
use crate::error::TlsError;

/// Accepts any server certificate. Used when validation is skipped.
#[derive(Debug)]
struct SkipServerVerification;

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Read every PEM certificate in `path`.
///
/// Fails when the file holds no certificate at all.
pub fn load_ca_file(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let ca_error = |source| TlsError::CaFile {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(ca_error)?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ca_error)?;

    if certs.is_empty() {
        return Err(TlsError::NoCaCertificate(path.to_path_buf()));
    }
    Ok(certs)
}

/// TLS connector for ASE connections.
pub struct TlsConnector {
    config: TlsConfig,
    inner: TokioTlsConnector,
}

impl TlsConnector {
    /// Create a TLS connector with the given configuration.
    ///
    /// Reads the CA file, if one is configured.
    pub fn new(config: TlsConfig) -> Result<Self, TlsError> {
        let client_config = Self::build_client_config(&config)?;
        let inner = TokioTlsConnector::from(Arc::new(client_config));
        Ok(Self { config, inner })
    }

    fn build_client_config(config: &TlsConfig) -> Result<ClientConfig, TlsError> {
        if config.skip_validation {
            tracing::warn!(
                "TLS certificate validation is disabled, \
                 connections are vulnerable to man-in-the-middle attacks"
            );

            return Ok(ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
                .with_no_client_auth());
        }

        let mut root_store = RootCertStore::empty();
        match &config.ca_file {
            Some(path) => {
                for cert in load_ca_file(path)? {
                    root_store
                        .add(cert)
                        .map_err(TlsError::InvalidCertificate)?;
                }
            }
            None => root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
        }

        Ok(ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth())
    }

    /// Perform the TLS handshake over `stream`.
    ///
    /// The certificate is verified against the configured hostname, or
    /// `host` if none is configured.
    pub async fn connect<S>(&self, stream: S, host: &str) -> Result<TlsStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let server_name = self.config.server_name(host);
        let dns_name = ServerName::try_from(server_name.to_string())
            .map_err(|_| TlsError::InvalidServerName(server_name.to_string()))?;

        tracing::debug!(server_name, "performing TLS handshake");

        let tls_stream = self
            .inner
            .connect(dns_name, stream)
            .await
            .map_err(TlsError::HandshakeFailed)?;

        tracing::debug!("TLS handshake completed");
        Ok(tls_stream)
    }

    /// Get the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TlsConfig {
        &self.config
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn setup_crypto_provider() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    #[test]
    fn test_default_config() {
        setup_crypto_provider();
        assert!(TlsConnector::new(TlsConfig::new().enable(true)).is_ok());
    }

    #[test]
    fn test_skip_validation() {
        setup_crypto_provider();
        let connector = TlsConnector::new(TlsConfig::new().skip_validation(true)).unwrap();
        assert!(connector.config().skip_validation);
    }

    #[test]
    fn test_missing_ca_file() {
        setup_crypto_provider();
        let config = TlsConfig::new().with_ca_file("/nonexistent/ase-ca.pem");
        assert!(matches!(
            TlsConnector::new(config),
            Err(TlsError::CaFile { .. })
        ));
    }

    #[test]
    fn test_ca_file_without_certificates() {
        let path = std::env::temp_dir().join(format!("ase-tls-empty-{}.pem", std::process::id()));
        std::fs::write(&path, "no certificates in here\n").unwrap();

        let result = load_ca_file(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(TlsError::NoCaCertificate(_))));
    }
}
