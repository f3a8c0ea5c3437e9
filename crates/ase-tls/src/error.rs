//! TLS-related error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during TLS operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TlsError {
    /// TLS handshake failed.
    #[error("TLS handshake with server failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),

    /// The server name is not a valid DNS name or IP address.
    #[error("invalid server name '{0}'")]
    InvalidServerName(String),

    /// The CA file could not be read.
    #[error("error reading CA file '{path}': {source}")]
    CaFile {
        /// Path of the CA file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The CA file holds no usable certificate.
    #[error("could not parse any valid CA certificate from file '{0}'")]
    NoCaCertificate(PathBuf),

    /// A CA certificate was rejected by the root store.
    #[error("invalid CA certificate: {0}")]
    InvalidCertificate(#[source] rustls::Error),
}
