//! Authentication error types.

use thiserror::Error;

/// Errors that can occur while encrypting login secrets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The public key sent by the server could not be parsed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The server asked for an asymmetric algorithm other than RSA-OAEP.
    #[error("unhandled asymmetric encryption type {0}")]
    UnsupportedAsymmetricType(i32),

    /// RSA encryption failed, usually because the secret is too long for
    /// the key.
    #[error("encryption failed: {0}")]
    Encryption(String),
}
