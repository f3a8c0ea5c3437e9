//! Password encryption for the encrypted login handshake.
//!
//! During an encrypted login the server sends an RSA public key in PEM
//! form together with a nonce. Every secret the client sends back is
//! encrypted with RSA-OAEP (SHA-1) over `nonce || secret`.

use rand::RngCore;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPublicKey};
use sha1::Sha1;

use crate::error::AuthError;

/// Asymmetric type announced by the server for RSA-OAEP.
pub const ASYMMETRIC_RSA_OAEP: i32 = 1;

/// Encrypts login secrets with the key and nonce sent by the server.
#[derive(Clone)]
pub struct PasswordEncryptor {
    key: RsaPublicKey,
    nonce: Vec<u8>,
}

impl PasswordEncryptor {
    /// Create an encryptor from the server's asymmetric type, PEM public
    /// key and nonce.
    ///
    /// The key may be PKCS#1 (`RSA PUBLIC KEY`) or SubjectPublicKeyInfo
    /// (`PUBLIC KEY`). Trailing NUL bytes are ignored.
    pub fn new(asymmetric_type: i32, public_key: &[u8], nonce: &[u8]) -> Result<Self, AuthError> {
        if asymmetric_type != ASYMMETRIC_RSA_OAEP {
            return Err(AuthError::UnsupportedAsymmetricType(asymmetric_type));
        }

        let key = parse_public_key(public_key)?;
        tracing::debug!(
            key_bits = key.size() * 8,
            nonce_len = nonce.len(),
            "parsed server public key"
        );

        Ok(Self {
            key,
            nonce: nonce.to_vec(),
        })
    }

    /// Encrypt `secret` as `RSA-OAEP(nonce || secret)`.
    pub fn encrypt(&self, secret: &[u8]) -> Result<Vec<u8>, AuthError> {
        let mut message = Vec::with_capacity(self.nonce.len() + secret.len());
        message.extend_from_slice(&self.nonce);
        message.extend_from_slice(secret);

        let mut rng = rand::thread_rng();
        self.key
            .encrypt(&mut rng, Oaep::new::<Sha1>(), &message)
            .map_err(|e| AuthError::Encryption(e.to_string()))
    }
}

impl std::fmt::Debug for PasswordEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordEncryptor")
            .field("nonce_len", &self.nonce.len())
            .finish_non_exhaustive()
    }
}

fn parse_public_key(pem: &[u8]) -> Result<RsaPublicKey, AuthError> {
    let end = pem.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let pem = std::str::from_utf8(&pem[..end])
        .map_err(|e| AuthError::InvalidPublicKey(e.to_string()))?
        .trim();

    RsaPublicKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
        .map_err(|e| AuthError::InvalidPublicKey(e.to_string()))
}

/// Symmetric cipher whose key the client sends at the end of an encrypted
/// login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SymmetricCipher {
    /// AES-256 in CBC mode.
    #[default]
    Aes256Cbc,
}

impl SymmetricCipher {
    /// Key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes256Cbc => 32,
        }
    }

    /// Generate a random key for this cipher.
    #[must_use]
    pub fn generate_key(self) -> Vec<u8> {
        let mut key = vec![0u8; self.key_len()];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }
}
