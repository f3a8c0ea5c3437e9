//! # ase-auth
//!
//! Credentials and password encryption for SAP ASE logins.
//!
//! ASE supports plain logins, where the password travels inside the login
//! record, and encrypted logins. In the encrypted flow the server answers
//! the login record with an RSA public key and a nonce; the client then
//! sends the login password, the remote server passwords and a fresh
//! symmetric key, each encrypted with [`PasswordEncryptor`].
//!
//! ```rust,ignore
//! use ase_auth::{PasswordEncryptor, SymmetricCipher};
//!
//! let encryptor = PasswordEncryptor::new(asymmetric_type, &public_key, &nonce)?;
//! let password = encryptor.encrypt(b"secret")?;
//! let key = encryptor.encrypt(&SymmetricCipher::Aes256Cbc.generate_key())?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod credentials;
pub mod encryption;
pub mod error;

pub use credentials::{Credentials, RemoteServer};
pub use encryption::{ASYMMETRIC_RSA_OAEP, PasswordEncryptor, SymmetricCipher};
pub use error::AuthError;
