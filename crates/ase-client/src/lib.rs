//! # ase-client
//!
//! Async client core for SAP ASE servers speaking TDS 5.0.
//!
//! This crate ties the lower layers together into a usable session:
//!
//! - [`Connection`] owns the transport and a reader task that routes
//!   incoming packets to channels.
//! - [`Channel`] multiplexes independent package streams over one
//!   connection, with setup and teardown handshakes for every channel but
//!   channel 0.
//! - [`Channel::login`] runs the login negotiation, including RSA
//!   encryption of the login and remote server passwords.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ase_client::{Config, Connection, Credentials, LoginConfig};
//! use ase_protocol::{Package, package::LanguagePackage};
//!
//! let config = Config::new()
//!     .host("ase.example.com")
//!     .credentials(Credentials::new("sa", "secret"));
//! let login = LoginConfig::new(&config);
//!
//! let conn = Connection::connect(config).await?;
//! let channel = conn.primary_channel().await?;
//! channel.login(&login).await?;
//!
//! channel
//!     .send_package(&Package::Language(LanguagePackage::new("select 1")))
//!     .await?;
//! let done = channel
//!     .next_package_until(true, |package| Ok(package.is_done_final()))
//!     .await?;
//!
//! conn.close().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
mod login;

pub use ase_auth::{Credentials, RemoteServer, SymmetricCipher};
pub use channel::{Channel, EedHook, EnvChangeHook};
pub use config::{Config, LoginConfig, Network};
pub use connection::{Connection, Transport};
pub use error::{EedError, Error, Result};
