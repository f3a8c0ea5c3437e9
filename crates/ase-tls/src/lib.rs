//! # ase-tls
//!
//! TLS transport for SAP ASE connections.
//!
//! ASE wraps the whole TCP stream in TLS before any TDS traffic. TLS is
//! used when enabled explicitly or when connecting to port 443.
//!
//! ## Security
//!
//! By default server certificates are validated against the Mozilla root
//! store, or against the certificates of a configured CA file. Disabling
//! validation logs a warning and should only be used for development.
//!
//! ```rust,ignore
//! use ase_tls::{TlsConfig, TlsConnector};
//!
//! let config = TlsConfig::new()
//!     .enable(true)
//!     .with_ca_file("/etc/ase/ca.pem")
//!     .with_hostname("CN=ase.example.com");
//! let connector = TlsConnector::new(config)?;
//! let stream = connector.connect(tcp_stream, "10.0.0.1").await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connector;
pub mod error;

pub use config::{IMPLICIT_TLS_PORT, TlsConfig};
pub use connector::{TlsConnector, load_ca_file};
pub use error::TlsError;

// Re-export tokio-rustls stream type for convenience
pub use tokio_rustls::client::TlsStream;
