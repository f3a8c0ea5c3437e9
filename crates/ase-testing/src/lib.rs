//! # ase-testing
//!
//! Test infrastructure for the ASE TDS client.
//!
//! - [`mock_server`]: a TCP server that plays a fixed script of messages
//!   and records what the client sent.
//! - [`fixtures`]: server-side packages for login and session scenarios,
//!   including an RSA key pair for encrypted logins.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ase_testing::fixtures::{ServerKey, login_success};
//! use ase_testing::mock_server::{MockServer, Script};
//!
//! let key = ServerKey::generate()?;
//! let server = MockServer::start(
//!     Script::new()
//!         .receive()
//!         .send(0, key.negotiation()?)
//!         .receive()
//!         .send(0, login_success(CapabilityPackage::client_default())),
//! )
//! .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_server;

pub use fixtures::ServerKey;
pub use mock_server::{MockServer, MockServerError, ReceivedMessage, Script, Step};
