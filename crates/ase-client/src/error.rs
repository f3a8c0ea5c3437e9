//! Client error types.

use std::fmt;
use std::sync::Arc;

use ase_protocol::Package;
use ase_protocol::package::{CapabilityType, EedPackage, MsgId};
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] ase_tls::TlsError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] ase_codec::CodecError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ase_protocol::ProtocolError),

    /// Password encryption failed.
    #[error("authentication failed: {0}")]
    Authentication(#[from] ase_auth::AuthError),

    /// The server reported errors.
    #[error(transparent)]
    Server(#[from] EedError),

    /// A package received on a channel could not be handled.
    #[error("error in channel {channel}: {source}")]
    Channel {
        /// Channel the package arrived on.
        channel: u16,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },

    /// The connection reported an error to all of its channels.
    #[error("error in connection: {0}")]
    Connection(Arc<Error>),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The login sequence failed.
    #[error("login failed: {0}")]
    Login(String),

    /// A login step received a package it did not expect.
    #[error("{step}: expected {expected}, received {received}")]
    UnexpectedPackage {
        /// Step of the sequence.
        step: &'static str,
        /// Expected package.
        expected: &'static str,
        /// Rendering of the received package.
        received: String,
    },

    /// The requested or offered password encryption is not supported.
    #[error("unsupported login encryption {0}, at least SEC_ENCRYPT4 is required")]
    UnsupportedEncryption(MsgId),

    /// The server rejected every capability of a requested category.
    #[error("server did not understand capability requests for {0}")]
    CapabilityRejected(CapabilityType),

    /// The channel was used after it was closed.
    #[error("channel {channel} is closed")]
    ChannelClosed {
        /// Channel ID.
        channel: u16,
    },

    /// A non-blocking receive found no package.
    #[error("no package ready")]
    NoPackageReady,

    /// Every channel ID is in use.
    #[error("exhausted all channel IDs")]
    ChannelIdsExhausted,

    /// A packet arrived for a channel that is not registered.
    #[error("received packet for unknown channel {0}")]
    UnknownChannel(u16),

    /// A package was still queued when its channel was closed.
    #[error("package still queued: {0}")]
    PackageStillQueued(Box<Package>),

    /// An error was still queued when its channel was closed.
    #[error("error still queued: {0}")]
    ErrorStillQueued(Box<Error>),

    /// A message ended in the middle of a package.
    #[error("message ended in the middle of a package")]
    TruncatedMessage,

    /// The server announced a packet size that is not a number.
    #[error("invalid packet size {0:?}")]
    InvalidPacketSize(String),

    /// A wait gave up.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// A wait was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A package processing callback failed.
    #[error("error in processing function: {0}")]
    Processing(Box<Error>),

    /// End of the current result set or message.
    ///
    /// Returned by [`Channel::next_package_until`](crate::Channel::next_package_until)
    /// together with the package at which the processing function signalled
    /// it. Processing functions return it without a package.
    #[error("end of results")]
    Eof(Option<Box<Package>>),

    /// Several errors occurred, for example while closing.
    #[error("{}", join(.0))]
    Multiple(Vec<Error>),
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// End-of-results signal for processing functions.
    #[must_use]
    pub fn eof() -> Self {
        Self::Eof(None)
    }

    /// Whether this is the end-of-results signal.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof(_))
    }

    /// Whether the connection can no longer be used.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Io(_) | Self::Tls(_) | Self::Codec(_) | Self::ConnectionClosed => true,
            Self::Connection(inner) => inner.is_fatal(),
            _ => false,
        }
    }

    /// Whether this is a protocol error.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        match self {
            Self::Protocol(_) => true,
            Self::Channel { source, .. } => source.is_protocol_error(),
            _ => false,
        }
    }

    /// Unexpected package at a step of a fixed sequence.
    pub(crate) fn unexpected(step: &'static str, expected: &'static str, received: &Package) -> Self {
        Self::UnexpectedPackage {
            step,
            expected,
            received: received.to_string(),
        }
    }

    /// Collect errors into a single result, `Ok` when there are none.
    pub(crate) fn aggregate(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }
}

/// Extended error data received while processing a message, together
/// with the error that ended the processing.
#[derive(Debug, Default)]
pub struct EedError {
    /// Extended error data packages in arrival order.
    pub packages: Vec<EedPackage>,
    /// Error that ended the processing, if any.
    pub source: Option<Box<Error>>,
}

impl EedError {
    /// Create an EED error.
    #[must_use]
    pub fn new(packages: Vec<EedPackage>, source: Option<Error>) -> Self {
        Self {
            packages,
            source: source.map(Box::new),
        }
    }

    /// Append an extended error data package.
    pub fn add(&mut self, eed: EedPackage) {
        self.packages.push(eed);
    }

    /// Whether the wrapped error is the end-of-results signal.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.source.as_deref().is_some_and(Error::is_eof)
    }
}

impl fmt::Display for EedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{source}: received EED messages: ")?,
            None => f.write_str("received EED messages: ")?,
        }
        for eed in &self.packages {
            write!(f, "{}: {}; ", eed.msg_number, eed.msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for EedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ase_protocol::package::{EedStatus, TransState};

    fn eed(number: u32, msg: &str) -> EedPackage {
        EedPackage {
            msg_number: number,
            state: 1,
            class: 16,
            sql_state: Vec::new(),
            status: EedStatus::empty(),
            tran_state: TransState::NotInTran,
            msg: msg.to_string(),
            server_name: String::new(),
            proc_name: String::new(),
            line_nr: 1,
        }
    }

    #[test]
    fn test_eed_error_display() {
        let err = EedError::new(
            vec![eed(207, "Invalid column name"), eed(102, "Incorrect syntax")],
            Some(Error::Login("rejected".into())),
        );
        assert_eq!(
            err.to_string(),
            "login failed: rejected: received EED messages: \
             207: Invalid column name; 102: Incorrect syntax; "
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_eof_detection() {
        assert!(Error::eof().is_eof());
        assert!(EedError::new(vec![], Some(Error::eof())).is_eof());
        assert!(!EedError::default().is_eof());
    }

    #[test]
    fn test_aggregate() {
        assert!(Error::aggregate(vec![]).is_ok());
        assert!(matches!(
            Error::aggregate(vec![Error::Cancelled]),
            Err(Error::Cancelled)
        ));

        let err = Error::aggregate(vec![Error::Cancelled, Error::NoPackageReady]).unwrap_err();
        assert_eq!(err.to_string(), "operation cancelled; no package ready");
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(Error::Connection(Arc::new(Error::ConnectionClosed)).is_fatal());
        assert!(!Error::Connection(Arc::new(Error::UnknownChannel(3))).is_fatal());
        assert!(!Error::NoPackageReady.is_fatal());
    }
}
