//! Protocol error types.

use ase_types::TypeError;
use thiserror::Error;

/// Errors that can occur while encoding or decoding TDS 5.0 data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The packet queue ran out of buffered bytes.
    ///
    /// This is not a failure: the caller retries once more packets arrive.
    #[error("not enough bytes buffered")]
    NotEnoughBytes,

    /// A package consumed a different number of bytes than it declared.
    #[error("{package}: declared length {expected} does not match consumed length {actual}")]
    LengthMismatch {
        /// Package being decoded.
        package: &'static str,
        /// Length announced on the wire.
        expected: usize,
        /// Length actually consumed.
        actual: usize,
    },

    /// Fewer bytes than a packet header were available.
    #[error("incomplete packet header: expected {expected} bytes, got {actual}")]
    IncompleteHeader {
        /// Required number of bytes.
        expected: usize,
        /// Available number of bytes.
        actual: usize,
    },

    /// The packet header carries an unknown message type.
    #[error("invalid message type 0x{0:02X}")]
    InvalidMessageType(u8),

    /// A package that requires a preceding format arrived without one.
    #[error("{package} received without preceding format")]
    MissingFormat {
        /// Package being decoded.
        package: &'static str,
    },

    /// A package was preceded by a package it cannot follow.
    #[error("{package} cannot follow {preceding}")]
    InvalidPredecessor {
        /// Package being decoded or encoded.
        package: &'static str,
        /// Name of the preceding package.
        preceding: String,
    },

    /// A field or enum carried a value outside its defined range.
    #[error("invalid {field}: {value}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Raw value received.
        value: u64,
    },

    /// A data package holds a different number of values than its format.
    #[error("{formats} field formats but {values} values")]
    FieldCountMismatch {
        /// Number of formats.
        formats: usize,
        /// Number of values.
        values: usize,
    },

    /// A string or byte run does not fit its length prefix.
    #[error("{field} is {actual} bytes long, at most {max} are allowed")]
    TooLong {
        /// Name of the field.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// A capability outside the range of its mask.
    #[error("capability {capability} out of range for mask of {len} bits")]
    CapabilityOutOfRange {
        /// Numeric capability value.
        capability: u8,
        /// Number of bits in the mask.
        len: usize,
    },

    /// Invalid library version string or bytes.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// The operation is not defined for this package.
    #[error("{0}")]
    Unsupported(&'static str),

    /// Value conversion failed.
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl ProtocolError {
    /// Whether the error only signals that more data is needed.
    #[must_use]
    pub fn is_not_enough_bytes(&self) -> bool {
        matches!(self, Self::NotEnoughBytes)
    }
}
