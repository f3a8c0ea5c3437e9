//! Codec error types.

use std::time::Duration;

use ase_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while framing packets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The transport failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A packet header could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The length field of a header is smaller than the header itself.
    #[error("invalid packet length {0}")]
    InvalidLength(usize),

    /// A packet exceeds the maximum packet size.
    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge {
        /// Size of the packet.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The transport was closed before any byte of a packet was read.
    #[error("connection closed before any data was received")]
    ClosedBeforeData,

    /// The transport was closed in the middle of a packet.
    #[error("connection closed after {received} bytes of a packet")]
    Truncated {
        /// Bytes of the incomplete packet that were received.
        received: usize,
    },

    /// No packet arrived within the read timeout.
    #[error("no packet received within {0:?}")]
    Timeout(Duration),
}

impl CodecError {
    /// Whether the peer closed the transport cleanly between packets.
    #[must_use]
    pub fn is_closed_before_data(&self) -> bool {
        matches!(self, Self::ClosedBeforeData)
    }
}
