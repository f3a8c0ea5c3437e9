//! TDS 5.0 packet header and packet definitions.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// TDS packet header size in bytes.
pub const PACKET_HEADER_SIZE: usize = 8;

/// Maximum TDS packet size.
pub const MAX_PACKET_SIZE: usize = 65535;

/// Packet size used until the server announces another one.
pub const DEFAULT_PACKET_SIZE: usize = 512;

/// Negotiated packet size shared between a connection and its channels.
///
/// The server may change it at any time through an environment change.
#[derive(Debug, Clone)]
pub struct PacketSize(Arc<AtomicUsize>);

impl PacketSize {
    /// Create a shared packet size.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self(Arc::new(AtomicUsize::new(size)))
    }

    /// Current packet size including the header.
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Current payload capacity of a packet.
    #[must_use]
    pub fn body_size(&self) -> usize {
        self.get().saturating_sub(PACKET_HEADER_SIZE)
    }

    /// Replace the packet size.
    pub fn set(&self, size: usize) {
        self.0.store(size.clamp(PACKET_HEADER_SIZE + 1, MAX_PACKET_SIZE), Ordering::Release);
    }
}

impl Default for PacketSize {
    fn default() -> Self {
        Self::new(DEFAULT_PACKET_SIZE)
    }
}

/// Packet message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Language command.
    Lang = 1,
    /// Login record.
    Login = 2,
    /// Remote procedure call.
    Rpc = 3,
    /// Server response.
    Response = 4,
    /// Unformatted data.
    Unformatted = 5,
    /// Attention.
    Attention = 6,
    /// Bulk data.
    Bulk = 7,
    /// Channel setup.
    Setup = 8,
    /// Channel close.
    Close = 9,
    /// Protocol error.
    Error = 10,
    /// Protocol acknowledgment.
    ProtAck = 11,
    /// Echo.
    Echo = 12,
    /// Logout.
    Logout = 13,
    /// End of parameters.
    EndParam = 14,
    /// Normal token stream.
    Normal = 15,
    /// Urgent event.
    Urgent = 16,
    /// Connection migration.
    Migrate = 17,
    /// Hello.
    Hello = 18,
    /// Command sequence, normal.
    CmdSeqNormal = 19,
    /// Command sequence, login.
    CmdSeqLogin = 20,
    /// Command sequence, liveness.
    CmdSeqLiveness = 21,
    /// Command sequence, reserved.
    CmdSeqReserved1 = 22,
    /// Command sequence, reserved.
    CmdSeqReserved2 = 23,
}

impl MessageType {
    /// Create a message type from a raw byte value.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        let message_type = match value {
            1 => Self::Lang,
            2 => Self::Login,
            3 => Self::Rpc,
            4 => Self::Response,
            5 => Self::Unformatted,
            6 => Self::Attention,
            7 => Self::Bulk,
            8 => Self::Setup,
            9 => Self::Close,
            10 => Self::Error,
            11 => Self::ProtAck,
            12 => Self::Echo,
            13 => Self::Logout,
            14 => Self::EndParam,
            15 => Self::Normal,
            16 => Self::Urgent,
            17 => Self::Migrate,
            18 => Self::Hello,
            19 => Self::CmdSeqNormal,
            20 => Self::CmdSeqLogin,
            21 => Self::CmdSeqLiveness,
            22 => Self::CmdSeqReserved1,
            23 => Self::CmdSeqReserved2,
            _ => return Err(ProtocolError::InvalidMessageType(value)),
        };
        Ok(message_type)
    }

    /// Whether the raw value carries every bit of `other`.
    ///
    /// Acknowledgments of channel setup are recognized this way rather
    /// than by strict equality.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self as u8) & (other as u8) == other as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lang => "LANG",
            Self::Login => "LOGIN",
            Self::Rpc => "RPC",
            Self::Response => "RESPONSE",
            Self::Unformatted => "UNFMT",
            Self::Attention => "ATTN",
            Self::Bulk => "BULK",
            Self::Setup => "SETUP",
            Self::Close => "CLOSE",
            Self::Error => "ERROR",
            Self::ProtAck => "PROTACK",
            Self::Echo => "ECHO",
            Self::Logout => "LOGOUT",
            Self::EndParam => "ENDPARAM",
            Self::Normal => "NORMAL",
            Self::Urgent => "URGENT",
            Self::Migrate => "MIGRATE",
            Self::Hello => "HELLO",
            Self::CmdSeqNormal => "CMDSEQ_NORMAL",
            Self::CmdSeqLogin => "CMDSEQ_LOGIN",
            Self::CmdSeqLiveness => "CMDSEQ_LIVENESS",
            Self::CmdSeqReserved1 => "CMDSEQ_RESERVED1",
            Self::CmdSeqReserved2 => "CMDSEQ_RESERVED2",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Packet status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketStatus: u8 {
        /// Last packet of a message.
        const EOM = 0x01;
        /// Acknowledgment of the last attention.
        const ATTNACK = 0x02;
        /// Attention request.
        const ATTN = 0x04;
        /// Event notification.
        const EVENT = 0x08;
        /// Packet is encrypted.
        const SEAL = 0x10;
        /// Packet is encrypted (command sequence protocol).
        const ENCRYPT = 0x20;
        /// Packet is encrypted with the symmetric session key.
        const SYMENCRYPT = 0x40;
    }
}

impl fmt::Display for PacketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::flags::write_flags(f, self, "0")
    }
}

/// Packet header.
///
/// Every packet begins with an 8-byte big-endian header, independent of
/// the byte order negotiated for payload integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Type of the message this packet belongs to.
    pub message_type: MessageType,
    /// Status flags.
    pub status: PacketStatus,
    /// Total packet length including the header.
    pub length: u16,
    /// Channel the packet belongs to.
    pub channel: u16,
    /// Sequence number within the channel (wraps at 256).
    pub packet_nr: u8,
    /// Window size before an acknowledgment is required.
    pub window: u8,
}

impl PacketHeader {
    /// Create a header for a packet of `length` bytes.
    #[must_use]
    pub const fn new(message_type: MessageType, status: PacketStatus, length: u16) -> Self {
        Self {
            message_type,
            status,
            length,
            channel: 0,
            packet_nr: 0,
            window: 0,
        }
    }

    /// Parse a packet header from bytes.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        if src.remaining() < PACKET_HEADER_SIZE {
            return Err(ProtocolError::IncompleteHeader {
                expected: PACKET_HEADER_SIZE,
                actual: src.remaining(),
            });
        }

        let message_type = MessageType::from_u8(src.get_u8())?;
        let status = PacketStatus::from_bits_retain(src.get_u8());
        let length = src.get_u16();
        let channel = src.get_u16();
        let packet_nr = src.get_u8();
        let window = src.get_u8();

        Ok(Self {
            message_type,
            status,
            length,
            channel,
            packet_nr,
            window,
        })
    }

    /// Encode the packet header.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.message_type as u8);
        dst.put_u8(self.status.bits());
        dst.put_u16(self.length);
        dst.put_u16(self.channel);
        dst.put_u8(self.packet_nr);
        dst.put_u8(self.window);
    }

    /// Encode the packet header to a new `Bytes` buffer.
    #[must_use]
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKET_HEADER_SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Payload length (total length minus header).
    #[must_use]
    pub const fn payload_length(&self) -> usize {
        (self.length as usize).saturating_sub(PACKET_HEADER_SIZE)
    }

    /// Check if this is the last packet of a message.
    #[must_use]
    pub const fn is_eom(&self) -> bool {
        self.status.contains(PacketStatus::EOM)
    }
}

impl Default for PacketHeader {
    fn default() -> Self {
        Self::new(MessageType::Normal, PacketStatus::empty(), PACKET_HEADER_SIZE as u16)
    }
}

impl fmt::Display for PacketHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MsgType: {}, Status: {}, Length: {}, Channel: {}, PacketNr: {}, Window: {}",
            self.message_type, self.status, self.length, self.channel, self.packet_nr, self.window
        )
    }
}

/// A packet: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet header.
    pub header: PacketHeader,
    /// Payload, excluding the header.
    pub data: BytesMut,
}

impl Packet {
    /// Create a packet with the given header and payload.
    #[must_use]
    pub fn new(header: PacketHeader, data: BytesMut) -> Self {
        Self { header, data }
    }

    /// Create an empty, zero-filled packet of `packet_size` total bytes,
    /// ready to be written into.
    #[must_use]
    pub fn with_capacity(packet_size: usize) -> Self {
        let packet_size = packet_size.clamp(PACKET_HEADER_SIZE, MAX_PACKET_SIZE);
        let header = PacketHeader::new(
            MessageType::Normal,
            PacketStatus::empty(),
            packet_size as u16,
        );
        Self::new(header, BytesMut::zeroed(packet_size - PACKET_HEADER_SIZE))
    }

    /// Create a packet that consists of a header only.
    #[must_use]
    pub fn header_only(message_type: MessageType, channel: u16) -> Self {
        let mut header =
            PacketHeader::new(message_type, PacketStatus::EOM, PACKET_HEADER_SIZE as u16);
        header.channel = channel;
        Self::new(header, BytesMut::new())
    }

    /// Whether the packet carries no payload.
    #[must_use]
    pub fn is_header_only(&self) -> bool {
        usize::from(self.header.length) == PACKET_HEADER_SIZE
    }

    /// Total packet size including the header.
    #[must_use]
    pub fn total_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.data.len()
    }

    /// Encode header and payload.
    pub fn encode(&self, dst: &mut impl BufMut) {
        self.header.encode(dst);
        dst.put_slice(&self.data);
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} payload bytes)", self.header, self.data.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_header_layout() {
        let header = PacketHeader {
            message_type: MessageType::Normal,
            status: PacketStatus::EOM,
            length: 0x0102,
            channel: 0x0304,
            packet_nr: 5,
            window: 6,
        };
        assert_eq!(&header.encode_to_bytes()[..], &[15, 1, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_incomplete_header() {
        let mut cursor: &[u8] = &[15, 1, 0];
        assert!(matches!(
            PacketHeader::decode(&mut cursor),
            Err(ProtocolError::IncompleteHeader { actual: 3, .. })
        ));
    }

    #[test]
    fn test_protack_contains() {
        assert!(MessageType::ProtAck.contains(MessageType::ProtAck));
        assert!(!MessageType::Setup.contains(MessageType::ProtAck));
    }

    #[test]
    fn test_packet_with_capacity() {
        let packet = Packet::with_capacity(512);
        assert_eq!(packet.header.length, 512);
        assert_eq!(packet.data.len(), 504);
        assert!(Packet::header_only(MessageType::Setup, 3).is_header_only());
    }

    proptest! {
        #[test]
        fn header_roundtrip(
            message_type in 1u8..=23,
            status in any::<u8>(),
            length in any::<u16>(),
            channel in any::<u16>(),
            packet_nr in any::<u8>(),
            window in any::<u8>(),
        ) {
            let header = PacketHeader {
                message_type: MessageType::from_u8(message_type).unwrap(),
                status: PacketStatus::from_bits_retain(status),
                length,
                channel,
                packet_nr,
                window,
            };
            let bytes = header.encode_to_bytes();
            let mut cursor = bytes.as_ref();
            prop_assert_eq!(PacketHeader::decode(&mut cursor).unwrap(), header);
        }
    }
}
