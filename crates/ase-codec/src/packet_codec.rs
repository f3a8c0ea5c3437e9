//! TDS 5.0 packet codec implementation.

use ase_protocol::packet::{MAX_PACKET_SIZE, PACKET_HEADER_SIZE, Packet, PacketHeader};
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// TDS 5.0 packet codec for tokio-util framing.
///
/// Sequence numbers and channels are taken from the packet header as is;
/// they are managed per channel by the client.
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_packet_size: usize,
}

impl PacketCodec {
    /// Create a codec accepting packets up to the protocol maximum.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
        }
    }

    /// Limit the size of accepted and produced packets.
    #[must_use]
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size.clamp(PACKET_HEADER_SIZE, MAX_PACKET_SIZE);
        self
    }

    /// Maximum packet size.
    #[must_use]
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < PACKET_HEADER_SIZE {
            return Ok(None);
        }

        let length = usize::from(u16::from_be_bytes([src[2], src[3]]));
        if length < PACKET_HEADER_SIZE {
            return Err(CodecError::InvalidLength(length));
        }
        if length > self.max_packet_size {
            return Err(CodecError::PacketTooLarge {
                size: length,
                max: self.max_packet_size,
            });
        }

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let mut packet_bytes = src.split_to(length);
        let header = PacketHeader::decode(&mut &packet_bytes[..PACKET_HEADER_SIZE])?;
        let payload = packet_bytes.split_off(PACKET_HEADER_SIZE);

        tracing::trace!(
            message_type = %header.message_type,
            status = %header.status,
            channel = header.channel,
            length,
            "decoded TDS packet"
        );

        Ok(Some(Packet::new(header, payload)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => Err(CodecError::Truncated {
                received: src.len(),
            }),
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let total_length = item.total_size();
        if total_length > self.max_packet_size {
            return Err(CodecError::PacketTooLarge {
                size: total_length,
                max: self.max_packet_size,
            });
        }

        dst.reserve(total_length);

        let mut header = item.header;
        header.length = total_length as u16;
        header.encode(dst);
        dst.put_slice(&item.data);

        tracing::trace!(
            message_type = %header.message_type,
            status = %header.status,
            channel = header.channel,
            packet_nr = header.packet_nr,
            length = total_length,
            "encoded TDS packet"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ase_protocol::packet::{MessageType, PacketStatus};

    fn raw_packet(payload: &[u8]) -> BytesMut {
        let mut data = BytesMut::new();
        data.put_u8(MessageType::Response as u8);
        data.put_u8(PacketStatus::EOM.bits());
        data.put_u16((PACKET_HEADER_SIZE + payload.len()) as u16);
        data.put_u16(3);
        data.put_u8(1);
        data.put_u8(0);
        data.put_slice(payload);
        data
    }

    #[test]
    fn test_decode_packet() {
        let mut codec = PacketCodec::new();
        let mut data = raw_packet(b"test");

        let packet = codec.decode(&mut data).unwrap().unwrap();
        assert_eq!(packet.header.message_type, MessageType::Response);
        assert_eq!(packet.header.channel, 3);
        assert!(packet.header.is_eom());
        assert_eq!(&packet.data[..], b"test");
        assert!(data.is_empty());
    }

    #[test]
    fn test_encode_sets_length() {
        let mut codec = PacketCodec::new();
        let header = PacketHeader::new(MessageType::Lang, PacketStatus::EOM, 0);
        let packet = Packet::new(header, BytesMut::from(&b"test"[..]));

        let mut dst = BytesMut::new();
        codec.encode(packet, &mut dst).unwrap();

        assert_eq!(dst.len(), 12);
        assert_eq!(dst[..4], [MessageType::Lang as u8, 0x01, 0, 12]);
    }

    #[test]
    fn test_incomplete_packet() {
        let mut codec = PacketCodec::new();
        let mut data = raw_packet(b"test");
        data.truncate(10);

        assert!(codec.decode(&mut data).unwrap().is_none());
        assert!(matches!(
            codec.decode_eof(&mut data),
            Err(CodecError::Truncated { received: 10 })
        ));
    }

    #[test]
    fn test_eof_between_packets() {
        let mut codec = PacketCodec::new();
        assert!(codec.decode_eof(&mut BytesMut::new()).unwrap().is_none());
    }

    #[test]
    fn test_length_below_header() {
        let mut codec = PacketCodec::new();
        let mut data = raw_packet(b"");
        data[3] = 4;
        assert!(matches!(
            codec.decode(&mut data),
            Err(CodecError::InvalidLength(4))
        ));
    }

    #[test]
    fn test_packet_too_large() {
        let mut codec = PacketCodec::new().with_max_packet_size(512);
        let mut data = raw_packet(&[0; 600]);
        assert!(matches!(
            codec.decode(&mut data),
            Err(CodecError::PacketTooLarge { size: 608, max: 512 })
        ));
    }
}
