//! Byte cursor spanning a sequence of packets.
//!
//! A [`PacketQueue`] is used in both directions. Inbound packets are
//! appended as they arrive and packages are decoded from the queue
//! speculatively: the caller saves the [`Position`], tries to decode and
//! restores the position when [`ProtocolError::NotEnoughBytes`] signals
//! that the package continues in a packet that has not arrived yet.
//!
//! Outbound, packages are written into the queue, which allocates packets
//! of the negotiated size on demand and fills each to capacity.

use ase_types::Endian;
use bytes::BytesMut;

use crate::error::ProtocolError;
use crate::packet::{PACKET_HEADER_SIZE, Packet, PacketSize, PacketStatus};

/// A saved read or write position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    packet: usize,
    data: usize,
    consumed: usize,
}

/// Queue of packets with a read/write cursor.
#[derive(Debug)]
pub struct PacketQueue {
    packets: Vec<Packet>,
    index_packet: usize,
    index_data: usize,
    consumed: usize,
    recv_eom: bool,
    packet_size: PacketSize,
    endian: Endian,
}

macro_rules! queue_int {
    ($read:ident, $write:ident, $ty:ty, $n:literal, $endian_read:ident, $endian_write:ident) => {
        #[doc = concat!("Read a `", stringify!($ty), "` in the negotiated byte order.")]
        pub fn $read(&mut self) -> Result<$ty, ProtocolError> {
            let mut buf = [0u8; $n];
            self.read_into(&mut buf)?;
            Ok(self.endian.$endian_read(buf))
        }

        #[doc = concat!("Write a `", stringify!($ty), "` in the negotiated byte order.")]
        pub fn $write(&mut self, value: $ty) {
            let bytes = self.endian.$endian_write(value);
            self.write_bytes(&bytes);
        }
    };
}

impl PacketQueue {
    /// Create an empty queue whose outbound packets follow `packet_size`.
    #[must_use]
    pub fn new(packet_size: PacketSize, endian: Endian) -> Self {
        Self {
            packets: Vec::new(),
            index_packet: 0,
            index_data: 0,
            consumed: 0,
            recv_eom: false,
            packet_size,
            endian,
        }
    }

    /// Byte order used for integers.
    #[must_use]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Drop all packets and reset the cursor.
    pub fn reset(&mut self) {
        self.packets.clear();
        self.index_packet = 0;
        self.index_data = 0;
        self.consumed = 0;
        self.recv_eom = false;
    }

    /// Append an inbound packet.
    pub fn add_packet(&mut self, packet: Packet) {
        if packet.header.is_eom() {
            self.recv_eom = true;
        }
        self.packets.push(packet);
    }

    /// Number of packets held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether the queue holds no packets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> Position {
        Position {
            packet: self.index_packet,
            data: self.index_data,
            consumed: self.consumed,
        }
    }

    /// Move the cursor back to a saved position.
    pub fn set_position(&mut self, position: Position) {
        self.index_packet = position.packet;
        self.index_data = position.data;
        self.consumed = position.consumed;
    }

    /// Total bytes read through this queue, used to check declared
    /// package lengths.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Drop everything before the cursor.
    ///
    /// Only call this after a package has been decoded completely.
    pub fn discard_until_current_position(&mut self) {
        let drain = self.index_packet.min(self.packets.len());
        self.packets.drain(..drain);
        self.index_packet = 0;

        let Some(current) = self.packets.first() else {
            self.index_data = 0;
            return;
        };

        if self.index_data >= current.data.len() {
            self.packets.remove(0);
            self.index_data = 0;
        }
    }

    /// Whether every buffered byte has been read.
    #[must_use]
    pub fn all_packets_consumed(&self) -> bool {
        if self.packets.is_empty() && self.index_packet == 0 && self.index_data == 0 {
            return true;
        }

        if self.index_packet >= self.packets.len() {
            return true;
        }

        self.index_packet == self.packets.len() - 1
            && self.index_data == self.packets[self.index_packet].data.len()
    }

    /// Whether every buffered byte has been read and the last packet
    /// received ended the message.
    #[must_use]
    pub fn is_eom(&self) -> bool {
        self.all_packets_consumed() && self.recv_eom
    }

    /// Whether the last packet of the message has been received.
    #[must_use]
    pub fn received_eom(&self) -> bool {
        self.recv_eom
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), ProtocolError> {
        let start = self.position();
        let mut offset = 0;

        while offset < buf.len() {
            if self.all_packets_consumed() {
                self.set_position(start);
                return Err(ProtocolError::NotEnoughBytes);
            }

            let data = &self.packets[self.index_packet].data;
            let end = (self.index_data + buf.len() - offset).min(data.len());
            let n = end - self.index_data;
            buf[offset..offset + n].copy_from_slice(&data[self.index_data..end]);
            offset += n;

            self.index_data = end;
            if self.index_data == data.len() {
                self.index_packet += 1;
                self.index_data = 0;
            }
        }

        self.consumed += buf.len();
        Ok(())
    }

    /// Read exactly `n` bytes.
    ///
    /// Fails with [`ProtocolError::NotEnoughBytes`] without moving the
    /// cursor if fewer bytes are buffered.
    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; n];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    /// Read all bytes up to the end of the buffered packets.
    pub fn remaining_bytes(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while !self.all_packets_consumed() {
            let data = &self.packets[self.index_packet].data;
            out.extend_from_slice(&data[self.index_data..]);
            self.consumed += data.len() - self.index_data;
            self.index_packet += 1;
            self.index_data = 0;
        }
        out
    }

    /// Read a single byte.
    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        let mut buf = [0u8; 1];
        self.read_into(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a signed byte.
    pub fn i8(&mut self) -> Result<i8, ProtocolError> {
        self.u8().map(|b| b as i8)
    }

    queue_int!(u16, write_u16, u16, 2, read_u16, write_u16);
    queue_int!(i16, write_i16, i16, 2, read_i16, write_i16);
    queue_int!(u32, write_u32, u32, 4, read_u32, write_u32);
    queue_int!(i32, write_i32, i32, 4, read_i32, write_i32);
    queue_int!(u64, write_u64, u64, 8, read_u64, write_u64);
    queue_int!(i64, write_i64, i64, 8, read_i64, write_i64);

    /// Read `n` bytes as text.
    pub fn string(&mut self, n: usize) -> Result<String, ProtocolError> {
        let bytes = self.bytes(n)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a string prefixed by its length as a single byte.
    pub fn u8_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.u8()?;
        self.string(usize::from(len))
    }

    /// Read a string prefixed by its length as a `u16`.
    pub fn u16_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.u16()?;
        self.string(usize::from(len))
    }

    /// Read a string prefixed by its length as a `u32`.
    pub fn u32_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.u32()?;
        self.string(len as usize)
    }

    /// Write a string prefixed by its length as a single byte.
    pub fn write_u8_string(&mut self, field: &'static str, s: &str) -> Result<(), ProtocolError> {
        let len = u8::try_from(s.len()).map_err(|_| too_long(field, u8::MAX as usize, s.len()))?;
        self.write_u8(len);
        self.write_string(s);
        Ok(())
    }

    /// Write a string prefixed by its length as a `u16`.
    pub fn write_u16_string(&mut self, field: &'static str, s: &str) -> Result<(), ProtocolError> {
        let len =
            u16::try_from(s.len()).map_err(|_| too_long(field, u16::MAX as usize, s.len()))?;
        self.write_u16(len);
        self.write_string(s);
        Ok(())
    }

    /// Write a string prefixed by its length as a `u32`.
    pub fn write_u32_string(&mut self, field: &'static str, s: &str) -> Result<(), ProtocolError> {
        let len =
            u32::try_from(s.len()).map_err(|_| too_long(field, u32::MAX as usize, s.len()))?;
        self.write_u32(len);
        self.write_string(s);
        Ok(())
    }

    /// Write bytes, allocating packets of the negotiated size as needed.
    pub fn write_bytes(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            if self.index_packet == self.packets.len() {
                self.packets.push(Packet::with_capacity(self.packet_size.get()));
                self.index_data = 0;
            }

            let mut free = self.packets[self.index_packet].header.payload_length() - self.index_data;
            if free == 0 {
                self.packets.push(Packet::with_capacity(self.packet_size.get()));
                self.index_packet += 1;
                self.index_data = 0;
                free = self.packets[self.index_packet].header.payload_length();
            }

            let n = free.min(bytes.len());
            let packet = &mut self.packets[self.index_packet];
            packet.data[self.index_data..self.index_data + n].copy_from_slice(&bytes[..n]);
            self.index_data += n;
            bytes = &bytes[n..];
        }
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    /// Write a signed byte.
    pub fn write_i8(&mut self, value: i8) {
        self.write_bytes(&value.to_ne_bytes());
    }

    /// Write text without any length prefix.
    pub fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Take the outbound packets that are ready for transmission.
    ///
    /// Without `flush` only packets before the write cursor are returned;
    /// the packet under the cursor stays queued even when it is full, so
    /// that the final packet of a message always carries EOM. With `flush`
    /// every packet is returned, the one under the cursor truncated to its
    /// written length and marked EOM, and the queue is left empty.
    pub fn take_packets(&mut self, flush: bool) -> Vec<Packet> {
        if !flush {
            let ready = self.index_packet.min(self.packets.len());
            self.index_packet -= ready;
            return self.packets.drain(..ready).collect();
        }

        let mut packets = std::mem::take(&mut self.packets);
        if let Some(last) = packets.get_mut(self.index_packet) {
            last.data.truncate(self.index_data);
            last.header.length = (PACKET_HEADER_SIZE + self.index_data) as u16;
        }
        packets.retain(|p| !p.data.is_empty());
        if let Some(last) = packets.last_mut() {
            last.header.status |= PacketStatus::EOM;
        }
        self.index_packet = 0;
        self.index_data = 0;
        packets
    }

    /// Queue an inbound payload as a single packet. Test helper for
    /// decoding packages from raw bytes.
    #[must_use]
    pub fn from_payload(payload: &[u8], endian: Endian) -> Self {
        let mut queue = Self::new(PacketSize::default(), endian);
        let mut packet = Packet::with_capacity(PACKET_HEADER_SIZE + payload.len());
        packet.data = BytesMut::from(payload);
        packet.header.status = PacketStatus::EOM;
        queue.add_packet(packet);
        queue
    }

    /// Concatenated payload of all packets written so far.
    #[must_use]
    pub fn written_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, packet) in self.packets.iter().enumerate() {
            if i == self.index_packet {
                out.extend_from_slice(&packet.data[..self.index_data]);
                break;
            }
            out.extend_from_slice(&packet.data);
        }
        out
    }
}

fn too_long(field: &'static str, max: usize, actual: usize) -> ProtocolError {
    ProtocolError::TooLong { field, max, actual }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inbound(chunks: &[&[u8]]) -> PacketQueue {
        let mut queue = PacketQueue::new(PacketSize::default(), Endian::Little);
        for (i, chunk) in chunks.iter().enumerate() {
            let mut packet = Packet::with_capacity(PACKET_HEADER_SIZE + chunk.len());
            packet.data = BytesMut::from(*chunk);
            if i == chunks.len() - 1 {
                packet.header.status = PacketStatus::EOM;
            }
            queue.add_packet(packet);
        }
        queue
    }

    #[test]
    fn test_read_across_packets() {
        let mut queue = inbound(&[&[1, 2], &[3, 4, 5]]);
        assert_eq!(queue.bytes(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(queue.u16().unwrap(), 0x0504);
        assert!(queue.is_eom());
        assert_eq!(queue.consumed(), 5);
    }

    #[test]
    fn test_not_enough_bytes_keeps_position() {
        let mut queue = inbound(&[&[1, 2, 3]]);
        let pos = queue.position();
        assert!(matches!(queue.bytes(4), Err(ProtocolError::NotEnoughBytes)));
        assert_eq!(queue.position(), pos);
        assert_eq!(queue.bytes(3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_length_read() {
        let mut queue = PacketQueue::new(PacketSize::default(), Endian::Little);
        assert!(queue.bytes(0).unwrap().is_empty());
        assert!(queue.all_packets_consumed());
        assert!(!queue.is_eom());
    }

    #[test]
    fn test_discard_until_current_position() {
        let mut queue = inbound(&[&[1, 2], &[3, 4]]);
        queue.bytes(2).unwrap();
        queue.discard_until_current_position();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.u8().unwrap(), 3);
        queue.discard_until_current_position();
        assert_eq!(queue.len(), 1);
        queue.u8().unwrap();
        queue.discard_until_current_position();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_big_endian_integers() {
        let mut queue = PacketQueue::from_payload(&[0, 0, 0, 1, 0xFF, 0xFE], Endian::Big);
        assert_eq!(queue.i32().unwrap(), 1);
        assert_eq!(queue.i16().unwrap(), -2);
    }

    #[test]
    fn test_prefixed_strings() {
        let mut tx = PacketQueue::new(PacketSize::default(), Endian::Big);
        tx.write_u8_string("name", "abc").unwrap();
        tx.write_u16_string("stmt", "select 1").unwrap();
        assert!(matches!(
            tx.write_u8_string("name", &"x".repeat(256)),
            Err(ProtocolError::TooLong { max: 255, .. })
        ));

        let mut rx = PacketQueue::from_payload(&tx.written_bytes(), Endian::Big);
        assert_eq!(rx.u8_string().unwrap(), "abc");
        assert_eq!(rx.u16_string().unwrap(), "select 1");
        assert!(rx.all_packets_consumed());
    }

    #[test]
    fn test_write_fills_packets() {
        let mut queue = PacketQueue::new(PacketSize::new(PACKET_HEADER_SIZE + 4), Endian::Little);
        queue.write_bytes(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(queue.len(), 2);

        let ready = queue.take_packets(false);
        assert_eq!(ready.len(), 1);
        assert!(!ready[0].header.is_eom());
        assert_eq!(&ready[0].data[..], &[1, 2, 3, 4]);

        let rest = queue.take_packets(true);
        assert_eq!(rest.len(), 1);
        assert!(rest[0].header.is_eom());
        assert_eq!(rest[0].header.length as usize, PACKET_HEADER_SIZE + 2);
        assert_eq!(&rest[0].data[..], &[5, 6]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_exactly_full_packet_gets_eom() {
        let mut queue = PacketQueue::new(PacketSize::new(PACKET_HEADER_SIZE + 4), Endian::Little);
        queue.write_bytes(&[1, 2, 3, 4]);
        assert!(queue.take_packets(false).is_empty());
        let packets = queue.take_packets(true);
        assert_eq!(packets.len(), 1);
        assert!(packets[0].header.is_eom());
        assert_eq!(packets[0].data.len(), 4);
    }

    proptest! {
        #[test]
        fn boundary_crossing(
            data in prop::collection::vec(any::<u8>(), 1..2048),
            body in 1usize..600,
        ) {
            let mut tx = PacketQueue::new(PacketSize::new(PACKET_HEADER_SIZE + body), Endian::Little);
            tx.write_bytes(&data);
            let packets = tx.take_packets(true);
            prop_assert_eq!(packets.iter().filter(|p| p.header.is_eom()).count(), 1);

            let mut rx = PacketQueue::new(PacketSize::default(), Endian::Little);
            for packet in packets {
                rx.add_packet(packet);
            }
            prop_assert_eq!(rx.bytes(data.len()).unwrap(), data);
            prop_assert!(rx.is_eom());
        }

        #[test]
        fn position_rollback(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut queue = PacketQueue::from_payload(&data, Endian::Little);
            let pos = queue.position();
            prop_assert!(queue.bytes(data.len() + 1).is_err());
            prop_assert_eq!(queue.position(), pos);
            prop_assert_eq!(queue.bytes(data.len()).unwrap(), data);
        }
    }
}
