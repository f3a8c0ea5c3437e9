//! Split packet reader and writer over an async transport.
//!
//! The connection owns the read half in its background reader task while
//! channels send through the shared write half, so the transport is split
//! right after it is established.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use ase_protocol::Packet;
use futures_core::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::CodecError;
use crate::packet_codec::PacketCodec;

/// Split `transport` into a packet reader and a packet writer.
pub fn split<T>(transport: T) -> (PacketReader<ReadHalf<T>>, PacketWriter<WriteHalf<T>>)
where
    T: AsyncRead + AsyncWrite,
{
    let (read_half, write_half) = tokio::io::split(transport);
    (PacketReader::new(read_half), PacketWriter::new(write_half))
}

pin_project! {
    /// A read-only stream of TDS packets.
    pub struct PacketReader<T> {
        #[pin]
        inner: FramedRead<T, PacketCodec>,
    }
}

impl<T> PacketReader<T>
where
    T: AsyncRead,
{
    /// Create a packet reader over the given transport.
    pub fn new(transport: T) -> Self {
        Self::with_codec(transport, PacketCodec::new())
    }

    /// Create a packet reader with a custom codec.
    pub fn with_codec(transport: T, codec: PacketCodec) -> Self {
        Self {
            inner: FramedRead::new(transport, codec),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }
}

impl<T> PacketReader<T>
where
    T: AsyncRead + Unpin,
{
    /// Read one packet, waiting at most `timeout`.
    ///
    /// A transport closed before any byte of the packet arrived yields
    /// [`CodecError::ClosedBeforeData`]; one closed in the middle of a
    /// packet yields [`CodecError::Truncated`].
    pub async fn read_packet(&mut self, timeout: Duration) -> Result<Packet, CodecError> {
        match tokio::time::timeout(timeout, self.inner.next()).await {
            Err(_) => Err(CodecError::Timeout(timeout)),
            Ok(None) => Err(CodecError::ClosedBeforeData),
            Ok(Some(result)) => result,
        }
    }
}

impl<T> Stream for PacketReader<T>
where
    T: AsyncRead + Unpin,
{
    type Item = Result<Packet, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

impl<T> std::fmt::Debug for PacketReader<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketReader")
            .field("transport", self.inner.get_ref())
            .finish()
    }
}

pin_project! {
    /// A write-only sink for TDS packets.
    pub struct PacketWriter<T> {
        #[pin]
        inner: FramedWrite<T, PacketCodec>,
    }
}

impl<T> PacketWriter<T>
where
    T: AsyncWrite,
{
    /// Create a packet writer over the given transport.
    pub fn new(transport: T) -> Self {
        Self::with_codec(transport, PacketCodec::new())
    }

    /// Create a packet writer with a custom codec.
    pub fn with_codec(transport: T, codec: PacketCodec) -> Self {
        Self {
            inner: FramedWrite::new(transport, codec),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }
}

impl<T> PacketWriter<T>
where
    T: AsyncWrite + Unpin,
{
    /// Write `packets` in order and flush the transport.
    pub async fn write_packets<I>(&mut self, packets: I) -> Result<(), CodecError>
    where
        I: IntoIterator<Item = Packet>,
    {
        for packet in packets {
            self.inner.feed(packet).await?;
        }
        self.inner.flush().await
    }

    /// Flush and shut down the write half of the transport.
    pub async fn shutdown(&mut self) -> Result<(), CodecError> {
        self.inner.close().await
    }
}

impl<T> Sink<Packet> for PacketWriter<T>
where
    T: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Packet) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}

impl<T> std::fmt::Debug for PacketWriter<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketWriter")
            .field("transport", self.inner.get_ref())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ase_protocol::packet::{MessageType, PacketHeader, PacketStatus};
    use bytes::BytesMut;
    use tokio::io::AsyncWriteExt;

    fn packet(payload: &[u8]) -> Packet {
        let mut header = PacketHeader::new(MessageType::Normal, PacketStatus::EOM, 0);
        header.channel = 2;
        header.packet_nr = 7;
        Packet::new(header, BytesMut::from(payload))
    }

    #[tokio::test]
    async fn test_round_trip_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let (_, mut writer) = split(client);
        let (mut reader, _) = split(server);

        writer
            .write_packets([packet(b"one"), packet(b"two")])
            .await
            .unwrap();

        let first = reader.read_packet(Duration::from_secs(1)).await.unwrap();
        let second = reader.read_packet(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&first.data[..], b"one");
        assert_eq!(first.header.length, 11);
        assert_eq!(first.header.channel, 2);
        assert_eq!(first.header.packet_nr, 7);
        assert_eq!(&second.data[..], b"two");
    }

    #[tokio::test]
    async fn test_closed_before_data() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut reader = PacketReader::new(server);

        let err = reader.read_packet(Duration::from_secs(1)).await.unwrap_err();
        assert!(err.is_closed_before_data());
    }

    #[tokio::test]
    async fn test_closed_mid_packet() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(&[15, 1, 0, 20, 0, 0, 0, 0, 1]).await.unwrap();
        drop(client);
        let mut reader = PacketReader::new(server);

        let err = reader.read_packet(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CodecError::Truncated { received: 9 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let (_client, server) = tokio::io::duplex(64);
        let mut reader = PacketReader::new(server);

        let err = reader
            .read_packet(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_header_split_across_reads() {
        let transport = tokio_test::io::Builder::new()
            .read(&[15, 1, 0])
            .read(&[11, 0, 2, 7, 0, b'a'])
            .read(b"bc")
            .build();
        let mut reader = PacketReader::new(transport);

        let packet = reader.read_packet(Duration::from_secs(1)).await.unwrap();
        assert_eq!(packet.header.message_type, MessageType::Normal);
        assert_eq!(packet.header.channel, 2);
        assert_eq!(&packet.data[..], b"abc");
    }

    #[tokio::test]
    async fn test_written_bytes() {
        let transport = tokio_test::io::Builder::new()
            .write(&[15, 1, 0, 11, 0, 2, 7, 0, b'o', b'n', b'e'])
            .build();
        let mut writer = PacketWriter::new(transport);

        writer.write_packets([packet(b"one")]).await.unwrap();
    }
}
