//! Scripted mock ASE server.
//!
//! The server accepts a single connection and plays a [`Script`]: it
//! alternates between receiving client messages and sending prepared
//! responses. Everything the client sent is recorded and returned by
//! [`MockServer::finish`], so tests can inspect the exact packages.
//!
//! ```rust,ignore
//! let server = MockServer::start(
//!     Script::new()
//!         .receive()
//!         .send_header_only(1, MessageType::ProtAck),
//! )
//! .await?;
//! // connect a client to server.port() ...
//! let transcript = server.finish().await?;
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use ase_codec::{CodecError, PacketReader, PacketWriter};
use ase_protocol::package::DonePackage;
use ase_protocol::{
    DEFAULT_PACKET_SIZE, MessageType, Package, Packet, PacketHeader, PacketQueue, PacketSize,
    ProtocolError, Token,
};
use ase_types::Endian;
use thiserror::Error;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How long the server waits for the client before giving up.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for mock server operations.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A scripted package could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server task panicked or was aborted.
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for mock server operations.
pub type Result<T> = std::result::Result<T, MockServerError>;

/// One step of a script.
#[derive(Debug, Clone)]
pub enum Step {
    /// Read one client message, up to the packet marking its end.
    Receive,
    /// Send packages as one message.
    Send {
        /// Channel the packets are addressed to.
        channel: u16,
        /// Message type of the packets.
        message_type: MessageType,
        /// Packages in order.
        packages: Vec<Package>,
    },
    /// Send a packet without payload.
    SendHeaderOnly {
        /// Channel the packet is addressed to.
        channel: u16,
        /// Message type of the packet.
        message_type: MessageType,
    },
    /// Send prepared packets verbatim.
    SendPackets(Vec<Packet>),
    /// Wait before the next step.
    Pause(Duration),
    /// Close the connection.
    Close,
}

/// Steps the server plays in order.
#[derive(Debug, Clone)]
pub struct Script {
    steps: Vec<Step>,
    packet_size: usize,
    endian: Endian,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            packet_size: DEFAULT_PACKET_SIZE,
            endian: Endian::Little,
        }
    }
}

impl Script {
    /// Create an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the packets the server sends.
    #[must_use]
    pub fn packet_size(mut self, size: usize) -> Self {
        self.packet_size = size;
        self
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Receive one client message.
    #[must_use]
    pub fn receive(self) -> Self {
        self.step(Step::Receive)
    }

    /// Send `packages` on `channel` as a normal message.
    #[must_use]
    pub fn send(self, channel: u16, packages: Vec<Package>) -> Self {
        self.step(Step::Send {
            channel,
            message_type: MessageType::Normal,
            packages,
        })
    }

    /// Send a header-only packet.
    #[must_use]
    pub fn send_header_only(self, channel: u16, message_type: MessageType) -> Self {
        self.step(Step::SendHeaderOnly {
            channel,
            message_type,
        })
    }

    /// Close the connection.
    #[must_use]
    pub fn close(self) -> Self {
        self.step(Step::Close)
    }
}

/// A message received from the client.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Header of the first packet.
    pub header: PacketHeader,
    /// Headers of all packets in order.
    pub headers: Vec<PacketHeader>,
    /// Concatenated payload.
    pub payload: Vec<u8>,
}

impl ReceivedMessage {
    /// Whether the message was a single packet without payload.
    #[must_use]
    pub fn is_header_only(&self) -> bool {
        self.headers.len() == 1 && self.payload.is_empty()
    }

    /// Decode the payload into packages.
    pub fn packages(&self, endian: Endian) -> std::result::Result<Vec<Package>, ProtocolError> {
        self.packages_from(0, endian)
    }

    /// Decode the payload after the first `offset` bytes, for messages
    /// that start with a fixed-layout block such as the login record.
    pub fn packages_from(
        &self,
        offset: usize,
        endian: Endian,
    ) -> std::result::Result<Vec<Package>, ProtocolError> {
        let payload = self.payload.get(offset..).unwrap_or_default();
        let mut queue = PacketQueue::from_payload(payload, endian);
        let mut packages: Vec<Package> = Vec::new();
        while !queue.all_packets_consumed() {
            let package = Package::decode(&mut queue, packages.last())?;
            packages.push(package);
        }
        Ok(packages)
    }
}

/// A mock server playing one script for one connection.
pub struct MockServer {
    addr: SocketAddr,
    handle: Option<JoinHandle<Result<Vec<ReceivedMessage>>>>,
}

impl MockServer {
    /// Bind to an ephemeral local port and play `script` for the first
    /// client that connects.
    pub async fn start(script: Script) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!(%peer, "mock server accepted connection");
            play(stream, script).await
        });

        Ok(Self {
            addr,
            handle: Some(handle),
        })
    }

    /// Listening address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Host to connect to.
    #[must_use]
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Port to connect to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the script to end and return what the client sent.
    ///
    /// After the last step, messages are recorded until the client closes
    /// the connection.
    pub async fn finish(mut self) -> Result<Vec<ReceivedMessage>> {
        match self.handle.take() {
            Some(handle) => handle.await?,
            None => Ok(Vec::new()),
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

type Reader = PacketReader<ReadHalf<TcpStream>>;
type Writer = PacketWriter<WriteHalf<TcpStream>>;

async fn play(stream: TcpStream, script: Script) -> Result<Vec<ReceivedMessage>> {
    let (mut reader, mut writer) = ase_codec::split(stream);
    let packet_size = PacketSize::new(script.packet_size);
    let mut transcript = Vec::new();

    for step in script.steps {
        match step {
            Step::Receive => transcript.push(receive(&mut reader).await?),
            Step::Send {
                channel,
                message_type,
                packages,
            } => {
                let mut queue = PacketQueue::new(packet_size.clone(), script.endian);
                for package in &packages {
                    package.encode(&mut queue)?;
                }
                let mut packets = queue.take_packets(true);
                for (nr, packet) in packets.iter_mut().enumerate() {
                    packet.header.message_type = message_type;
                    packet.header.channel = channel;
                    packet.header.packet_nr = nr as u8;
                }
                writer.write_packets(packets).await?;
            }
            Step::SendHeaderOnly {
                channel,
                message_type,
            } => {
                writer
                    .write_packets([Packet::header_only(message_type, channel)])
                    .await?;
            }
            Step::SendPackets(packets) => writer.write_packets(packets).await?,
            Step::Pause(duration) => tokio::time::sleep(duration).await,
            Step::Close => {
                writer.shutdown().await?;
                return Ok(transcript);
            }
        }
    }

    drain(&mut reader, &mut writer, &mut transcript, &packet_size, script.endian).await;
    Ok(transcript)
}

/// Record messages until the client goes away.
async fn drain(
    reader: &mut Reader,
    writer: &mut Writer,
    transcript: &mut Vec<ReceivedMessage>,
    packet_size: &PacketSize,
    endian: Endian,
) {
    while let Ok(message) = receive(reader).await {
        // Acknowledge teardown and logout so closing clients finish.
        let reply = reply_to(&message, packet_size, endian);
        transcript.push(message);
        if let Some(reply) = reply {
            if writer.write_packets(reply).await.is_err() {
                return;
            }
        }
    }
}

fn reply_to(message: &ReceivedMessage, packet_size: &PacketSize, endian: Endian) -> Option<Vec<Packet>> {
    let channel = message.header.channel;
    if message.is_header_only() {
        return (message.header.message_type == MessageType::Close)
            .then(|| vec![Packet::header_only(MessageType::ProtAck, channel)]);
    }

    if message.payload.first() != Some(&Token::Logout.as_u8()) {
        return None;
    }
    let mut queue = PacketQueue::new(packet_size.clone(), endian);
    Package::Done(DonePackage::final_done()).encode(&mut queue).ok()?;
    let mut packets = queue.take_packets(true);
    for packet in &mut packets {
        packet.header.channel = channel;
    }
    Some(packets)
}

async fn receive(reader: &mut Reader) -> Result<ReceivedMessage> {
    let mut headers = Vec::new();
    let mut payload = Vec::new();
    loop {
        let packet = reader.read_packet(CLIENT_TIMEOUT).await?;
        let eom = packet.header.is_eom();
        headers.push(packet.header);
        payload.extend_from_slice(&packet.data);
        if eom {
            break;
        }
    }

    Ok(ReceivedMessage {
        header: headers[0],
        headers,
        payload,
    })
}
