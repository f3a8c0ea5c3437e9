//! Connection to an ASE server.
//!
//! A [`Connection`] owns the transport and a reader task. The reader pulls
//! packets off the wire and routes them to the channel whose ID is in the
//! packet header. Writers share the write half behind an async mutex, so
//! every channel can send while the reader is blocked.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use ase_codec::{PacketReader, PacketWriter};
use ase_protocol::package::CapabilityPackage;
use ase_protocol::{DEFAULT_PACKET_SIZE, Packet, PacketSize};
use ase_tls::TlsConnector;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use crate::channel::{Channel, ChannelInner};
use crate::config::Config;
use crate::error::{Error, Result};

/// Capacity of the connection error broadcast.
const ERROR_CAPACITY: usize = 10;

/// Byte stream a connection runs over.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

type BoxedTransport = Box<dyn Transport>;

/// State shared between the connection handle, its channels and the
/// reader task.
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) packet_size: PacketSize,
    writer: Mutex<PacketWriter<WriteHalf<BoxedTransport>>>,
    channels: parking_lot::Mutex<HashMap<u16, Arc<ChannelInner>>>,
    next_channel_id: AtomicU32,
    capabilities: parking_lot::RwLock<CapabilityPackage>,
    errors: broadcast::Sender<Arc<Error>>,
    shutdown: CancellationToken,
    /// Error that stopped the reader.
    failure: parking_lot::Mutex<Option<Arc<Error>>>,
}

impl Shared {
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Arc<Error>> {
        self.errors.subscribe()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) async fn shutdown_signal(&self) {
        self.shutdown.cancelled().await;
    }

    /// Error for operations on a connection that is no longer running.
    pub(crate) fn closed_error(&self) -> Error {
        match &*self.failure.lock() {
            Some(failure) => Error::Connection(Arc::clone(failure)),
            None => Error::ConnectionClosed,
        }
    }

    pub(crate) async fn write_packets(&self, packets: Vec<Packet>) -> Result<()> {
        if self.is_shut_down() {
            return Err(self.closed_error());
        }
        let mut writer = self.writer.lock().await;
        writer.write_packets(packets).await?;
        Ok(())
    }

    pub(crate) fn set_capabilities(&self, capabilities: CapabilityPackage) {
        *self.capabilities.write() = capabilities;
    }

    pub(crate) fn remove_channel(&self, id: u16) {
        self.channels.lock().remove(&id);
    }

    fn report(&self, error: Error) {
        // No receivers just means no channel is open.
        let _ = self.errors.send(Arc::new(error));
    }

    fn fail(&self, error: Error) {
        tracing::error!(error = %error, "connection reader stopped");
        self.failure.lock().get_or_insert_with(|| Arc::new(error));
        self.shutdown.cancel();
    }
}

/// A connection to an ASE server.
///
/// Dropping the connection stops the reader task without logging out;
/// call [`close`](Self::close) for an orderly shutdown.
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Connect to the server named in `config`.
    ///
    /// Wraps the TCP stream in TLS when the configuration asks for it.
    /// The connection is not logged in yet, see
    /// [`Channel::login`](crate::Channel::login).
    pub async fn connect(config: Config) -> Result<Self> {
        let address = format!("{}:{}", config.host, config.port);
        tracing::debug!(%address, tls = config.uses_tls(), "connecting");

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| Error::Timeout("connect"))??;
        stream.set_nodelay(true)?;

        if config.uses_tls() {
            let connector = TlsConnector::new(config.tls.clone())?;
            let stream =
                tokio::time::timeout(config.connect_timeout, connector.connect(stream, &config.host))
                    .await
                    .map_err(|_| Error::Timeout("TLS handshake"))??;
            return Ok(Self::from_transport(stream, config));
        }

        Ok(Self::from_transport(stream, config))
    }

    /// Run a connection over an established transport.
    ///
    /// Must be called within a Tokio runtime, the reader task is spawned
    /// right away.
    pub fn from_transport<T: Transport>(transport: T, config: Config) -> Self {
        let (reader, writer) = ase_codec::split(Box::new(transport) as BoxedTransport);
        let (errors, _) = broadcast::channel(ERROR_CAPACITY);

        let shared = Arc::new(Shared {
            config,
            packet_size: PacketSize::new(DEFAULT_PACKET_SIZE),
            writer: Mutex::new(writer),
            channels: parking_lot::Mutex::new(HashMap::new()),
            next_channel_id: AtomicU32::new(0),
            capabilities: parking_lot::RwLock::new(CapabilityPackage::client_default()),
            errors,
            shutdown: CancellationToken::new(),
            failure: parking_lot::Mutex::new(None),
        });

        tokio::spawn(read_loop(reader, Arc::clone(&shared)));
        Self { shared }
    }

    /// Open a new channel.
    ///
    /// The first channel gets ID 0 and needs no setup. Later channels are
    /// set up with the server before they are returned.
    pub async fn new_channel(&self) -> Result<Channel> {
        if self.shared.is_shut_down() {
            return Err(self.shared.closed_error());
        }

        let channel = self.register_channel()?;
        if channel.id() > 0 {
            if let Err(e) = channel.setup().await {
                self.shared.remove_channel(channel.id());
                return Err(e);
            }
        }
        Ok(channel)
    }

    /// Channel 0, registering it if no channel was opened yet.
    ///
    /// Channel 0 is the one login and logout run on.
    pub async fn primary_channel(&self) -> Result<Channel> {
        let primary = self.shared.channels.lock().get(&0).cloned();
        match primary {
            Some(inner) => Ok(Channel::from_inner(inner)),
            None => self.new_channel().await,
        }
    }

    fn register_channel(&self) -> Result<Channel> {
        let mut channels = self.shared.channels.lock();
        loop {
            let id = self.shared.next_channel_id.fetch_add(1, Ordering::Relaxed);
            let id = u16::try_from(id).map_err(|_| Error::ChannelIdsExhausted)?;
            if channels.contains_key(&id) {
                continue;
            }

            let inner = ChannelInner::new(id, Arc::clone(&self.shared));
            channels.insert(id, Arc::clone(&inner));
            tracing::trace!(channel = id, "channel registered");
            return Ok(Channel::from_inner(inner));
        }
    }

    /// Current packet size, including the header.
    #[must_use]
    pub fn packet_size(&self) -> usize {
        self.shared.packet_size.get()
    }

    /// Payload bytes per packet.
    #[must_use]
    pub fn packet_body_size(&self) -> usize {
        self.shared.packet_size.body_size()
    }

    /// Capabilities agreed with the server.
    #[must_use]
    pub fn capabilities(&self) -> CapabilityPackage {
        self.shared.capabilities.read().clone()
    }

    /// Configuration the connection was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Whether the connection stopped, either by closing or by a transport
    /// failure.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_shut_down()
    }

    /// Close every channel, then the transport.
    ///
    /// Channel 0 is closed last, so the logout is the final exchange.
    /// Errors of all steps are collected into one.
    pub async fn close(self) -> Result<()> {
        let mut channels: Vec<_> = self.shared.channels.lock().values().cloned().collect();
        channels.sort_by_key(|inner| std::cmp::Reverse(inner.id()));

        let mut errors = Vec::new();
        for inner in channels {
            let channel = Channel::from_inner(inner);
            if let Err(e) = channel.close().await {
                errors.push(Error::Channel {
                    channel: channel.id(),
                    source: Box::new(e),
                });
            }
        }

        self.shared.shutdown.cancel();
        if let Err(e) = self.shared.writer.lock().await.shutdown().await {
            errors.push(e.into());
        }

        tracing::debug!(errors = errors.len(), "connection closed");
        Error::aggregate(errors)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        // Channels hold the shared state, the table holds the channels.
        self.shared.channels.lock().clear();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.shared.config.host)
            .field("port", &self.shared.config.port)
            .field("packet_size", &self.packet_size())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

async fn read_loop(mut reader: PacketReader<ReadHalf<BoxedTransport>>, shared: Arc<Shared>) {
    let timeout = shared.config.packet_read_timeout;
    loop {
        let packet = tokio::select! {
            () = shared.shutdown.cancelled() => break,
            packet = reader.read_packet(timeout) => packet,
        };

        let packet = match packet {
            Ok(packet) => packet,
            // The timeout bounds a single wait, idle connections are fine.
            Err(ase_codec::CodecError::Timeout(_)) => continue,
            Err(e) => {
                shared.fail(e.into());
                break;
            }
        };

        let id = packet.header.channel;
        let channel = shared.channels.lock().get(&id).cloned();
        match channel {
            Some(channel) => channel.receive_packet(packet).await,
            None => {
                tracing::warn!(channel = id, "received packet for unknown channel");
                shared.report(Error::UnknownChannel(id));
            }
        }
    }
    tracing::trace!("connection reader finished");
}

impl Channel {
    /// Replace the connection's capabilities with the ones the server
    /// echoed during login.
    pub(crate) fn adopt_capabilities(&self, capabilities: CapabilityPackage) {
        self.shared().set_capabilities(capabilities);
    }

    /// Capabilities currently agreed with the server.
    pub(crate) fn capabilities(&self) -> CapabilityPackage {
        self.shared().capabilities.read().clone()
    }
}
