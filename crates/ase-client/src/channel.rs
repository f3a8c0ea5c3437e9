//! Logical channels multiplexed over one connection.
//!
//! A [`Channel`] is the unit consumers talk to the server through. Outbound
//! packages are encoded into a packet queue and written by the calling
//! task. Inbound packets are decoded by the connection's reader task,
//! which hands finished packages to the channel through a bounded queue.
//!
//! ## Lifecycle
//!
//! ```text
//! setup (non-zero IDs) → ready → send/receive cycles → closing → closed
//! ```
//!
//! Channel 0 needs no setup and ends with a logout. Other channels are set
//! up and torn down with header-only packets.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ase_protocol::package::{
    DonePackage, EedPackage, EnvChangePackage, EnvChangeType, HeaderOnlyPackage, LogoutPackage,
};
use ase_protocol::packet::{MessageType, Packet};
use ase_protocol::{Package, PacketQueue, ProtocolError};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::connection::Shared;
use crate::error::{EedError, Error, Result};

/// Callback for environment changes: variable, old value, new value.
pub type EnvChangeHook = Box<dyn Fn(EnvChangeType, &str, &str) + Send + Sync>;

/// Callback for extended error data that is not informational.
pub type EedHook = Box<dyn Fn(&EedPackage) + Send + Sync>;

type Item = Result<Package>;

/// A logical channel of a connection.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

pub(crate) struct ChannelInner {
    id: u16,
    conn: Arc<Shared>,
    /// Set once the close sequence has started.
    closing: AtomicBool,
    /// Whether the reader still delivers packets to this channel.
    receiving: AtomicBool,
    /// Users hold the read side while sending or receiving; close takes
    /// the write side to fence them out.
    closed: RwLock<bool>,
    /// Cancelled by close to release receivers blocked on the inbox.
    release: CancellationToken,
    header_type: parking_lot::Mutex<MessageType>,
    tx: Mutex<TxState>,
    rx: Mutex<RxState>,
    inbox: Mutex<Inbox>,
    packages: mpsc::Sender<Item>,
    env_change_hooks: parking_lot::Mutex<Vec<EnvChangeHook>>,
    eed_hooks: parking_lot::Mutex<Vec<EedHook>>,
}

struct TxState {
    queue: PacketQueue,
    packet_nr: u8,
    window: u8,
}

struct RxState {
    queue: PacketQueue,
    /// Context for packages that refer to their predecessor. Kept across
    /// messages.
    last: Option<Package>,
    /// Whether the last package of the current message was a final DONE.
    done_final: bool,
    /// Skip packets until the end of a message that failed to decode.
    discarding: bool,
}

struct Inbox {
    packages: mpsc::Receiver<Item>,
    errors: broadcast::Receiver<Arc<Error>>,
}

enum Decoded {
    Package(Package),
    Swallowed(Option<Error>),
    Incomplete,
    EndOfMessage,
    Failed(Error),
}

impl ChannelInner {
    pub(crate) fn new(id: u16, conn: Arc<Shared>) -> Arc<Self> {
        let (packages, receiver) = mpsc::channel(conn.config.channel_package_queue_size.max(1));
        let endian = conn.config.endian;
        let inbox = Inbox {
            packages: receiver,
            errors: conn.subscribe(),
        };

        Arc::new(Self {
            id,
            closing: AtomicBool::new(false),
            receiving: AtomicBool::new(true),
            closed: RwLock::new(false),
            release: CancellationToken::new(),
            header_type: parking_lot::Mutex::new(MessageType::Normal),
            tx: Mutex::new(TxState {
                queue: PacketQueue::new(conn.packet_size.clone(), endian),
                packet_nr: 0,
                window: 0,
            }),
            rx: Mutex::new(RxState {
                queue: PacketQueue::new(conn.packet_size.clone(), endian),
                last: None,
                done_final: false,
                discarding: false,
            }),
            inbox: Mutex::new(inbox),
            packages,
            env_change_hooks: parking_lot::Mutex::new(Vec::new()),
            eed_hooks: parking_lot::Mutex::new(Vec::new()),
            conn,
        })
    }

    pub(crate) fn id(&self) -> u16 {
        self.id
    }

    /// Decode and deliver the packages completed by `packet`.
    ///
    /// Runs on the connection's reader task.
    pub(crate) async fn receive_packet(&self, packet: Packet) {
        if !self.receiving.load(Ordering::Acquire) {
            tracing::trace!(channel = self.id, "dropping packet for closed channel");
            return;
        }

        if packet.is_header_only() {
            let package = Package::HeaderOnly(HeaderOnlyPackage {
                header: packet.header,
            });
            self.log_rx(&package);
            self.deliver(Ok(package)).await;
            return;
        }

        let mut rx = self.rx.lock().await;
        if rx.discarding {
            rx.discarding = !packet.header.is_eom();
            return;
        }
        rx.queue.add_packet(packet);

        loop {
            let position = rx.queue.position();
            match self.try_decode(&mut rx) {
                Decoded::Package(package) => {
                    rx.queue.discard_until_current_position();
                    rx.done_final = package.is_done_final();
                    rx.last = Some(package.clone());
                    self.deliver(Ok(package)).await;
                }
                Decoded::Swallowed(error) => {
                    rx.queue.discard_until_current_position();
                    if let Some(error) = error {
                        self.deliver(Err(self.channel_error(error))).await;
                    }
                }
                Decoded::Incomplete => {
                    rx.queue.set_position(position);
                    return;
                }
                Decoded::EndOfMessage => {
                    rx.queue.reset();
                    // Servers only send a final DONE for some commands, the
                    // end of the message stands in for it otherwise.
                    if !std::mem::take(&mut rx.done_final) {
                        self.deliver(Ok(Package::Done(DonePackage::final_done())))
                            .await;
                    }
                    return;
                }
                Decoded::Failed(error) => {
                    rx.discarding = !rx.queue.received_eom();
                    rx.done_final = false;
                    rx.queue.reset();
                    self.deliver(Err(self.channel_error(error))).await;
                    return;
                }
            }
        }
    }

    fn try_decode(&self, rx: &mut RxState) -> Decoded {
        if rx.queue.all_packets_consumed() {
            return if rx.queue.is_eom() {
                Decoded::EndOfMessage
            } else {
                Decoded::Incomplete
            };
        }

        let package = match Package::decode(&mut rx.queue, rx.last.as_ref()) {
            Ok(package) => package,
            Err(ProtocolError::NotEnoughBytes) if rx.queue.received_eom() => {
                return Decoded::Failed(Error::TruncatedMessage);
            }
            Err(ProtocolError::NotEnoughBytes) => return Decoded::Incomplete,
            Err(e) => return Decoded::Failed(e.into()),
        };
        self.log_rx(&package);

        match &package {
            Package::EnvChange(env_change) => {
                Decoded::Swallowed(self.apply_env_change(env_change).err())
            }
            Package::Eed(eed) if eed.is_info() => Decoded::Swallowed(None),
            Package::Eed(eed) => {
                for hook in self.eed_hooks.lock().iter() {
                    hook(eed);
                }
                Decoded::Package(package)
            }
            _ => Decoded::Package(package),
        }
    }

    fn apply_env_change(&self, env_change: &EnvChangePackage) -> Result<()> {
        for member in &env_change.members {
            if member.kind == EnvChangeType::PacketSize {
                let size = member
                    .new_value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidPacketSize(member.new_value.clone()))?;
                self.conn.packet_size.set(size);
                tracing::debug!(channel = self.id, size, "packet size changed");
            }

            for hook in self.env_change_hooks.lock().iter() {
                hook(member.kind, &member.old_value, &member.new_value);
            }
        }
        Ok(())
    }

    async fn deliver(&self, item: Item) {
        // Fails only once the channel is closed.
        let _ = self.packages.send(item).await;
    }

    fn channel_error(&self, error: Error) -> Error {
        Error::Channel {
            channel: self.id,
            source: Box::new(error),
        }
    }

    fn log_rx(&self, package: &Package) {
        if self.conn.config.debug_log_packages {
            tracing::debug!(channel = self.id, "RX: {package}");
        }
    }
}

impl Channel {
    pub(crate) fn from_inner(inner: Arc<ChannelInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.inner.conn
    }

    /// Channel ID.
    #[must_use]
    pub fn id(&self) -> u16 {
        self.inner.id
    }

    /// Whether the channel has been closed or is closing.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// Message type set on outgoing packets.
    #[must_use]
    pub fn current_header_type(&self) -> MessageType {
        *self.inner.header_type.lock()
    }

    /// Set the message type of outgoing packets until the next reset.
    pub fn set_current_header_type(&self, message_type: MessageType) {
        *self.inner.header_type.lock() = message_type;
    }

    /// Register a callback for environment changes.
    ///
    /// Callbacks run on the connection's reader task in registration
    /// order and must not block.
    pub fn register_env_change_hook<F>(&self, hook: F)
    where
        F: Fn(EnvChangeType, &str, &str) + Send + Sync + 'static,
    {
        self.inner.env_change_hooks.lock().push(Box::new(hook));
    }

    /// Register a callback for extended error data.
    ///
    /// Informational messages are swallowed before callbacks run.
    pub fn register_eed_hook<F>(&self, hook: F)
    where
        F: Fn(&EedPackage) + Send + Sync + 'static,
    {
        self.inner.eed_hooks.lock().push(Box::new(hook));
    }

    /// Prepare the channel for the next message.
    pub async fn reset(&self) {
        let closed = self.inner.closed.read().await;
        if *closed {
            return;
        }
        self.set_current_header_type(MessageType::Normal);
        self.inner.tx.lock().await.queue.reset();
    }

    /// Encode `package` for transmission.
    ///
    /// Packets filled completely are sent right away, the last one stays
    /// queued until [`send_remaining_packets`](Self::send_remaining_packets).
    pub async fn queue_package(&self, package: &Package) -> Result<()> {
        let closed = self.inner.closed.read().await;
        if *closed {
            return Err(self.closed_error());
        }

        let mut tx = self.inner.tx.lock().await;
        if let Err(e) = package.encode(&mut tx.queue) {
            // A partially encoded package cannot be sent.
            tx.queue.reset();
            return Err(e.into());
        }
        if self.inner.conn.config.debug_log_packages {
            tracing::debug!(channel = self.id(), "TX: {package}");
        }

        let packets = tx.queue.take_packets(false);
        self.write(&mut tx, packets).await
    }

    /// Send every queued packet, marking the last one as the end of the
    /// message, and reset the channel.
    pub async fn send_remaining_packets(&self) -> Result<()> {
        let result = {
            let closed = self.inner.closed.read().await;
            if *closed {
                return Err(self.closed_error());
            }

            let mut tx = self.inner.tx.lock().await;
            let packets = tx.queue.take_packets(true);
            self.write(&mut tx, packets).await
        };

        self.reset().await;
        result
    }

    /// Queue `package` and send it together with everything queued before.
    pub async fn send_package(&self, package: &Package) -> Result<()> {
        self.queue_package(package).await?;
        self.send_remaining_packets().await
    }

    /// Send a single prepared packet, such as a header-only packet.
    pub(crate) async fn send_packet(&self, packet: Packet) -> Result<()> {
        let mut tx = self.inner.tx.lock().await;
        self.write(&mut tx, vec![packet]).await
    }

    async fn write(&self, tx: &mut TxState, mut packets: Vec<Packet>) -> Result<()> {
        if packets.is_empty() {
            return Ok(());
        }

        let message_type = self.current_header_type();
        for packet in &mut packets {
            packet.header.message_type = message_type;
            // Channel 0 carries neither sequence numbers nor a window.
            if self.inner.id > 0 {
                packet.header.channel = self.inner.id;
                packet.header.packet_nr = tx.packet_nr;
                packet.header.window = tx.window;
                tx.packet_nr = tx.packet_nr.wrapping_add(1);
            }
        }

        self.inner.conn.write_packets(packets).await
    }

    /// Next decoded package.
    ///
    /// Without `blocking`, [`Error::NoPackageReady`] is returned when no
    /// package is queued. Connection errors reported since the last call
    /// are returned before waiting.
    pub async fn next_package(&self, blocking: bool) -> Result<Package> {
        self.receive(blocking, None).await
    }

    /// Like [`next_package`](Self::next_package), but gives up with
    /// [`Error::Cancelled`] once `cancel` fires.
    pub async fn next_package_with_cancel(
        &self,
        blocking: bool,
        cancel: &CancellationToken,
    ) -> Result<Package> {
        self.receive(blocking, Some(cancel)).await
    }

    async fn receive(&self, blocking: bool, cancel: Option<&CancellationToken>) -> Result<Package> {
        let closed = self.inner.closed.read().await;
        if *closed {
            return Err(self.closed_error());
        }

        let mut inbox = self.inner.inbox.lock().await;
        let Inbox { packages, errors } = &mut *inbox;

        if let Ok(item) = packages.try_recv() {
            return item;
        }

        let conn = &self.inner.conn;
        if !blocking {
            return match errors.try_recv() {
                Ok(error) => Err(Error::Connection(error)),
                Err(_) if conn.is_shut_down() => Err(conn.closed_error()),
                Err(_) => Err(Error::NoPackageReady),
            };
        }

        loop {
            tokio::select! {
                biased;
                item = packages.recv() => {
                    return item.unwrap_or_else(|| Err(self.closed_error()));
                }
                error = errors.recv() => match error {
                    Ok(error) => return Err(Error::Connection(error)),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(channel = self.id(), missed, "missed connection errors");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(conn.closed_error()),
                },
                () = conn.shutdown_signal() => return Err(conn.closed_error()),
                () = self.inner.release.cancelled() => return Err(self.closed_error()),
                () = cancelled(cancel) => return Err(Error::Cancelled),
            }
        }
    }

    /// Read packages until `process` returns `Ok(true)` and return the
    /// package that ended the loop.
    ///
    /// Extended error data packages are collected instead of being passed
    /// to `process`. When `process` fails, the rest of the message is
    /// drained so it cannot leak into the next operation, and the error is
    /// returned wrapped in [`Error::Processing`], inside an
    /// [`Error::Server`] when extended error data was received.
    ///
    /// `process` may return [`Error::eof()`] to stop at the end of a result
    /// set: the loop then returns [`Error::Eof`] carrying the current
    /// package, without draining.
    pub async fn next_package_until<F>(&self, blocking: bool, mut process: F) -> Result<Package>
    where
        F: FnMut(&Package) -> Result<bool>,
    {
        let mut eed_error = EedError::default();
        let mut blocking = blocking;

        loop {
            let package = self.next_package(blocking).await?;
            // Once a package arrived the rest of the message follows.
            blocking = true;

            let package = match package {
                Package::Eed(eed) => {
                    eed_error.add(eed);
                    continue;
                }
                package => package,
            };

            match process(&package) {
                Ok(true) => return Ok(package),
                Ok(false) => {}
                Err(Error::Eof(_)) => return Err(Error::Eof(Some(Box::new(package)))),
                Err(error) => {
                    if !package.is_done_final() {
                        match self.drain().await {
                            Ok(eeds) => eed_error.packages.extend(eeds),
                            Err(e) => {
                                tracing::warn!(channel = self.id(), error = %e, "failed to drain message");
                            }
                        }
                    }

                    let error = Error::Processing(Box::new(error));
                    if eed_error.packages.is_empty() {
                        return Err(error);
                    }
                    eed_error.source = Some(Box::new(error));
                    return Err(eed_error.into());
                }
            }
        }
    }

    /// Consume the rest of the current message, up to and including the
    /// final done, and return the extended error data it contained.
    pub async fn drain(&self) -> Result<Vec<EedPackage>> {
        let mut eeds = Vec::new();
        loop {
            match self.next_package(true).await? {
                Package::Eed(eed) => eeds.push(eed),
                package if package.is_done_final() => return Ok(eeds),
                _ => {}
            }
        }
    }

    /// Send the header-only setup packet and wait for the acknowledgment.
    pub(crate) async fn setup(&self) -> Result<()> {
        self.set_current_header_type(MessageType::Setup);
        self.send_packet(Packet::header_only(MessageType::Setup, self.id()))
            .await?;

        let timeout = self.inner.conn.config.packet_read_timeout;
        let package = tokio::time::timeout(timeout, self.next_package(true))
            .await
            .map_err(|_| Error::Timeout("channel setup"))??;

        match package {
            Package::HeaderOnly(ack) if ack.header.message_type.contains(MessageType::ProtAck) => {}
            Package::HeaderOnly(ack) => {
                return Err(Error::Login(format!(
                    "did not receive protocol acknowledgment for channel {}: {ack}",
                    self.id()
                )));
            }
            other => return Err(Error::unexpected("channel setup", "HeaderOnly", &other)),
        }

        self.reset().await;
        tracing::debug!(channel = self.id(), "channel set up");
        Ok(())
    }

    /// Run the logout sequence.
    ///
    /// Waits at most the configured logout timeout for the final done.
    pub async fn logout(&self) -> Result<()> {
        let timeout = self.inner.conn.config.logout_timeout;
        tokio::time::timeout(timeout, self.logout_sequence())
            .await
            .map_err(|_| Error::Timeout("logout"))?
    }

    async fn logout_sequence(&self) -> Result<()> {
        self.send_package(&Package::Logout(LogoutPackage)).await?;
        match self.next_package(true).await? {
            Package::Done(_) => {
                tracing::debug!(channel = self.id(), "logged out");
                Ok(())
            }
            other => Err(Error::unexpected("logout", "Done", &other)),
        }
    }

    /// Close the channel.
    ///
    /// Channel 0 logs out, other channels tear down with the server. The
    /// channel is closed on the client side even when this fails. Packages
    /// and errors still queued are returned as errors. Closing a closed
    /// channel does nothing.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut errors = Vec::new();
        if self.id() == 0 {
            if let Err(e) = self.logout().await {
                errors.push(e);
            }
        } else {
            self.teardown(&mut errors).await;
        }

        // Blocked receivers hold the read side.
        self.inner.release.cancel();
        let mut closed = self.inner.closed.write().await;
        *closed = true;
        self.inner.receiving.store(false, Ordering::Release);
        self.inner.conn.remove_channel(self.id());

        let mut inbox = self.inner.inbox.lock().await;
        inbox.packages.close();
        while let Ok(item) = inbox.packages.try_recv() {
            errors.push(match item {
                Ok(package) => Error::PackageStillQueued(Box::new(package)),
                Err(e) => Error::ErrorStillQueued(Box::new(e)),
            });
        }

        tracing::debug!(channel = self.id(), errors = errors.len(), "channel closed");
        Error::aggregate(errors)
    }

    /// Send the teardown packet and wait for the server's acknowledgment.
    ///
    /// Packages arriving before the acknowledgment are reported as still
    /// queued. A missing acknowledgment does not keep the channel open.
    async fn teardown(&self, errors: &mut Vec<Error>) {
        self.set_current_header_type(MessageType::Close);
        if let Err(e) = self
            .send_packet(Packet::header_only(MessageType::Close, self.id()))
            .await
        {
            errors.push(e);
            return;
        }

        let timeout = self.inner.conn.config.packet_read_timeout;
        let acknowledged = tokio::time::timeout(timeout, async {
            loop {
                match self.next_package(true).await {
                    Ok(Package::HeaderOnly(ack))
                        if ack.header.message_type.contains(MessageType::ProtAck) =>
                    {
                        return;
                    }
                    Ok(package) => errors.push(Error::PackageStillQueued(Box::new(package))),
                    Err(e) => {
                        errors.push(e);
                        return;
                    }
                }
            }
        })
        .await;

        if acknowledged.is_err() {
            tracing::warn!(channel = self.id(), "no teardown acknowledgment received");
        }
    }

    fn closed_error(&self) -> Error {
        Error::ChannelClosed { channel: self.id() }
    }
}

async fn cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .field("header_type", &self.current_header_type())
            .finish_non_exhaustive()
    }
}
