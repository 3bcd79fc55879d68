//! The SLIM endpoint — a single UDP socket speaking chunks and signals.
//!
//! One spawned task services the socket (see [`crate::dispatch`]); the
//! handle here is cheap to clone pieces of and safe to share. Packets
//! and signals fan out over broadcast channels, so any number of
//! consumers can subscribe without coordinating.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use slim_core::config::{SlimConfig, TransportConfig};
use slim_core::packet::{IncomingPacket, OutgoingPacket};
use slim_transport::chunk::chunkify;
use slim_transport::collector::ChunkCollector;
use slim_transport::signal::{IncomingSignal, Signal};

use crate::dispatch::Dispatcher;
use crate::error::SocketError;

/// Capacity of the packet and signal broadcast channels. Slow
/// subscribers past this depth observe a lag error, not backpressure.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A bound SLIM endpoint.
///
/// Dropping the endpoint (or calling [`close`](Self::close)) stops the
/// dispatch task and discards pending reassemblies. The endpoint is
/// single-use: once closed, every send fails with
/// [`SocketError::AlreadyClosed`].
pub struct SlimSocket {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    default_target: Option<SocketAddr>,
    packet_tx: broadcast::Sender<IncomingPacket>,
    signal_tx: broadcast::Sender<IncomingSignal>,
    shutdown_tx: broadcast::Sender<()>,
    closed: AtomicBool,
}

impl SlimSocket {
    /// Binds a server endpoint to the configured host and port.
    pub async fn bind(config: &SlimConfig) -> Result<Self, SocketError> {
        let socket = UdpSocket::bind((config.network.host.as_str(), config.network.port))
            .await
            .map_err(SocketError::BindFailed)?;
        Self::start(socket, None, &config.transport)
    }

    /// Binds a client endpoint to an ephemeral local port, remembering
    /// `remote` as the default send target.
    pub async fn connect(remote: SocketAddr) -> Result<Self, SocketError> {
        Self::connect_with(remote, &TransportConfig::default()).await
    }

    /// [`connect`](Self::connect) with explicit transport settings.
    pub async fn connect_with(
        remote: SocketAddr,
        transport: &TransportConfig,
    ) -> Result<Self, SocketError> {
        let local: SocketAddr = if remote.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(SocketError::BindFailed)?;
        Self::start(socket, Some(remote), transport)
    }

    fn start(
        socket: UdpSocket,
        default_target: Option<SocketAddr>,
        transport: &TransportConfig,
    ) -> Result<Self, SocketError> {
        let local_addr = socket.local_addr().map_err(SocketError::BindFailed)?;
        let socket = Arc::new(socket);
        let (packet_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (signal_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let dispatcher = Dispatcher {
            socket: socket.clone(),
            collector: ChunkCollector::new(transport.reassembly_timeout()),
            packet_tx: packet_tx.clone(),
            signal_tx: signal_tx.clone(),
            shutdown: shutdown_rx,
            sweep_interval: transport.sweep_interval(),
            reject_on_timeout: transport.reject_on_timeout,
        };
        tokio::spawn(dispatcher.run());

        tracing::info!(addr = %local_addr, "slim endpoint ready");
        Ok(Self {
            socket,
            local_addr,
            default_target,
            packet_tx,
            signal_tx,
            shutdown_tx,
            closed: AtomicBool::new(false),
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The default peer of a client endpoint.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.default_target
    }

    fn ensure_open(&self) -> Result<(), SocketError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SocketError::AlreadyClosed);
        }
        Ok(())
    }

    /// Chunkifies `packet` and sends one datagram per chunk.
    pub async fn send(
        &self,
        target: SocketAddr,
        packet: &OutgoingPacket,
    ) -> Result<(), SocketError> {
        self.ensure_open()?;
        let chunks = chunkify(packet);
        tracing::debug!(
            snowflake = %packet.snowflake(),
            id = packet.id(),
            chunks = chunks.len(),
            target = %target,
            "sending packet"
        );
        for chunk in chunks {
            self.socket
                .send_to(&chunk.encode(), target)
                .await
                .map_err(SocketError::SendFailed)?;
        }
        Ok(())
    }

    /// Sends a packet to the default peer of a client endpoint.
    pub async fn send_to_peer(&self, packet: &OutgoingPacket) -> Result<(), SocketError> {
        let target = self.default_target.ok_or(SocketError::NotConnected)?;
        self.send(target, packet).await
    }

    /// Sends a signal to the default peer of a client endpoint.
    pub async fn send_signal_to_peer(&self, signal: &Signal) -> Result<(), SocketError> {
        let target = self.default_target.ok_or(SocketError::NotConnected)?;
        self.send_signal(target, signal).await
    }

    /// Sends a signal in a single datagram.
    pub async fn send_signal(
        &self,
        target: SocketAddr,
        signal: &Signal,
    ) -> Result<(), SocketError> {
        self.ensure_open()?;
        let wire = signal.pack()?;
        self.socket
            .send_to(&wire, target)
            .await
            .map_err(SocketError::SendFailed)?;
        Ok(())
    }

    /// A stream of reassembled incoming packets.
    pub fn packets(&self) -> broadcast::Receiver<IncomingPacket> {
        self.packet_tx.subscribe()
    }

    /// A stream of parsed incoming signals.
    pub fn signals(&self) -> broadcast::Receiver<IncomingSignal> {
        self.signal_tx.subscribe()
    }

    /// Registers a packet callback on its own task. A callback that
    /// panics kills only its task; other listeners keep receiving.
    pub fn listen<F>(&self, mut callback: F)
    where
        F: FnMut(IncomingPacket) + Send + 'static,
    {
        let mut rx = self.packet_tx.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(packet) => callback(packet),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "packet listener lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Stops the dispatch task and discards pending reassemblies.
    /// Idempotent; later sends fail with [`SocketError::AlreadyClosed`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(addr = %self.local_addr, "closing slim endpoint");
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for SlimSocket {
    fn drop(&mut self) {
        self.close();
    }
}
