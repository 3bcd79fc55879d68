//! The dispatch loop — one task owning the socket and the collector.
//!
//! Every datagram is routed by its leading magic: chunks feed the
//! collector, signals are answered (ping) and published, anything else
//! is dropped. Parse and reassembly failures that reveal a snowflake
//! are answered with a rejection signal; nothing malformed ever reaches
//! a subscriber.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use slim_core::packet::IncomingPacket;
use slim_core::snowflake::Snowflake;
use slim_transport::chunk::{is_chunk, IncomingChunk, MAX_CHUNK_SIZE};
use slim_transport::collector::ChunkCollector;
use slim_transport::signal::{is_signal, IncomingSignal, RejectReason, Signal, SignalKind};

pub(crate) struct Dispatcher {
    pub socket: Arc<UdpSocket>,
    pub collector: ChunkCollector,
    pub packet_tx: broadcast::Sender<IncomingPacket>,
    pub signal_tx: broadcast::Sender<IncomingSignal>,
    pub shutdown: broadcast::Receiver<()>,
    pub sweep_interval: Duration,
    pub reject_on_timeout: bool,
}

impl Dispatcher {
    pub(crate) async fn run(mut self) {
        let mut buf = vec![0u8; MAX_CHUNK_SIZE + 64];
        let mut sweep = tokio::time::interval(self.sweep_interval);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::debug!(
                        pending = self.collector.len(),
                        "dispatch loop shutting down"
                    );
                    return;
                }

                _ = sweep.tick() => {
                    self.sweep_reassemblies().await;
                }

                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => self.dispatch_datagram(&buf[..len], peer).await,
                    Err(e) => {
                        tracing::warn!(error = %e, "recv_from failed");
                    }
                },
            }
        }
    }

    async fn dispatch_datagram(&mut self, data: &[u8], peer: SocketAddr) {
        if is_chunk(data) {
            match IncomingChunk::parse(peer, data) {
                Ok(chunk) => self.accept_chunk(chunk).await,
                Err(e) => {
                    tracing::warn!(error = %e, peer = %peer, "dropping malformed chunk");
                    if let Some(snowflake) = e.snowflake() {
                        self.send_rejection(peer, snowflake, e.reject_reason()).await;
                    }
                }
            }
        } else if is_signal(data) {
            match IncomingSignal::parse(peer, data) {
                Ok(signal) => {
                    if signal.kind == SignalKind::Ping {
                        self.send_signal(peer, &Signal::pong()).await;
                    }
                    let _ = self.signal_tx.send(signal);
                }
                Err(e) => {
                    tracing::warn!(error = %e, peer = %peer, "dropping malformed signal");
                }
            }
        } else {
            tracing::trace!(len = data.len(), peer = %peer, "dropping unrecognized datagram");
        }
    }

    async fn accept_chunk(&mut self, chunk: IncomingChunk) {
        let peer = chunk.sender;
        match self.collector.add_chunk(chunk) {
            Ok(None) => {}
            Ok(Some(packet)) => {
                // The acknowledgement goes out before the packet event.
                self.send_signal(packet.sender(), &Signal::acknowledged(packet.snowflake()))
                    .await;
                tracing::debug!(
                    snowflake = %packet.snowflake(),
                    id = packet.id(),
                    body_len = packet.body().len(),
                    peer = %packet.sender(),
                    "packet reassembled"
                );
                let _ = self.packet_tx.send(packet);
            }
            Err(e) => {
                tracing::warn!(error = %e, peer = %peer, "chunk rejected during reassembly");
                self.send_rejection(peer, e.snowflake(), e.reject_reason())
                    .await;
            }
        }
    }

    async fn sweep_reassemblies(&mut self) {
        for expired in self.collector.sweep_expired(Instant::now()) {
            tracing::debug!(
                snowflake = %expired.snowflake,
                missing = expired.missing.len(),
                peer = %expired.sender,
                "reassembly timed out"
            );
            if self.reject_on_timeout {
                self.send_rejection(expired.sender, expired.snowflake, RejectReason::Timeout)
                    .await;
            }
        }
    }

    async fn send_rejection(&self, peer: SocketAddr, snowflake: Snowflake, reason: RejectReason) {
        self.send_signal(peer, &Signal::rejected(snowflake, Some(reason)))
            .await;
    }

    /// Sends a signal, logging rather than propagating failures; the
    /// dispatch loop must not die because a peer went away.
    async fn send_signal(&self, peer: SocketAddr, signal: &Signal) {
        match signal.pack() {
            Ok(wire) => {
                if let Err(e) = self.socket.send_to(&wire, peer).await {
                    tracing::warn!(error = %e, peer = %peer, "failed to send signal");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode signal");
            }
        }
    }
}
