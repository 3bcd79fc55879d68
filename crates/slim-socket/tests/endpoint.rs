//! Integration tests for the SLIM endpoint: real UDP socket pairs on
//! the loopback interface.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use slim_core::config::SlimConfig;
use slim_core::packet::{IncomingPacket, OutgoingPacket};
use slim_core::snowflake::Snowflake;
use slim_transport::chunk::{chunkify, MAX_CHUNK_BODY_SIZE};
use slim_transport::signal::{IncomingSignal, RejectReason, Signal, SignalKind};
use slim_socket::{SlimSocket, SocketError};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn loopback_config() -> SlimConfig {
    let mut config = SlimConfig::default();
    config.network.host = "127.0.0.1".to_string();
    config.network.port = 0;
    config
}

/// Binds a server on an OS-assigned loopback port.
async fn start_server() -> SlimSocket {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    SlimSocket::bind(&loopback_config())
        .await
        .expect("server should bind")
}

async fn recv_signal(rx: &mut broadcast::Receiver<IncomingSignal>) -> IncomingSignal {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for signal")
        .expect("signal stream should stay open")
}

async fn recv_packet(rx: &mut broadcast::Receiver<IncomingPacket>) -> IncomingPacket {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for packet")
        .expect("packet stream should stay open")
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let server = start_server().await;
    let client = SlimSocket::connect(server.local_addr())
        .await
        .expect("client should bind");

    let mut server_signals = server.signals();
    let mut client_signals = client.signals();

    client
        .send_signal(server.local_addr(), &Signal::ping())
        .await
        .expect("ping should send");

    // The server publishes the ping it received. The client bound to
    // the wildcard address, so only its port is comparable.
    let ping = recv_signal(&mut server_signals).await;
    assert_eq!(ping.kind, SignalKind::Ping);
    assert_eq!(ping.sender.port(), client.local_addr().port());

    // The client hears the pong the server sent back.
    let pong = recv_signal(&mut client_signals).await;
    assert_eq!(pong.kind, SignalKind::Pong);
    assert_eq!(pong.sender, server.local_addr());
}

#[tokio::test]
async fn small_packet_is_reassembled_and_acknowledged() {
    let server = start_server().await;
    let client = SlimSocket::connect(server.local_addr())
        .await
        .expect("client should bind");

    let mut server_packets = server.packets();
    let mut client_signals = client.signals();

    let mut packet = OutgoingPacket::new(0x02);
    packet.body_mut().write_string("Howdy!");
    client.send_to_peer(&packet).await.expect("send");

    let received = recv_packet(&mut server_packets).await;
    assert_eq!(received.id(), 0x02);
    assert_eq!(received.snowflake(), packet.snowflake());
    assert_eq!(received.sender().port(), client.local_addr().port());
    assert_eq!(received.reader().read_string().unwrap(), Some("Howdy!"));

    let ack = recv_signal(&mut client_signals).await;
    assert_eq!(ack.kind, SignalKind::Acknowledged);
    assert_eq!(ack.snowflake().unwrap(), Some(packet.snowflake()));
}

#[tokio::test]
async fn multi_chunk_packet_survives_the_wire() {
    let server = start_server().await;
    let client = SlimSocket::connect(server.local_addr())
        .await
        .expect("client should bind");

    let mut server_packets = server.packets();

    let blob: Vec<u8> = (0..MAX_CHUNK_BODY_SIZE * 3 + 500)
        .map(|i| (i % 251) as u8)
        .collect();
    let mut packet = OutgoingPacket::new(0x99);
    packet.body_mut().write_bytes(&blob);
    assert!(chunkify(&packet).len() > 3);

    client.send_to_peer(&packet).await.expect("send");

    let received = recv_packet(&mut server_packets).await;
    assert_eq!(received.id(), 0x99);
    assert_eq!(
        received.reader().read_bytes().unwrap(),
        Some(blob.as_slice())
    );
}

#[tokio::test]
async fn corrupted_chunk_is_rejected_with_reason() {
    let server = start_server().await;
    let raw = UdpSocket::bind("127.0.0.1:0").await.expect("raw bind");

    let mut packet = OutgoingPacket::new(0x07);
    packet.body_mut().write_string("garble me");
    let mut wire = chunkify(&packet).remove(0).encode().to_vec();
    let last = wire.len() - 1;
    wire[last] ^= 0x01;

    raw.send_to(&wire, server.local_addr()).await.expect("send");

    let mut buf = vec![0u8; 2048];
    let (len, from) = tokio::time::timeout(RECV_TIMEOUT, raw.recv_from(&mut buf))
        .await
        .expect("timed out waiting for rejection")
        .expect("recv");
    assert_eq!(from, server.local_addr());

    let rejection = IncomingSignal::parse(from, &buf[..len]).expect("rejection should parse");
    assert_eq!(rejection.kind, SignalKind::Rejected);
    assert_eq!(rejection.snowflake().unwrap(), Some(packet.snowflake()));
    assert_eq!(
        rejection.reject_reason().unwrap(),
        Some(RejectReason::ChunkHashMismatch)
    );
}

#[tokio::test]
async fn stalled_reassembly_times_out_with_rejection() {
    let mut config = loopback_config();
    config.transport.reassembly_timeout_secs = 1;
    config.transport.sweep_interval_secs = 1;
    let server = SlimSocket::bind(&config).await.expect("server should bind");
    let raw = UdpSocket::bind("127.0.0.1:0").await.expect("raw bind");

    // A two-chunk packet of which only the first chunk is delivered.
    let blob = vec![0x11u8; MAX_CHUNK_BODY_SIZE + 64];
    let mut packet = OutgoingPacket::new(0x31);
    packet.body_mut().write_bytes(&blob);
    let chunks = chunkify(&packet);
    assert_eq!(chunks.len(), 2);
    raw.send_to(&chunks[0].encode(), server.local_addr())
        .await
        .expect("send");

    let mut buf = vec![0u8; 2048];
    let (len, from) = tokio::time::timeout(RECV_TIMEOUT, raw.recv_from(&mut buf))
        .await
        .expect("timed out waiting for timeout rejection")
        .expect("recv");

    let rejection = IncomingSignal::parse(from, &buf[..len]).expect("rejection should parse");
    assert_eq!(rejection.kind, SignalKind::Rejected);
    assert_eq!(rejection.snowflake().unwrap(), Some(packet.snowflake()));
    assert_eq!(
        rejection.reject_reason().unwrap(),
        Some(RejectReason::Timeout)
    );
}

#[tokio::test]
async fn listener_callbacks_receive_packets() {
    let server = start_server().await;
    let client = SlimSocket::connect(server.local_addr())
        .await
        .expect("client should bind");

    let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    server.listen(move |packet| {
        sink.lock().unwrap().push(packet.id());
    });

    let packet = OutgoingPacket::new(0x44);
    client.send_to_peer(&packet).await.expect("send");

    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        if seen.lock().unwrap().as_slice() == [0x44] {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "listener never saw the packet"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn partial_acknowledgement_reaches_subscribers() {
    let server = start_server().await;
    let client = SlimSocket::connect(server.local_addr())
        .await
        .expect("client should bind");

    let mut server_signals = server.signals();
    let snowflake = Snowflake::generate();
    let signal = Signal::partially_acknowledged(snowflake, &[0, 3]).expect("small body");
    client.send_signal_to_peer(&signal).await.expect("send");

    let received = recv_signal(&mut server_signals).await;
    assert_eq!(received.kind, SignalKind::PartiallyAcknowledged);
    assert_eq!(received.snowflake().unwrap(), Some(snowflake));
    assert_eq!(received.missing_indices().unwrap(), Some(vec![0, 3]));
}

#[tokio::test]
async fn garbage_datagrams_are_ignored() {
    let server = start_server().await;
    let client = SlimSocket::connect(server.local_addr())
        .await
        .expect("client should bind");

    let raw = UdpSocket::bind("127.0.0.1:0").await.expect("raw bind");
    raw.send_to(b"not a slim datagram", server.local_addr())
        .await
        .expect("send");

    // The endpoint keeps working after garbage.
    let mut server_signals = server.signals();
    client
        .send_signal(server.local_addr(), &Signal::ping())
        .await
        .expect("ping");
    let ping = recv_signal(&mut server_signals).await;
    assert_eq!(ping.kind, SignalKind::Ping);
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let server = start_server().await;
    let client = SlimSocket::connect(server.local_addr())
        .await
        .expect("client should bind");

    client.close();
    client.close();

    let packet = OutgoingPacket::new(1);
    let err = client.send_to_peer(&packet).await.unwrap_err();
    assert!(matches!(err, SocketError::AlreadyClosed));

    let err = client
        .send_signal(server.local_addr(), &Signal::ping())
        .await
        .unwrap_err();
    assert!(matches!(err, SocketError::AlreadyClosed));
}

#[tokio::test]
async fn server_endpoint_has_no_default_peer() {
    let server = start_server().await;
    assert_eq!(server.peer_addr(), None);
    let packet = OutgoingPacket::new(1);
    let err = server.send_to_peer(&packet).await.unwrap_err();
    assert!(matches!(err, SocketError::NotConnected));
}

#[tokio::test]
async fn two_clients_reach_one_server_independently() {
    let server = start_server().await;
    let first = SlimSocket::connect(server.local_addr())
        .await
        .expect("first client");
    let second = SlimSocket::connect(server.local_addr())
        .await
        .expect("second client");

    let mut server_packets = server.packets();

    let packet_a = OutgoingPacket::new(0xA0);
    let packet_b = OutgoingPacket::new(0xB0);
    first.send_to_peer(&packet_a).await.expect("send a");
    let got_a = recv_packet(&mut server_packets).await;
    second.send_to_peer(&packet_b).await.expect("send b");
    let got_b = recv_packet(&mut server_packets).await;

    assert_eq!(got_a.id(), 0xA0);
    assert_eq!(got_a.sender().port(), first.local_addr().port());
    assert_eq!(got_b.id(), 0xB0);
    assert_eq!(got_b.sender().port(), second.local_addr().port());
}
