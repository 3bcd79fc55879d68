//! slim-socket — the SLIM UDP endpoint.
//!
//! Binds one datagram socket, demultiplexes chunks and signals by
//! leading magic, reassembles packets, acknowledges them, and exposes
//! broadcast streams of both event kinds.
//!
//! # Example
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), slim_socket::SocketError> {
//! use slim_core::{OutgoingPacket, SlimConfig};
//! use slim_socket::SlimSocket;
//!
//! let server = SlimSocket::bind(&SlimConfig::default()).await?;
//! let client = SlimSocket::connect(server.local_addr()).await?;
//! let mut packets = server.packets();
//!
//! let mut packet = OutgoingPacket::new(1);
//! packet.body_mut().write_string("hello");
//! client.send_to_peer(&packet).await?;
//!
//! let received = packets.recv().await.expect("stream open");
//! assert_eq!(received.id(), 1);
//! # Ok(())
//! # }
//! ```

mod dispatch;
pub mod endpoint;
pub mod error;

pub use endpoint::SlimSocket;
pub use error::SocketError;
