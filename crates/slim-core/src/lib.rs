//! slim-core — wire leaves shared by every SLIM crate: the tagged field
//! codec, variable-length integers, packet framing, snowflake
//! identifiers, and configuration.
//!
//! # Example
//! ```
//! use slim_core::{FieldReader, FieldWriter};
//!
//! let mut writer = FieldWriter::new();
//! writer.write_string("hello").write_varint(7);
//! let body = writer.finish();
//!
//! let mut reader = FieldReader::new(&body);
//! assert_eq!(reader.read_string().unwrap(), Some("hello"));
//! assert_eq!(reader.read_varint().unwrap(), Some(7));
//! ```

pub mod config;
pub mod error;
pub mod packet;
pub mod reader;
pub mod snowflake;
pub mod types;
pub mod varint;
pub mod writer;

pub use config::SlimConfig;
pub use error::{CodecError, PacketError};
pub use packet::{IncomingPacket, OutgoingPacket, PACKET_MAGIC};
pub use reader::FieldReader;
pub use snowflake::{Snowflake, SNOWFLAKE_LEN};
pub use types::WireType;
pub use writer::{ArrayBuilder, FieldWriter};
