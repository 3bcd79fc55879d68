//! Packet — an identified, body-carrying record.
//!
//! On the wire a packet is an envelope (magic, length varInt) around a
//! tagged snowflake, a tagged id varInt, and the self-describing body.
//! Outgoing packets own a [`FieldWriter`]; incoming packets expose a
//! [`FieldReader`] over an immutable body slice.

use std::net::SocketAddr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, PacketError};
use crate::reader::FieldReader;
use crate::snowflake::{Snowflake, SNOWFLAKE_LEN};
use crate::types::WireType;
use crate::varint;
use crate::writer::FieldWriter;

/// The 4-byte constant that opens every packet envelope.
pub const PACKET_MAGIC: u32 = 0x4D55_5354;

/// A packet under construction on the sending side.
#[derive(Debug)]
pub struct OutgoingPacket {
    id: u32,
    snowflake: Snowflake,
    body: FieldWriter,
}

impl OutgoingPacket {
    /// A new packet of the given application kind, with a fresh
    /// snowflake and an empty body.
    pub fn new(id: u32) -> Self {
        Self::with_snowflake(id, Snowflake::generate())
    }

    /// A new packet with a caller-chosen snowflake.
    pub fn with_snowflake(id: u32, snowflake: Snowflake) -> Self {
        Self {
            id,
            snowflake,
            body: FieldWriter::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn snowflake(&self) -> Snowflake {
        self.snowflake
    }

    /// The body writer. Fields written here travel with the packet.
    pub fn body_mut(&mut self) -> &mut FieldWriter {
        &mut self.body
    }

    pub fn body(&self) -> &FieldWriter {
        &self.body
    }

    /// Encodes the full envelope.
    ///
    /// The length varInt counts every byte after itself: the tagged
    /// snowflake, the tagged id varInt, and the body.
    pub fn pack(&self) -> Bytes {
        let body = self.body.as_bytes();
        let length = 1 + SNOWFLAKE_LEN + 1 + varint::varint_len(self.id) + body.len();

        let mut buf = BytesMut::with_capacity(5 + 1 + varint::varint_len(length as u32) + length);
        buf.put_u8(WireType::Magic.id());
        buf.put_u32(PACKET_MAGIC);
        buf.put_u8(WireType::VarInt.id());
        varint::write_varint(&mut buf, length as u32);
        buf.put_u8(WireType::FixedBytes.id());
        buf.put_slice(self.snowflake.as_bytes());
        buf.put_u8(WireType::VarInt.id());
        varint::write_varint(&mut buf, self.id);
        buf.put_slice(body);
        buf.freeze()
    }
}

/// A packet received and reassembled from a peer.
#[derive(Debug, Clone)]
pub struct IncomingPacket {
    sender: SocketAddr,
    id: u32,
    snowflake: Snowflake,
    body: Bytes,
}

impl IncomingPacket {
    /// Validates the envelope of a reassembled byte stream and returns
    /// the bytes after the length varInt.
    pub fn strip_envelope(bytes: &[u8]) -> Result<&[u8], PacketError> {
        if bytes.len() < 5
            || bytes[0] != WireType::Magic.id()
            || u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) != PACKET_MAGIC
        {
            return Err(PacketError::InvalidMagic);
        }
        if bytes.get(5) != Some(&WireType::VarInt.id()) {
            return Err(PacketError::BadLengthField);
        }
        let (declared, used) =
            varint::read_varint(&bytes[6..]).map_err(|_| PacketError::BadLengthField)?;
        let rest = &bytes[6 + used..];
        if rest.len() != declared as usize {
            return Err(PacketError::LengthMismatch {
                declared: declared as usize,
                actual: rest.len(),
            });
        }
        Ok(rest)
    }

    /// Parses the tagged snowflake and id; the remainder is the body.
    /// The caller has already stripped magic and length.
    pub fn parse(sender: SocketAddr, bytes: &[u8]) -> Result<Self, PacketError> {
        let mut reader = FieldReader::new(bytes);
        let snowflake_bytes = reader
            .read_fixed_bytes(SNOWFLAKE_LEN)?
            .ok_or(CodecError::TypeMismatch {
                expected: WireType::FixedBytes,
                actual: WireType::None,
            })?;
        let snowflake = Snowflake::from_slice(snowflake_bytes).ok_or(CodecError::ReadPastEnd)?;
        let id = reader.read_varint()?.ok_or(CodecError::TypeMismatch {
            expected: WireType::VarInt,
            actual: WireType::None,
        })?;
        let body = Bytes::copy_from_slice(reader.rest());
        Ok(Self {
            sender,
            id,
            snowflake,
            body,
        })
    }

    pub fn sender(&self) -> SocketAddr {
        self.sender
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn snowflake(&self) -> Snowflake {
        self.snowflake
    }

    /// The raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// A reader positioned at the first body field.
    pub fn reader(&self) -> FieldReader<'_> {
        FieldReader::new(&self.body)
    }
}
