//! Chunking — splitting packed packets into datagram-sized fragments.
//!
//! Every chunk is self-describing: a 44-byte header carrying the magic,
//! the body length, the parent packet's snowflake, an XXH3-64 of the
//! body, and the fragment index/count, followed by at most 980 body
//! bytes. A receiver can verify a chunk in isolation before feeding it
//! to the collector.

use std::net::SocketAddr;

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::const_assert_eq;

use slim_core::packet::OutgoingPacket;
use slim_core::snowflake::{Snowflake, SNOWFLAKE_LEN};
use slim_core::types::WireType;

use crate::error::ChunkError;
use crate::hash;

/// The 4-byte constant that opens every chunk datagram.
pub const CHUNK_MAGIC: u32 = 0x4752_5252;

/// Total size of a chunk datagram, header included.
pub const MAX_CHUNK_SIZE: usize = 1024;

/// Wire size of the chunk header.
pub const CHUNK_HEADER_SIZE: usize = 44;

/// Body bytes a single chunk can carry.
pub const MAX_CHUNK_BODY_SIZE: usize = MAX_CHUNK_SIZE - CHUNK_HEADER_SIZE;

/// Upper bound on the chunk count a peer may declare. Caps what a
/// single forged chunk can make the collector allocate (about 64 MiB
/// of reassembled packet).
pub const MAX_CHUNK_COUNT: u32 = 65_536;

// Header layout: magic (1+4), length (1+2), snowflake (1+16),
// hash (1+8), index (1+4), count (1+4).
const_assert_eq!(
    CHUNK_HEADER_SIZE,
    1 + 4 + 1 + 2 + 1 + SNOWFLAKE_LEN + 1 + 8 + 1 + 4 + 1 + 4
);
const_assert_eq!(MAX_CHUNK_BODY_SIZE, 980);

/// True when the datagram opens with the chunk magic.
pub fn is_chunk(bytes: &[u8]) -> bool {
    bytes.len() >= 5
        && bytes[0] == WireType::Magic.id()
        && u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) == CHUNK_MAGIC
}

/// One fragment of an outgoing packet, ready to encode.
#[derive(Debug, Clone)]
pub struct OutgoingChunk {
    pub snowflake: Snowflake,
    pub index: u32,
    pub count: u32,
    pub body: Bytes,
}

impl OutgoingChunk {
    /// Encodes the chunk datagram. The body hash is computed here.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(CHUNK_HEADER_SIZE + self.body.len());
        buf.put_u8(WireType::Magic.id());
        buf.put_u32(CHUNK_MAGIC);
        buf.put_u8(WireType::Short.id());
        buf.put_u16(self.body.len() as u16);
        buf.put_u8(WireType::FixedBytes.id());
        buf.put_slice(self.snowflake.as_bytes());
        buf.put_u8(WireType::FixedBytes.id());
        buf.put_u64(hash(&self.body));
        buf.put_u8(WireType::Integer.id());
        buf.put_u32(self.index);
        buf.put_u8(WireType::Integer.id());
        buf.put_u32(self.count);
        buf.put_slice(&self.body);
        buf.freeze()
    }
}

/// Splits a packet into chunks of at most [`MAX_CHUNK_BODY_SIZE`] body
/// bytes, all sharing the packet's snowflake.
pub fn chunkify(packet: &OutgoingPacket) -> Vec<OutgoingChunk> {
    let packed = packet.pack();
    let count = packed.len().div_ceil(MAX_CHUNK_BODY_SIZE);
    (0..count)
        .map(|index| {
            let start = index * MAX_CHUNK_BODY_SIZE;
            let end = (start + MAX_CHUNK_BODY_SIZE).min(packed.len());
            OutgoingChunk {
                snowflake: packet.snowflake(),
                index: index as u32,
                count: count as u32,
                body: packed.slice(start..end),
            }
        })
        .collect()
}

/// A chunk received from a peer, parsed and hash-verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingChunk {
    pub sender: SocketAddr,
    pub snowflake: Snowflake,
    pub hash: u64,
    pub index: u32,
    pub count: u32,
    pub body: Bytes,
}

impl IncomingChunk {
    /// Parses and validates a chunk datagram.
    ///
    /// Checks, in order: magic, length tag and bound, header tags,
    /// `index < count`, declared against actual body length, and the
    /// body hash.
    pub fn parse(sender: SocketAddr, bytes: &[u8]) -> Result<Self, ChunkError> {
        if !is_chunk(bytes) {
            return Err(ChunkError::InvalidMagic);
        }
        if bytes.len() < CHUNK_HEADER_SIZE {
            return Err(ChunkError::InvalidChunk { snowflake: None });
        }
        if bytes[5] != WireType::Short.id() {
            return Err(ChunkError::BadLengthField);
        }
        let declared = usize::from(u16::from_be_bytes([bytes[6], bytes[7]]));
        if declared > MAX_CHUNK_BODY_SIZE {
            return Err(ChunkError::LengthExceedsMax(declared));
        }
        if bytes[8] != WireType::FixedBytes.id() {
            return Err(ChunkError::InvalidChunk { snowflake: None });
        }
        let mut snowflake_bytes = [0u8; SNOWFLAKE_LEN];
        snowflake_bytes.copy_from_slice(&bytes[9..25]);
        let snowflake = Snowflake::from_bytes(snowflake_bytes);

        if bytes[25] != WireType::FixedBytes.id()
            || bytes[34] != WireType::Integer.id()
            || bytes[39] != WireType::Integer.id()
        {
            return Err(ChunkError::InvalidChunk {
                snowflake: Some(snowflake),
            });
        }
        let expected_hash = u64::from_be_bytes(bytes[26..34].try_into().unwrap());
        let index = u32::from_be_bytes(bytes[35..39].try_into().unwrap());
        let count = u32::from_be_bytes(bytes[40..44].try_into().unwrap());
        if count == 0 || count > MAX_CHUNK_COUNT || index >= count {
            return Err(ChunkError::InvalidChunk {
                snowflake: Some(snowflake),
            });
        }

        let body = &bytes[CHUNK_HEADER_SIZE..];
        if body.len() != declared {
            return Err(ChunkError::LengthMismatch {
                snowflake,
                declared,
                actual: body.len(),
            });
        }
        if hash(body) != expected_hash {
            return Err(ChunkError::HashMismatch { snowflake });
        }

        Ok(Self {
            sender,
            snowflake,
            hash: expected_hash,
            index,
            count,
            body: Bytes::copy_from_slice(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    fn small_packet() -> OutgoingPacket {
        let mut packet = OutgoingPacket::new(0x02);
        packet.body_mut().write_string("Howdy!");
        packet
    }

    #[test]
    fn small_packet_fits_one_chunk() {
        let packet = small_packet();
        let chunks = chunkify(&packet);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].count, 1);
        assert_eq!(chunks[0].body, packet.pack());
    }

    #[test]
    fn encoded_chunk_layout() {
        let packet = small_packet();
        let chunk = chunkify(&packet).remove(0);
        let wire = chunk.encode();

        assert_eq!(wire[0], 0xFF);
        assert_eq!(&wire[1..5], &[0x47, 0x52, 0x52, 0x52]);
        assert_eq!(wire[5], 0x03);
        let declared = u16::from_be_bytes([wire[6], wire[7]]) as usize;
        assert_eq!(declared, chunk.body.len());
        assert_eq!(&wire[9..25], packet.snowflake().as_bytes());
        assert_eq!(wire.len(), CHUNK_HEADER_SIZE + chunk.body.len());
    }

    #[test]
    fn chunk_bodies_concatenate_to_the_packed_packet() {
        let mut packet = OutgoingPacket::new(7);
        let blob = vec![0x5Au8; MAX_CHUNK_BODY_SIZE * 3 + 123];
        packet.body_mut().write_bytes(&blob);
        let packed = packet.pack();

        let chunks = chunkify(&packet);
        assert_eq!(chunks.len(), packed.len().div_ceil(MAX_CHUNK_BODY_SIZE));
        let mut joined = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index as usize, i);
            assert_eq!(chunk.count as usize, chunks.len());
            assert_eq!(chunk.snowflake, packet.snowflake());
            assert!(chunk.body.len() <= MAX_CHUNK_BODY_SIZE);
            joined.extend_from_slice(&chunk.body);
        }
        assert_eq!(joined, packed);
    }

    #[test]
    fn encode_parse_round_trip() {
        let packet = small_packet();
        let chunk = chunkify(&packet).remove(0);
        let wire = chunk.encode();

        let parsed = IncomingChunk::parse(sender(), &wire).unwrap();
        assert_eq!(parsed.snowflake, chunk.snowflake);
        assert_eq!(parsed.index, 0);
        assert_eq!(parsed.count, 1);
        assert_eq!(parsed.body, chunk.body);
        assert_eq!(parsed.hash, hash(&chunk.body));
    }

    #[test]
    fn parse_rejects_wrong_magic() {
        let wire = chunkify(&small_packet()).remove(0).encode();
        let mut bad = wire.to_vec();
        bad[3] ^= 0x01;
        assert_eq!(
            IncomingChunk::parse(sender(), &bad),
            Err(ChunkError::InvalidMagic)
        );
    }

    #[test]
    fn parse_rejects_corrupted_body() {
        let packet = small_packet();
        let wire = chunkify(&packet).remove(0).encode();
        let mut bad = wire.to_vec();
        *bad.last_mut().unwrap() ^= 0x01;
        let err = IncomingChunk::parse(sender(), &bad).unwrap_err();
        assert_eq!(
            err,
            ChunkError::HashMismatch {
                snowflake: packet.snowflake(),
            }
        );
        assert_eq!(err.snowflake(), Some(packet.snowflake()));
    }

    #[test]
    fn parse_rejects_oversized_length() {
        let wire = chunkify(&small_packet()).remove(0).encode();
        let mut bad = wire.to_vec();
        let huge = (MAX_CHUNK_BODY_SIZE as u16 + 1).to_be_bytes();
        bad[6] = huge[0];
        bad[7] = huge[1];
        assert_eq!(
            IncomingChunk::parse(sender(), &bad),
            Err(ChunkError::LengthExceedsMax(MAX_CHUNK_BODY_SIZE + 1))
        );
    }

    #[test]
    fn parse_rejects_length_mismatch() {
        let packet = small_packet();
        let wire = chunkify(&packet).remove(0).encode();
        let mut bad = wire.to_vec();
        bad.push(0xEE);
        assert!(matches!(
            IncomingChunk::parse(sender(), &bad),
            Err(ChunkError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn parse_rejects_index_out_of_count() {
        let packet = small_packet();
        let mut chunk = chunkify(&packet).remove(0);
        chunk.index = 1;
        let wire = chunk.encode();
        assert_eq!(
            IncomingChunk::parse(sender(), &wire),
            Err(ChunkError::InvalidChunk {
                snowflake: Some(packet.snowflake()),
            })
        );
    }

    #[test]
    fn parse_rejects_absurd_count() {
        let packet = small_packet();
        let mut chunk = chunkify(&packet).remove(0);
        chunk.index = 0;
        chunk.count = MAX_CHUNK_COUNT + 1;
        let wire = chunk.encode();
        assert_eq!(
            IncomingChunk::parse(sender(), &wire),
            Err(ChunkError::InvalidChunk {
                snowflake: Some(packet.snowflake()),
            })
        );
    }

    #[test]
    fn parse_rejects_truncated_header() {
        let wire = chunkify(&small_packet()).remove(0).encode();
        assert_eq!(
            IncomingChunk::parse(sender(), &wire[..20]),
            Err(ChunkError::InvalidChunk { snowflake: None })
        );
    }

    #[test]
    fn signal_magic_is_not_a_chunk() {
        let bytes = [0xFF, 0x4D, 0x45, 0x41, 0x54, 0x00];
        assert!(!is_chunk(&bytes));
    }
}
