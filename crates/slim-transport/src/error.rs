//! Error types for chunk parsing, reassembly, and the signal codec.
//!
//! Wire-facing errors carry the snowflake whenever the failing datagram
//! got far enough to reveal one, so the dispatcher can answer the
//! sender with a rejection signal naming the affected packet.

use thiserror::Error;

use slim_core::error::{CodecError, PacketError};
use slim_core::snowflake::Snowflake;

use crate::chunk::MAX_CHUNK_BODY_SIZE;
use crate::signal::RejectReason;

/// Errors raised while parsing an incoming chunk datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ChunkError {
    /// The leading magic tag or constant is wrong.
    #[error("invalid chunk magic")]
    InvalidMagic,

    /// The length field is missing or mistagged.
    #[error("bad chunk length field")]
    BadLengthField,

    /// The declared body length exceeds the chunk body budget.
    #[error("chunk body length {0} exceeds maximum {MAX_CHUNK_BODY_SIZE}")]
    LengthExceedsMax(usize),

    /// The declared body length disagrees with the bytes present.
    #[error("chunk length {declared} disagrees with {actual} body bytes")]
    LengthMismatch {
        snowflake: Snowflake,
        declared: usize,
        actual: usize,
    },

    /// The body does not hash to the value in the header.
    #[error("chunk body hash mismatch")]
    HashMismatch { snowflake: Snowflake },

    /// The header tags or index/count fields are malformed.
    #[error("malformed chunk header")]
    InvalidChunk { snowflake: Option<Snowflake> },
}

impl ChunkError {
    /// The snowflake of the offending chunk, when the header got far
    /// enough to reveal it.
    pub fn snowflake(&self) -> Option<Snowflake> {
        match self {
            Self::LengthMismatch { snowflake, .. } | Self::HashMismatch { snowflake } => {
                Some(*snowflake)
            }
            Self::InvalidChunk { snowflake } => *snowflake,
            _ => None,
        }
    }

    /// The rejection reason a dispatcher reports for this failure.
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            Self::HashMismatch { .. } => RejectReason::ChunkHashMismatch,
            _ => RejectReason::InvalidChunk,
        }
    }
}

/// Errors raised while collecting chunks into a packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ReassemblyError {
    /// A chunk arrived from a different sender than the pending entry.
    /// The stored sender is never overwritten.
    #[error("chunk sender does not match the pending reassembly")]
    SenderMismatch { snowflake: Snowflake },

    /// A chunk declared a different total count than the pending entry.
    #[error("chunk count {actual} does not match the pending count {expected}")]
    CountMismatch {
        snowflake: Snowflake,
        expected: u32,
        actual: u32,
    },

    /// A chunk index at or past the declared count.
    #[error("chunk index {index} out of range for count {count}")]
    IndexOutOfRange {
        snowflake: Snowflake,
        index: u32,
        count: u32,
    },

    /// The fully reassembled byte stream failed to parse as a packet.
    #[error("reassembled packet failed to parse: {source}")]
    Packet {
        snowflake: Snowflake,
        source: PacketError,
    },
}

impl ReassemblyError {
    pub fn snowflake(&self) -> Snowflake {
        match self {
            Self::SenderMismatch { snowflake }
            | Self::CountMismatch { snowflake, .. }
            | Self::IndexOutOfRange { snowflake, .. }
            | Self::Packet { snowflake, .. } => *snowflake,
        }
    }

    /// The rejection reason a dispatcher reports for this failure.
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            Self::SenderMismatch { .. }
            | Self::CountMismatch { .. }
            | Self::IndexOutOfRange { .. } => RejectReason::InvalidChunk,
            Self::Packet { source, .. } => match source {
                PacketError::BodyParseFailed(CodecError::TypeMismatch { .. }) => {
                    RejectReason::FieldTypeMismatch
                }
                PacketError::BodyParseFailed(CodecError::ValueOutOfRange) => {
                    RejectReason::BadFieldValue
                }
                _ => RejectReason::InvalidPacket,
            },
        }
    }
}

/// Errors raised while packing or parsing a signal datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SignalError {
    /// The leading magic tag or constant is wrong.
    #[error("invalid signal magic")]
    InvalidMagic,

    /// The length field is mistagged or disagrees with the datagram.
    #[error("bad signal length field")]
    BadLengthField,

    /// A framing tag byte is not where the layout requires it.
    #[error("malformed signal frame")]
    BadFrame,

    /// The datagram ends before the frame does.
    #[error("truncated signal")]
    Truncated,

    /// The hash does not cover the received type byte and body.
    #[error("signal hash mismatch")]
    HashMismatch,

    /// A type byte outside the signal table.
    #[error("unknown signal type 0x{0:02x}")]
    UnknownKind(u8),

    /// A rejection reason byte outside the rejection table.
    #[error("unknown rejection reason 0x{0:02x}")]
    UnknownReason(u8),

    /// Signal bodies are length-prefixed with one byte.
    #[error("signal body of {0} bytes exceeds the 255-byte limit")]
    BodyTooLarge(usize),

    /// A signal body failed to decode as SLIM fields.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
