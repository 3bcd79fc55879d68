//! Error types for the field codec and packet framing.

use thiserror::Error;

use crate::types::WireType;

/// Errors raised while encoding or decoding tagged field values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// A varInt carried set bits beyond 32-bit width.
    #[error("varint wider than 32 bits")]
    VarIntOverflow,

    /// A varLong carried set bits beyond 64-bit width.
    #[error("varlong wider than 64 bits")]
    VarLongOverflow,

    /// The leading type tag does not match the requested type.
    #[error("expected {expected:?} field, found {actual:?}")]
    TypeMismatch {
        expected: WireType,
        actual: WireType,
    },

    /// A wire value violates the range its type allows (e.g. a boolean
    /// byte that is neither 0 nor 1).
    #[error("value does not fit the declared field type")]
    ValueOutOfRange,

    /// A type tag byte that is not part of the registry.
    #[error("unknown data-type id 0x{0:02x}")]
    UnknownTypeId(u8),

    /// The cursor would move past the end of the buffer.
    #[error("read past the end of the buffer")]
    ReadPastEnd,

    /// A string field holds bytes that are not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidString,

    /// An array builder with a declared length was built with a
    /// different element count.
    #[error("array built with {actual} elements, expected {expected}")]
    ArrayLengthMismatch { expected: usize, actual: usize },
}

/// Errors raised while framing or unframing a packet envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PacketError {
    /// The leading magic tag or constant is wrong.
    #[error("invalid packet magic")]
    InvalidMagic,

    /// The length field is missing, mistagged, or unreadable.
    #[error("bad packet length field")]
    BadLengthField,

    /// The length varInt disagrees with the bytes actually present.
    #[error("packet length {declared} disagrees with {actual} remaining bytes")]
    LengthMismatch { declared: usize, actual: usize },

    /// The snowflake or id fields inside the envelope failed to decode.
    #[error("packet body parse failed: {0}")]
    BodyParseFailed(#[from] CodecError),
}
