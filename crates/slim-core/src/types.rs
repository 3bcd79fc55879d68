//! Data-type registry — the closed set of wire type tags.
//!
//! Every field value on the wire is introduced by one of these 1-byte
//! ids. Changing an id after release is a breaking wire change.

use crate::error::CodecError;

/// A wire type tag.
///
/// The four integer widths exist in unsigned and signed variants; the
/// signed id is the unsigned id with the 0xA0 bits set. `fixedBytes` and
/// `magic` introduce values whose length is known from context rather
/// than from a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    None = 0x00,
    Boolean = 0x01,
    Byte = 0x02,
    Short = 0x03,
    Integer = 0x04,
    Long = 0x05,
    Float = 0x06,
    Double = 0x07,
    VarInt = 0x08,
    VarLong = 0x09,
    String = 0x20,
    Bytes = 0x21,
    Array = 0x22,
    SignedByte = 0xA2,
    SignedShort = 0xA3,
    SignedInteger = 0xA4,
    SignedLong = 0xA5,
    FixedBytes = 0xFE,
    Magic = 0xFF,
}

impl WireType {
    /// Parses a type tag from a raw byte.
    pub fn from_id(id: u8) -> Result<Self, CodecError> {
        match id {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::Boolean),
            0x02 => Ok(Self::Byte),
            0x03 => Ok(Self::Short),
            0x04 => Ok(Self::Integer),
            0x05 => Ok(Self::Long),
            0x06 => Ok(Self::Float),
            0x07 => Ok(Self::Double),
            0x08 => Ok(Self::VarInt),
            0x09 => Ok(Self::VarLong),
            0x20 => Ok(Self::String),
            0x21 => Ok(Self::Bytes),
            0x22 => Ok(Self::Array),
            0xA2 => Ok(Self::SignedByte),
            0xA3 => Ok(Self::SignedShort),
            0xA4 => Ok(Self::SignedInteger),
            0xA5 => Ok(Self::SignedLong),
            0xFE => Ok(Self::FixedBytes),
            0xFF => Ok(Self::Magic),
            other => Err(CodecError::UnknownTypeId(other)),
        }
    }

    /// The stable 1-byte wire id.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Payload size in bytes, for types whose size does not depend on
    /// the value. `None` for variable-length and context-sized types.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::None => Some(0),
            Self::Boolean | Self::Byte | Self::SignedByte => Some(1),
            Self::Short | Self::SignedShort => Some(2),
            Self::Integer | Self::SignedInteger | Self::Float => Some(4),
            Self::Long | Self::SignedLong | Self::Double => Some(8),
            Self::Magic => Some(4),
            _ => None,
        }
    }

    /// True for the four signed integer variants.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::SignedByte | Self::SignedShort | Self::SignedInteger | Self::SignedLong
        )
    }

    /// The signed counterpart of an unsigned integer width.
    ///
    /// byte↔signedByte, short↔signedShort, integer↔signedInteger,
    /// long↔signedLong. `None` for types without a signed variant.
    pub fn signed_variant(self) -> Option<Self> {
        match self {
            Self::Byte => Some(Self::SignedByte),
            Self::Short => Some(Self::SignedShort),
            Self::Integer => Some(Self::SignedInteger),
            Self::Long => Some(Self::SignedLong),
            _ => None,
        }
    }

    /// The unsigned counterpart of a signed integer width.
    pub fn unsigned_variant(self) -> Option<Self> {
        match self {
            Self::SignedByte => Some(Self::Byte),
            Self::SignedShort => Some(Self::Short),
            Self::SignedInteger => Some(Self::Integer),
            Self::SignedLong => Some(Self::Long),
            _ => None,
        }
    }
}

impl From<WireType> for u8 {
    fn from(t: WireType) -> u8 {
        t.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for id in 0u8..=255 {
            if let Ok(t) = WireType::from_id(id) {
                assert_eq!(t.id(), id);
            }
        }
    }

    #[test]
    fn unknown_ids_rejected() {
        assert_eq!(WireType::from_id(0x0A), Err(CodecError::UnknownTypeId(0x0A)));
        assert_eq!(WireType::from_id(0xA0), Err(CodecError::UnknownTypeId(0xA0)));
        assert_eq!(WireType::from_id(0x23), Err(CodecError::UnknownTypeId(0x23)));
    }

    #[test]
    fn signed_variant_table_is_faithful() {
        assert_eq!(WireType::Byte.signed_variant(), Some(WireType::SignedByte));
        assert_eq!(WireType::Short.signed_variant(), Some(WireType::SignedShort));
        assert_eq!(
            WireType::Integer.signed_variant(),
            Some(WireType::SignedInteger)
        );
        // The long width maps to signedLong, not signedInteger.
        assert_eq!(WireType::Long.signed_variant(), Some(WireType::SignedLong));
        assert_eq!(WireType::String.signed_variant(), None);
    }

    #[test]
    fn unsigned_variant_inverts_signed() {
        for t in [
            WireType::Byte,
            WireType::Short,
            WireType::Integer,
            WireType::Long,
        ] {
            let signed = t.signed_variant().unwrap();
            assert!(signed.is_signed());
            assert_eq!(signed.unsigned_variant(), Some(t));
        }
    }

    #[test]
    fn signed_ids_carry_the_sign_bits() {
        for t in [
            WireType::SignedByte,
            WireType::SignedShort,
            WireType::SignedInteger,
            WireType::SignedLong,
        ] {
            assert_eq!(t.id() & 0xA0, 0xA0);
            assert_eq!(t.id() & !0xA0, t.unsigned_variant().unwrap().id());
        }
    }

    #[test]
    fn fixed_sizes() {
        assert_eq!(WireType::None.fixed_size(), Some(0));
        assert_eq!(WireType::Boolean.fixed_size(), Some(1));
        assert_eq!(WireType::Long.fixed_size(), Some(8));
        assert_eq!(WireType::Double.fixed_size(), Some(8));
        assert_eq!(WireType::Magic.fixed_size(), Some(4));
        assert_eq!(WireType::VarInt.fixed_size(), None);
        assert_eq!(WireType::String.fixed_size(), None);
        assert_eq!(WireType::FixedBytes.fixed_size(), None);
    }
}
