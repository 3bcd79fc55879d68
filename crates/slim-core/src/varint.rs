//! VarInt / VarLong — variable-length integer encodings.
//!
//! Both encodings emit 7 value bits per byte, low group first, with the
//! high bit (0x80) set while more non-zero bits remain. A 32-bit value
//! takes 1-5 bytes, a 64-bit value 1-10. Negative values reinterpreted
//! as unsigned always occupy the full width.

use bytes::BufMut;

use crate::error::CodecError;

/// Maximum encoded length of a varInt.
pub const MAX_VARINT_LEN: usize = 5;

/// Maximum encoded length of a varLong.
pub const MAX_VARLONG_LEN: usize = 10;

/// Appends a varInt-encoded `value` to `buf`.
pub fn write_varint(buf: &mut impl BufMut, mut value: u32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Appends a varLong-encoded `value` to `buf`.
pub fn write_varlong(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Encoded length of `value` as a varInt, without encoding it.
pub fn varint_len(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Encoded length of `value` as a varLong, without encoding it.
pub fn varlong_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Decodes a varInt from the front of `buf`.
///
/// Returns the value and the number of bytes consumed. Fails with
/// [`CodecError::VarIntOverflow`] when the 5th byte carries bits above
/// position 4, which would widen the value past 32 bits.
pub fn read_varint(buf: &[u8]) -> Result<(u32, usize), CodecError> {
    let mut value = 0u32;
    for i in 0..MAX_VARINT_LEN {
        let byte = *buf.get(i).ok_or(CodecError::ReadPastEnd)?;
        if i == MAX_VARINT_LEN - 1 && byte & 0xF0 != 0 {
            return Err(CodecError::VarIntOverflow);
        }
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(CodecError::VarIntOverflow)
}

/// Decodes a varLong from the front of `buf`.
///
/// Fails with [`CodecError::VarLongOverflow`] when the 10th byte carries
/// bits above position 0.
pub fn read_varlong(buf: &[u8]) -> Result<(u64, usize), CodecError> {
    let mut value = 0u64;
    for i in 0..MAX_VARLONG_LEN {
        let byte = *buf.get(i).ok_or(CodecError::ReadPastEnd)?;
        if i == MAX_VARLONG_LEN - 1 && byte & 0xFE != 0 {
            return Err(CodecError::VarLongOverflow);
        }
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(CodecError::VarLongOverflow)
}
