//! Field writer — builds self-describing packet bodies.
//!
//! Every value is introduced by its 1-byte type tag, except elements of
//! a typed array, whose shared tag is written once by the array header.
//! Integer widths are carried by the method signatures: a value written
//! through a `*_signed_*` method gets the signed variant tag, so a tag
//! can never disagree with the value it introduces.
//!
//! Empty strings, empty byte blobs, and zero-element arrays encode as a
//! single `none` tag. A receiver cannot distinguish empty from absent;
//! callers must not rely on the difference.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::types::WireType;
use crate::varint;

/// Accumulates tagged field values into a growable buffer.
#[derive(Debug)]
pub struct FieldWriter {
    buf: BytesMut,
    /// Cleared for the element stream of a typed array.
    tag_values: bool,
}

impl Default for FieldWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            tag_values: true,
        }
    }

    /// Writer for typed-array elements: values are appended without
    /// their per-value tag.
    fn untagged() -> Self {
        Self {
            buf: BytesMut::new(),
            tag_values: false,
        }
    }

    fn tag(&mut self, t: WireType) {
        if self.tag_values {
            self.buf.put_u8(t.id());
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the writer and returns the encoded field stream.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// Writes an explicit null field.
    pub fn write_none(&mut self) -> &mut Self {
        self.buf.put_u8(WireType::None.id());
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.tag(WireType::Boolean);
        self.buf.put_u8(u8::from(value));
        self
    }

    pub fn write_byte(&mut self, value: u8) -> &mut Self {
        self.tag(WireType::Byte);
        self.buf.put_u8(value);
        self
    }

    pub fn write_signed_byte(&mut self, value: i8) -> &mut Self {
        self.tag(WireType::SignedByte);
        self.buf.put_i8(value);
        self
    }

    pub fn write_short(&mut self, value: u16) -> &mut Self {
        self.tag(WireType::Short);
        self.buf.put_u16(value);
        self
    }

    pub fn write_signed_short(&mut self, value: i16) -> &mut Self {
        self.tag(WireType::SignedShort);
        self.buf.put_i16(value);
        self
    }

    pub fn write_integer(&mut self, value: u32) -> &mut Self {
        self.tag(WireType::Integer);
        self.buf.put_u32(value);
        self
    }

    pub fn write_signed_integer(&mut self, value: i32) -> &mut Self {
        self.tag(WireType::SignedInteger);
        self.buf.put_i32(value);
        self
    }

    pub fn write_long(&mut self, value: u64) -> &mut Self {
        self.tag(WireType::Long);
        self.buf.put_u64(value);
        self
    }

    pub fn write_signed_long(&mut self, value: i64) -> &mut Self {
        self.tag(WireType::SignedLong);
        self.buf.put_i64(value);
        self
    }

    pub fn write_float(&mut self, value: f32) -> &mut Self {
        self.tag(WireType::Float);
        self.buf.put_f32(value);
        self
    }

    pub fn write_double(&mut self, value: f64) -> &mut Self {
        self.tag(WireType::Double);
        self.buf.put_f64(value);
        self
    }

    pub fn write_varint(&mut self, value: u32) -> &mut Self {
        self.tag(WireType::VarInt);
        varint::write_varint(&mut self.buf, value);
        self
    }

    pub fn write_varlong(&mut self, value: u64) -> &mut Self {
        self.tag(WireType::VarLong);
        varint::write_varlong(&mut self.buf, value);
        self
    }

    /// Writes a UTF-8 string, length-prefixed with a varInt.
    /// An empty string encodes as a `none` field.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        if value.is_empty() {
            return self.write_none();
        }
        self.tag(WireType::String);
        varint::write_varint(&mut self.buf, value.len() as u32);
        self.buf.put_slice(value.as_bytes());
        self
    }

    /// Writes a byte blob, length-prefixed with a varInt.
    /// An empty blob encodes as a `none` field.
    pub fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        if value.is_empty() {
            return self.write_none();
        }
        self.tag(WireType::Bytes);
        varint::write_varint(&mut self.buf, value.len() as u32);
        self.buf.put_slice(value);
        self
    }

    /// Writes raw bytes whose length the reader knows from context.
    pub fn write_fixed_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.tag(WireType::FixedBytes);
        self.buf.put_slice(value);
        self
    }

    /// Writes a built array. A zero-element array encodes as a `none`
    /// field.
    ///
    /// Layout: `[array tag][varInt count][element tag byte][elements…]`.
    /// For a typed builder the element tag byte names the shared element
    /// type and elements carry no per-element tag; for an untyped
    /// builder it is the `none` id and each element is self-tagged.
    pub fn write_array(&mut self, array: ArrayBuilder) -> Result<&mut Self, CodecError> {
        let (count, element, payload) = array.build()?;
        if count == 0 {
            return Ok(self.write_none());
        }
        self.tag(WireType::Array);
        varint::write_varint(&mut self.buf, count as u32);
        self.buf
            .put_u8(element.map_or(WireType::None.id(), WireType::id));
        self.buf.put_slice(&payload);
        Ok(self)
    }
}

/// Builds the element stream of an array field.
///
/// A typed builder fixes the element type at construction and rejects
/// elements of any other type; an untyped builder accepts any mix and
/// tags each element individually.
#[derive(Debug)]
pub struct ArrayBuilder {
    element: Option<WireType>,
    expected_len: Option<usize>,
    count: usize,
    inner: FieldWriter,
}

impl ArrayBuilder {
    /// A typed builder: one element tag for the whole array.
    pub fn of(element: WireType) -> Self {
        Self {
            element: Some(element),
            expected_len: None,
            count: 0,
            inner: FieldWriter::untagged(),
        }
    }

    /// An untyped builder: every element carries its own tag.
    pub fn untyped() -> Self {
        Self {
            element: None,
            expected_len: None,
            count: 0,
            inner: FieldWriter::new(),
        }
    }

    /// Requires exactly `len` elements at build time.
    pub fn expect_len(mut self, len: usize) -> Self {
        self.expected_len = Some(len);
        self
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn check(&self, actual: WireType) -> Result<(), CodecError> {
        match self.element {
            Some(expected) if expected != actual => {
                Err(CodecError::TypeMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    pub fn push_bool(&mut self, value: bool) -> Result<&mut Self, CodecError> {
        self.check(WireType::Boolean)?;
        self.inner.write_bool(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_byte(&mut self, value: u8) -> Result<&mut Self, CodecError> {
        self.check(WireType::Byte)?;
        self.inner.write_byte(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_signed_byte(&mut self, value: i8) -> Result<&mut Self, CodecError> {
        self.check(WireType::SignedByte)?;
        self.inner.write_signed_byte(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_short(&mut self, value: u16) -> Result<&mut Self, CodecError> {
        self.check(WireType::Short)?;
        self.inner.write_short(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_signed_short(&mut self, value: i16) -> Result<&mut Self, CodecError> {
        self.check(WireType::SignedShort)?;
        self.inner.write_signed_short(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_integer(&mut self, value: u32) -> Result<&mut Self, CodecError> {
        self.check(WireType::Integer)?;
        self.inner.write_integer(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_signed_integer(&mut self, value: i32) -> Result<&mut Self, CodecError> {
        self.check(WireType::SignedInteger)?;
        self.inner.write_signed_integer(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_long(&mut self, value: u64) -> Result<&mut Self, CodecError> {
        self.check(WireType::Long)?;
        self.inner.write_long(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_signed_long(&mut self, value: i64) -> Result<&mut Self, CodecError> {
        self.check(WireType::SignedLong)?;
        self.inner.write_signed_long(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_float(&mut self, value: f32) -> Result<&mut Self, CodecError> {
        self.check(WireType::Float)?;
        self.inner.write_float(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_double(&mut self, value: f64) -> Result<&mut Self, CodecError> {
        self.check(WireType::Double)?;
        self.inner.write_double(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_varint(&mut self, value: u32) -> Result<&mut Self, CodecError> {
        self.check(WireType::VarInt)?;
        self.inner.write_varint(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_varlong(&mut self, value: u64) -> Result<&mut Self, CodecError> {
        self.check(WireType::VarLong)?;
        self.inner.write_varlong(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_string(&mut self, value: &str) -> Result<&mut Self, CodecError> {
        self.check(WireType::String)?;
        self.inner.write_string(value);
        self.count += 1;
        Ok(self)
    }

    pub fn push_bytes(&mut self, value: &[u8]) -> Result<&mut Self, CodecError> {
        self.check(WireType::Bytes)?;
        self.inner.write_bytes(value);
        self.count += 1;
        Ok(self)
    }

    fn build(self) -> Result<(usize, Option<WireType>, Bytes), CodecError> {
        if let Some(expected) = self.expected_len {
            if expected != self.count {
                return Err(CodecError::ArrayLengthMismatch {
                    expected,
                    actual: self.count,
                });
            }
        }
        Ok((self.count, self.element, self.inner.finish()))
    }
}
