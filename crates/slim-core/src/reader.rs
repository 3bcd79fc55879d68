//! Field reader — decodes self-describing packet bodies.
//!
//! The reader holds a cursor over an immutable byte slice. Each read
//! consumes the leading type tag and its payload; a `none` tag yields
//! `Ok(None)`, a foreign tag fails with `TypeMismatch`. Inside a typed
//! array the shared element tag is factored out and the reader runs in
//! skip-tag mode.

use crate::error::CodecError;
use crate::types::WireType;
use crate::varint;

/// A cursor over an encoded field stream.
#[derive(Debug)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Cleared while reading typed-array elements.
    tagged: bool,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            tagged: true,
        }
    }

    /// Bytes left between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread remainder of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::ReadPastEnd);
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    /// Reads the next type tag.
    pub fn read_tag(&mut self) -> Result<WireType, CodecError> {
        WireType::from_id(self.take_byte()?)
    }

    /// Consumes the tag of the next field and checks it against `want`.
    /// Returns `false` for a `none` field. In skip-tag mode the stream
    /// carries no tag and the value is always treated as present.
    fn expect(&mut self, want: WireType) -> Result<bool, CodecError> {
        if !self.tagged {
            return Ok(true);
        }
        let actual = self.read_tag()?;
        if actual == WireType::None {
            return Ok(false);
        }
        if actual != want {
            return Err(CodecError::TypeMismatch {
                expected: want,
                actual,
            });
        }
        Ok(true)
    }

    fn read_varint_raw(&mut self) -> Result<u32, CodecError> {
        let (value, used) = varint::read_varint(&self.buf[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    fn read_varlong_raw(&mut self) -> Result<u64, CodecError> {
        let (value, used) = varint::read_varlong(&self.buf[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<Option<bool>, CodecError> {
        if !self.expect(WireType::Boolean)? {
            return Ok(None);
        }
        match self.take_byte()? {
            0 => Ok(Some(false)),
            1 => Ok(Some(true)),
            _ => Err(CodecError::ValueOutOfRange),
        }
    }

    pub fn read_byte(&mut self) -> Result<Option<u8>, CodecError> {
        if !self.expect(WireType::Byte)? {
            return Ok(None);
        }
        Ok(Some(self.take_byte()?))
    }

    pub fn read_signed_byte(&mut self) -> Result<Option<i8>, CodecError> {
        if !self.expect(WireType::SignedByte)? {
            return Ok(None);
        }
        Ok(Some(self.take_byte()? as i8))
    }

    pub fn read_short(&mut self) -> Result<Option<u16>, CodecError> {
        if !self.expect(WireType::Short)? {
            return Ok(None);
        }
        let bytes = self.take(2)?;
        Ok(Some(u16::from_be_bytes([bytes[0], bytes[1]])))
    }

    pub fn read_signed_short(&mut self) -> Result<Option<i16>, CodecError> {
        if !self.expect(WireType::SignedShort)? {
            return Ok(None);
        }
        let bytes = self.take(2)?;
        Ok(Some(i16::from_be_bytes([bytes[0], bytes[1]])))
    }

    pub fn read_integer(&mut self) -> Result<Option<u32>, CodecError> {
        if !self.expect(WireType::Integer)? {
            return Ok(None);
        }
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(Some(u32::from_be_bytes(bytes)))
    }

    pub fn read_signed_integer(&mut self) -> Result<Option<i32>, CodecError> {
        if !self.expect(WireType::SignedInteger)? {
            return Ok(None);
        }
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(Some(i32::from_be_bytes(bytes)))
    }

    pub fn read_long(&mut self) -> Result<Option<u64>, CodecError> {
        if !self.expect(WireType::Long)? {
            return Ok(None);
        }
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(Some(u64::from_be_bytes(bytes)))
    }

    pub fn read_signed_long(&mut self) -> Result<Option<i64>, CodecError> {
        if !self.expect(WireType::SignedLong)? {
            return Ok(None);
        }
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(Some(i64::from_be_bytes(bytes)))
    }

    pub fn read_float(&mut self) -> Result<Option<f32>, CodecError> {
        if !self.expect(WireType::Float)? {
            return Ok(None);
        }
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(Some(f32::from_be_bytes(bytes)))
    }

    pub fn read_double(&mut self) -> Result<Option<f64>, CodecError> {
        if !self.expect(WireType::Double)? {
            return Ok(None);
        }
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(Some(f64::from_be_bytes(bytes)))
    }

    pub fn read_varint(&mut self) -> Result<Option<u32>, CodecError> {
        if !self.expect(WireType::VarInt)? {
            return Ok(None);
        }
        Ok(Some(self.read_varint_raw()?))
    }

    pub fn read_varlong(&mut self) -> Result<Option<u64>, CodecError> {
        if !self.expect(WireType::VarLong)? {
            return Ok(None);
        }
        Ok(Some(self.read_varlong_raw()?))
    }

    /// Reads a varInt-length-prefixed UTF-8 string. A `none` field
    /// (the encoding of the empty string) yields `None`.
    pub fn read_string(&mut self) -> Result<Option<&'a str>, CodecError> {
        if !self.expect(WireType::String)? {
            return Ok(None);
        }
        let len = self.read_varint_raw()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(Some)
            .map_err(|_| CodecError::InvalidString)
    }

    /// Reads a varInt-length-prefixed byte blob.
    pub fn read_bytes(&mut self) -> Result<Option<&'a [u8]>, CodecError> {
        if !self.expect(WireType::Bytes)? {
            return Ok(None);
        }
        let len = self.read_varint_raw()? as usize;
        Ok(Some(self.take(len)?))
    }

    /// Reads `len` raw bytes whose length is known from context.
    pub fn read_fixed_bytes(&mut self, len: usize) -> Result<Option<&'a [u8]>, CodecError> {
        if !self.expect(WireType::FixedBytes)? {
            return Ok(None);
        }
        Ok(Some(self.take(len)?))
    }

    /// Reads an array field, invoking `read_element` once per element.
    ///
    /// For a typed array (element tag byte naming a type) the stored
    /// tag must equal `element` and elements are read in skip-tag mode;
    /// when the stored tag byte is the `none` id the array is untyped
    /// and each element carries its own tag. A `none` field or a zero
    /// count yields `None`.
    pub fn read_array<T, F>(
        &mut self,
        element: WireType,
        mut read_element: F,
    ) -> Result<Option<Vec<T>>, CodecError>
    where
        F: FnMut(&mut FieldReader<'a>) -> Result<T, CodecError>,
    {
        if !self.expect(WireType::Array)? {
            return Ok(None);
        }
        let count = self.read_varint_raw()? as usize;
        let stored = WireType::from_id(self.take_byte()?)?;
        if count == 0 {
            return Ok(None);
        }
        if stored != WireType::None && stored != element {
            return Err(CodecError::TypeMismatch {
                expected: element,
                actual: stored,
            });
        }

        let was_tagged = self.tagged;
        self.tagged = stored == WireType::None;
        let mut out = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            match read_element(self) {
                Ok(value) => out.push(value),
                Err(e) => {
                    self.tagged = was_tagged;
                    return Err(e);
                }
            }
        }
        self.tagged = was_tagged;
        Ok(Some(out))
    }
}
