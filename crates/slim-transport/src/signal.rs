//! Signal channel — small control messages riding the packet transport.
//!
//! A signal is one datagram: magic, a 1-byte body length, an XXH3-64
//! over the tagged type byte and body, the type byte, and the body.
//! Bodies are ordinary SLIM fields, so acknowledgements and rejections
//! carry their snowflake as a tagged fixedBytes value. Signals are
//! stateless; receiving one twice means nothing more than receiving it
//! once.

use std::net::SocketAddr;

use bytes::{BufMut, Bytes, BytesMut};

use slim_core::error::CodecError;
use slim_core::reader::FieldReader;
use slim_core::snowflake::{Snowflake, SNOWFLAKE_LEN};
use slim_core::types::WireType;
use slim_core::writer::{ArrayBuilder, FieldWriter};

use crate::error::SignalError;
use crate::hash;

/// The 4-byte constant that opens every signal datagram.
pub const SIGNAL_MAGIC: u32 = 0x4D45_4154;

/// Signal bodies are prefixed with a single length byte.
pub const MAX_SIGNAL_BODY: usize = 255;

/// True when the datagram opens with the signal magic.
pub fn is_signal(bytes: &[u8]) -> bool {
    bytes.len() >= 5
        && bytes[0] == WireType::Magic.id()
        && u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) == SIGNAL_MAGIC
}

/// The kind of a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignalKind {
    Acknowledged = 0x00,
    PartiallyAcknowledged = 0x01,
    Rejected = 0x02,
    Ping = 0x10,
    Pong = 0x11,
    Close = 0xFF,
}

impl SignalKind {
    pub fn from_id(id: u8) -> Result<Self, SignalError> {
        match id {
            0x00 => Ok(Self::Acknowledged),
            0x01 => Ok(Self::PartiallyAcknowledged),
            0x02 => Ok(Self::Rejected),
            0x10 => Ok(Self::Ping),
            0x11 => Ok(Self::Pong),
            0xFF => Ok(Self::Close),
            other => Err(SignalError::UnknownKind(other)),
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Why a packet or chunk was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RejectReason {
    ChunkHashMismatch = 0x00,
    InvalidChunk = 0x01,
    InvalidPacket = 0x02,
    FieldTypeMismatch = 0x03,
    BadFieldValue = 0x04,
    Timeout = 0xEF,
    RequestResend = 0xFF,
}

impl RejectReason {
    pub fn from_id(id: u8) -> Result<Self, SignalError> {
        match id {
            0x00 => Ok(Self::ChunkHashMismatch),
            0x01 => Ok(Self::InvalidChunk),
            0x02 => Ok(Self::InvalidPacket),
            0x03 => Ok(Self::FieldTypeMismatch),
            0x04 => Ok(Self::BadFieldValue),
            0xEF => Ok(Self::Timeout),
            0xFF => Ok(Self::RequestResend),
            other => Err(SignalError::UnknownReason(other)),
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// A control message ready to send.
#[derive(Debug, Clone)]
pub struct Signal {
    kind: SignalKind,
    body: Bytes,
}

impl Signal {
    pub fn ping() -> Self {
        Self {
            kind: SignalKind::Ping,
            body: Bytes::new(),
        }
    }

    pub fn pong() -> Self {
        Self {
            kind: SignalKind::Pong,
            body: Bytes::new(),
        }
    }

    pub fn close() -> Self {
        Self {
            kind: SignalKind::Close,
            body: Bytes::new(),
        }
    }

    /// Acknowledges full reassembly of the packet with this snowflake.
    pub fn acknowledged(snowflake: Snowflake) -> Self {
        let mut body = FieldWriter::new();
        body.write_fixed_bytes(snowflake.as_bytes());
        Self {
            kind: SignalKind::Acknowledged,
            body: body.finish(),
        }
    }

    /// Reports a partial reassembly: the snowflake plus the indices of
    /// the chunks that never arrived.
    pub fn partially_acknowledged(
        snowflake: Snowflake,
        missing: &[u32],
    ) -> Result<Self, SignalError> {
        let mut body = FieldWriter::new();
        body.write_fixed_bytes(snowflake.as_bytes());
        let mut indices = ArrayBuilder::of(WireType::Integer).expect_len(missing.len());
        for &index in missing {
            indices.push_integer(index)?;
        }
        body.write_array(indices)?;
        let signal = Self {
            kind: SignalKind::PartiallyAcknowledged,
            body: body.finish(),
        };
        if signal.body.len() > MAX_SIGNAL_BODY {
            return Err(SignalError::BodyTooLarge(signal.body.len()));
        }
        Ok(signal)
    }

    /// Rejects the packet with this snowflake, optionally naming why.
    pub fn rejected(snowflake: Snowflake, reason: Option<RejectReason>) -> Self {
        let mut body = FieldWriter::new();
        body.write_fixed_bytes(snowflake.as_bytes());
        if let Some(reason) = reason {
            body.write_byte(reason.id());
        }
        Self {
            kind: SignalKind::Rejected,
            body: body.finish(),
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Encodes the signal datagram.
    ///
    /// The hash covers the tagged type byte and the body. An empty body
    /// is framed with a single `none` tag in place of the length field.
    pub fn pack(&self) -> Result<Bytes, SignalError> {
        if self.body.len() > MAX_SIGNAL_BODY {
            return Err(SignalError::BodyTooLarge(self.body.len()));
        }
        let header = [WireType::Byte.id(), self.kind.id()];
        let mut hashed = Vec::with_capacity(header.len() + self.body.len());
        hashed.extend_from_slice(&header);
        hashed.extend_from_slice(&self.body);
        let digest = hash(&hashed);

        let mut buf = BytesMut::with_capacity(7 + 1 + 8 + 2 + self.body.len());
        buf.put_u8(WireType::Magic.id());
        buf.put_u32(SIGNAL_MAGIC);
        if self.body.is_empty() {
            buf.put_u8(WireType::None.id());
        } else {
            buf.put_u8(WireType::Byte.id());
            buf.put_u8(self.body.len() as u8);
        }
        buf.put_u8(WireType::FixedBytes.id());
        buf.put_u64(digest);
        buf.put_slice(&header);
        buf.put_slice(&self.body);
        Ok(buf.freeze())
    }
}

/// A signal received from a peer, parsed and hash-verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingSignal {
    pub sender: SocketAddr,
    pub kind: SignalKind,
    body: Bytes,
}

impl IncomingSignal {
    /// Parses and validates a signal datagram.
    ///
    /// The length field may be byte-tagged or a bare `none` tag (zero
    /// length). Trailing bytes beyond the declared length are rejected;
    /// they would not be covered by the hash.
    pub fn parse(sender: SocketAddr, bytes: &[u8]) -> Result<Self, SignalError> {
        if !is_signal(bytes) {
            return Err(SignalError::InvalidMagic);
        }
        let mut pos = 5usize;
        let length_tag = *bytes.get(pos).ok_or(SignalError::Truncated)?;
        pos += 1;
        let length = if length_tag == WireType::None.id() {
            0
        } else if length_tag == WireType::Byte.id() {
            let len = *bytes.get(pos).ok_or(SignalError::Truncated)?;
            pos += 1;
            usize::from(len)
        } else {
            return Err(SignalError::BadLengthField);
        };

        if bytes.get(pos) != Some(&WireType::FixedBytes.id()) {
            return Err(SignalError::BadFrame);
        }
        pos += 1;
        let digest_bytes = bytes.get(pos..pos + 8).ok_or(SignalError::Truncated)?;
        let digest = u64::from_be_bytes(digest_bytes.try_into().unwrap());
        pos += 8;

        if bytes.get(pos) != Some(&WireType::Byte.id()) {
            return Err(SignalError::BadFrame);
        }
        let kind_byte = *bytes.get(pos + 1).ok_or(SignalError::Truncated)?;
        let body_start = pos + 2;
        let body = bytes
            .get(body_start..body_start + length)
            .ok_or(SignalError::Truncated)?;
        if bytes.len() != body_start + length {
            return Err(SignalError::BadLengthField);
        }

        if hash(&bytes[pos..body_start + length]) != digest {
            return Err(SignalError::HashMismatch);
        }
        let kind = SignalKind::from_id(kind_byte)?;
        Ok(Self {
            sender,
            kind,
            body: Bytes::copy_from_slice(body),
        })
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The snowflake named by an acknowledgement or rejection body.
    /// `None` for bodiless signals and kinds that carry no snowflake.
    pub fn snowflake(&self) -> Result<Option<Snowflake>, SignalError> {
        if self.body.is_empty() {
            return Ok(None);
        }
        let mut reader = FieldReader::new(&self.body);
        let Some(bytes) = reader.read_fixed_bytes(SNOWFLAKE_LEN)? else {
            return Ok(None);
        };
        Ok(Snowflake::from_slice(bytes))
    }

    /// The reason byte of a `rejected` signal, when one was sent.
    pub fn reject_reason(&self) -> Result<Option<RejectReason>, SignalError> {
        if self.kind != SignalKind::Rejected || self.body.is_empty() {
            return Ok(None);
        }
        let mut reader = FieldReader::new(&self.body);
        reader.read_fixed_bytes(SNOWFLAKE_LEN)?;
        if reader.is_empty() {
            return Ok(None);
        }
        match reader.read_byte()? {
            Some(id) => RejectReason::from_id(id).map(Some),
            None => Ok(None),
        }
    }

    /// The missing chunk indices of a `partiallyAcknowledged` signal.
    pub fn missing_indices(&self) -> Result<Option<Vec<u32>>, SignalError> {
        if self.kind != SignalKind::PartiallyAcknowledged || self.body.is_empty() {
            return Ok(None);
        }
        let mut reader = FieldReader::new(&self.body);
        reader.read_fixed_bytes(SNOWFLAKE_LEN)?;
        let indices = reader.read_array(WireType::Integer, |r| {
            r.read_integer()?.ok_or(CodecError::ReadPastEnd)
        })?;
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    fn round_trip(signal: &Signal) -> IncomingSignal {
        let wire = signal.pack().unwrap();
        assert!(is_signal(&wire));
        assert!(!crate::chunk::is_chunk(&wire));
        IncomingSignal::parse(sender(), &wire).unwrap()
    }

    #[test]
    fn ping_round_trip() {
        let parsed = round_trip(&Signal::ping());
        assert_eq!(parsed.kind, SignalKind::Ping);
        assert!(parsed.body().is_empty());
        assert_eq!(parsed.snowflake().unwrap(), None);
    }

    #[test]
    fn bodiless_signal_layout() {
        let wire = Signal::pong().pack().unwrap();
        assert_eq!(wire[0], 0xFF);
        assert_eq!(&wire[1..5], &[0x4D, 0x45, 0x41, 0x54]);
        // Empty body: the length field collapses to a none tag.
        assert_eq!(wire[5], 0x00);
        assert_eq!(wire[6], 0xFE);
        assert_eq!(wire[15], 0x02);
        assert_eq!(wire[16], SignalKind::Pong.id());
        assert_eq!(wire.len(), 17);
    }

    #[test]
    fn acknowledged_round_trip() {
        let snowflake = Snowflake::generate();
        let parsed = round_trip(&Signal::acknowledged(snowflake));
        assert_eq!(parsed.kind, SignalKind::Acknowledged);
        assert_eq!(parsed.snowflake().unwrap(), Some(snowflake));
    }

    #[test]
    fn rejected_round_trip_with_reason() {
        let snowflake = Snowflake::generate();
        let parsed = round_trip(&Signal::rejected(
            snowflake,
            Some(RejectReason::ChunkHashMismatch),
        ));
        assert_eq!(parsed.kind, SignalKind::Rejected);
        assert_eq!(parsed.snowflake().unwrap(), Some(snowflake));
        assert_eq!(
            parsed.reject_reason().unwrap(),
            Some(RejectReason::ChunkHashMismatch)
        );
        // The reason byte is the table value, 0x00.
        assert_eq!(*parsed.body().last().unwrap(), 0x00);
    }

    #[test]
    fn rejected_round_trip_without_reason() {
        let snowflake = Snowflake::generate();
        let parsed = round_trip(&Signal::rejected(snowflake, None));
        assert_eq!(parsed.snowflake().unwrap(), Some(snowflake));
        assert_eq!(parsed.reject_reason().unwrap(), None);
    }

    #[test]
    fn partially_acknowledged_round_trip() {
        let snowflake = Snowflake::generate();
        let signal = Signal::partially_acknowledged(snowflake, &[1, 4, 7]).unwrap();
        let parsed = round_trip(&signal);
        assert_eq!(parsed.kind, SignalKind::PartiallyAcknowledged);
        assert_eq!(parsed.snowflake().unwrap(), Some(snowflake));
        assert_eq!(parsed.missing_indices().unwrap(), Some(vec![1, 4, 7]));
    }

    #[test]
    fn close_round_trip() {
        let parsed = round_trip(&Signal::close());
        assert_eq!(parsed.kind, SignalKind::Close);
    }

    #[test]
    fn oversized_body_rejected_at_pack() {
        let snowflake = Snowflake::generate();
        let missing: Vec<u32> = (0..80).collect();
        let err = Signal::partially_acknowledged(snowflake, &missing).unwrap_err();
        assert!(matches!(err, SignalError::BodyTooLarge(_)));
    }

    #[test]
    fn parse_rejects_corrupted_type_byte() {
        let wire = Signal::ping().pack().unwrap();
        let mut bad = wire.to_vec();
        bad[16] = SignalKind::Pong.id();
        assert_eq!(
            IncomingSignal::parse(sender(), &bad),
            Err(SignalError::HashMismatch)
        );
    }

    #[test]
    fn parse_rejects_corrupted_body() {
        let wire = Signal::acknowledged(Snowflake::generate()).pack().unwrap();
        let mut bad = wire.to_vec();
        *bad.last_mut().unwrap() ^= 0xFF;
        assert_eq!(
            IncomingSignal::parse(sender(), &bad),
            Err(SignalError::HashMismatch)
        );
    }

    #[test]
    fn parse_rejects_trailing_garbage() {
        let wire = Signal::ping().pack().unwrap();
        let mut bad = wire.to_vec();
        bad.push(0xAA);
        assert_eq!(
            IncomingSignal::parse(sender(), &bad),
            Err(SignalError::BadLengthField)
        );
    }

    #[test]
    fn parse_rejects_unknown_kind() {
        let wire = Signal::ping().pack().unwrap();
        let mut bad = wire.to_vec();
        bad[16] = 0x42;
        // Re-seal the hash so the unknown kind is what fails.
        let digest = hash(&bad[15..]);
        bad[7..15].copy_from_slice(&digest.to_be_bytes());
        assert_eq!(
            IncomingSignal::parse(sender(), &bad),
            Err(SignalError::UnknownKind(0x42))
        );
    }

    #[test]
    fn signal_magic_discriminators() {
        assert!(!is_signal(&[0xFF, 0x47, 0x52, 0x52, 0x52]));
        assert!(is_signal(&[0xFF, 0x4D, 0x45, 0x41, 0x54]));
        assert!(!is_signal(&[0x00, 0x4D, 0x45, 0x41, 0x54]));
        assert!(!is_signal(&[0xFF, 0x4D]));
    }
}
