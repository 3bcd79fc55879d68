//! Snowflake — the 16-byte fragment identifier.
//!
//! Every packet carries one; all chunks of a packet share it, and the
//! reassembly map is keyed by it. Generated from a cryptographically
//! seeded v4 UUID so identifiers cannot collide or be predicted across
//! peers.

use std::fmt;

use uuid::Uuid;

/// Length of a snowflake in bytes.
pub const SNOWFLAKE_LEN: usize = 16;

/// A 16-byte packet fragment identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Snowflake([u8; SNOWFLAKE_LEN]);

impl Snowflake {
    /// Generates a fresh identifier from the process RNG.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    pub const fn from_bytes(bytes: [u8; SNOWFLAKE_LEN]) -> Self {
        Self(bytes)
    }

    /// Reads a snowflake from a slice. `None` unless exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub const fn as_bytes(&self) -> &[u8; SNOWFLAKE_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for Snowflake {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snowflake({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_unique() {
        let a = Snowflake::generate();
        let b = Snowflake::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn from_slice_requires_exact_length() {
        assert!(Snowflake::from_slice(&[0u8; 16]).is_some());
        assert!(Snowflake::from_slice(&[0u8; 15]).is_none());
        assert!(Snowflake::from_slice(&[0u8; 17]).is_none());
    }

    #[test]
    fn display_is_lowercase_hex() {
        let s = Snowflake::from_bytes([0xAB; 16]);
        assert_eq!(s.to_string(), "ab".repeat(16));
    }
}
