//! slim-transport — the SLIM transport layer: packet chunking, chunk
//! reassembly, and the signal side channel. Everything here is pure
//! codec and state; the socket loop lives in slim-socket.

pub mod chunk;
pub mod collector;
pub mod error;
pub mod signal;

pub use chunk::{
    chunkify, is_chunk, IncomingChunk, OutgoingChunk, CHUNK_HEADER_SIZE, CHUNK_MAGIC,
    MAX_CHUNK_BODY_SIZE, MAX_CHUNK_COUNT, MAX_CHUNK_SIZE,
};
pub use collector::{ChunkCollector, ExpiredReassembly};
pub use error::{ChunkError, ReassemblyError, SignalError};
pub use signal::{
    is_signal, IncomingSignal, RejectReason, Signal, SignalKind, MAX_SIGNAL_BODY, SIGNAL_MAGIC,
};

/// Hash a byte slice, returning the 64-bit XXH3 digest.
///
/// Used for chunk body integrity and signal frame integrity.
pub fn hash(data: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = hash(b"slim");
        let b = hash(b"slim");
        let c = hash(b"slim!");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_of_empty_input_is_stable() {
        assert_eq!(hash(&[]), hash(&[]));
    }
}
