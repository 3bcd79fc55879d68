//! Chunk collector — buffers incoming chunks until a packet completes.
//!
//! Pending reassemblies are keyed by the raw 16-byte snowflake. An
//! entry binds the snowflake to the first sender and count seen; later
//! chunks must agree on both. Slots fill in any order, a `remaining`
//! counter detects completion without rescanning, and a deadline lets
//! the owner sweep abandoned entries.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use slim_core::packet::IncomingPacket;
use slim_core::snowflake::{Snowflake, SNOWFLAKE_LEN};

use crate::chunk::IncomingChunk;
use crate::error::ReassemblyError;

struct PendingPacket {
    sender: SocketAddr,
    count: u32,
    slots: Vec<Option<Bytes>>,
    remaining: usize,
    deadline: Instant,
}

/// A reassembly that ran out of time and was evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredReassembly {
    pub snowflake: Snowflake,
    pub sender: SocketAddr,
    /// Chunk indices that never arrived.
    pub missing: Vec<u32>,
}

/// Buffers chunks by snowflake and emits reassembled packets.
pub struct ChunkCollector {
    pending: HashMap<[u8; SNOWFLAKE_LEN], PendingPacket>,
    timeout: Duration,
}

impl ChunkCollector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            timeout,
        }
    }

    /// Number of reassemblies in flight.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Feeds one verified chunk.
    ///
    /// Returns `Ok(Some(packet))` when this chunk completed its
    /// snowflake, `Ok(None)` while more chunks are outstanding.
    /// Re-delivery of an index already stored replaces the slot.
    pub fn add_chunk(
        &mut self,
        chunk: IncomingChunk,
    ) -> Result<Option<IncomingPacket>, ReassemblyError> {
        let IncomingChunk {
            sender,
            snowflake,
            index,
            count,
            body,
            hash: _,
        } = chunk;
        let key = *snowflake.as_bytes();
        let now = Instant::now();

        // Checked before the entry exists so a bad chunk cannot leave
        // an empty pending entry behind.
        if index >= count {
            return Err(ReassemblyError::IndexOutOfRange {
                snowflake,
                index,
                count,
            });
        }

        let entry = self.pending.entry(key).or_insert_with(|| PendingPacket {
            sender,
            count,
            slots: vec![None; count as usize],
            remaining: count as usize,
            deadline: now + self.timeout,
        });
        if entry.sender != sender {
            return Err(ReassemblyError::SenderMismatch { snowflake });
        }
        if entry.count != count {
            return Err(ReassemblyError::CountMismatch {
                snowflake,
                expected: entry.count,
                actual: count,
            });
        }

        let slot = &mut entry.slots[index as usize];
        if slot.is_none() {
            entry.remaining -= 1;
        }
        *slot = Some(body);
        if entry.remaining > 0 {
            return Ok(None);
        }

        let Some(done) = self.pending.remove(&key) else {
            return Ok(None);
        };
        let total = done
            .slots
            .iter()
            .map(|s| s.as_ref().map_or(0, Bytes::len))
            .sum();
        let mut assembled = BytesMut::with_capacity(total);
        for slot in &done.slots {
            if let Some(body) = slot {
                assembled.extend_from_slice(body);
            }
        }
        let assembled = assembled.freeze();

        IncomingPacket::strip_envelope(&assembled)
            .and_then(|rest| IncomingPacket::parse(done.sender, rest))
            .map(Some)
            .map_err(|source| ReassemblyError::Packet { snowflake, source })
    }

    /// Evicts entries whose deadline has passed, reporting what was
    /// still missing so the owner can signal the sender.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<ExpiredReassembly> {
        let expired: Vec<[u8; SNOWFLAKE_LEN]> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(key, _)| *key)
            .collect();

        expired
            .into_iter()
            .filter_map(|key| {
                self.pending.remove(&key).map(|entry| ExpiredReassembly {
                    snowflake: Snowflake::from_bytes(key),
                    sender: entry.sender,
                    missing: entry
                        .slots
                        .iter()
                        .enumerate()
                        .filter(|(_, slot)| slot.is_none())
                        .map(|(index, _)| index as u32)
                        .collect(),
                })
            })
            .collect()
    }
}
