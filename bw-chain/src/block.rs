//! The block header: the 80-byte commitment that chains blocks together and
//! binds each to its transaction set via `merkle_root` (§3, §4.4).
//!
//! Grounded on `zebra-chain/src/block/header.rs`'s `block::Header`,
//! simplified from Zcash's `chrono`-timestamped, `CompactDifficulty`-typed
//! header down to the plain Bitcoin wire shape: `u32` timestamp, raw
//! compact-bits `nBits`. Difficulty comparison itself is left to
//! `ChainParameters` (§4.6), an external collaborator the same way it is
//! there.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::cached::Cached;
use crate::hash::Sha256d;
use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// A block header, containing metadata about a block but none of its
/// transactions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Header {
    pub version: i32,
    pub prev_block: Sha256d,
    pub merkle_root: Sha256d,
    pub timestamp: u32,
    /// The compact (`nBits`) encoding of this header's target threshold.
    pub bits: u32,
    pub nonce: u32,

    /// Cached double-SHA256 of the 80-byte header, populated by `hash()`.
    hash: Cached<Sha256d>,
}

impl Header {
    pub const fn len() -> usize {
        80
    }

    pub fn new(
        version: i32,
        prev_block: Sha256d,
        merkle_root: Sha256d,
        timestamp: u32,
        bits: u32,
        nonce: u32,
    ) -> Header {
        Header { version, prev_block, merkle_root, timestamp, bits, nonce, hash: Cached::new() }
    }

    /// The header's identity hash, computing and caching it on first use.
    pub fn hash(&mut self) -> Sha256d {
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        let bytes = self.bitcoin_serialize_to_vec().expect("writing to a Vec is infallible");
        let hash = Sha256d::of(&bytes);
        *self.hash.mut_value() = Some(hash);
        hash
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.prev_block == other.prev_block
            && self.merkle_root == other.merkle_root
            && self.timestamp == other.timestamp
            && self.bits == other.bits
            && self.nonce == other.nonce
    }
}
impl Eq for Header {}

impl BitcoinSerialize for Header {
    fn bitcoin_serialize<W: Write>(&self, mut target: W) -> Result<(), io::Error> {
        self.version.bitcoin_serialize(&mut target)?;
        self.prev_block.bitcoin_serialize(&mut target)?;
        self.merkle_root.bitcoin_serialize(&mut target)?;
        self.timestamp.bitcoin_serialize(&mut target)?;
        self.bits.bitcoin_serialize(&mut target)?;
        self.nonce.bitcoin_serialize(&mut target)?;
        Ok(())
    }
}

impl BitcoinDeserialize for Header {
    fn bitcoin_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Header::new(
            i32::bitcoin_deserialize(&mut reader)?,
            Sha256d::bitcoin_deserialize(&mut reader)?,
            Sha256d::bitcoin_deserialize(&mut reader)?,
            u32::bitcoin_deserialize(&mut reader)?,
            u32::bitcoin_deserialize(&mut reader)?,
            u32::bitcoin_deserialize(&mut reader)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header::new(1, Sha256d::of(b"prev"), Sha256d::of(b"merkle"), 1_600_000_000, 0x1d00ffff, 7)
    }

    #[test]
    fn round_trips_through_wire_bytes() {
        bw_test::init();
        let h = header();
        let bytes = h.bitcoin_serialize_to_vec().unwrap();
        assert_eq!(bytes.len(), Header::len());
        let parsed = Header::bitcoin_deserialize(&bytes[..]).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn hash_is_stable_and_cached() {
        bw_test::init();
        let mut h = header();
        let first = h.hash();
        let second = h.hash();
        assert_eq!(first, second);
    }
}
