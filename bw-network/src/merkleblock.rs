//! The `merkleblock` payload: a header plus an undecoded partial merkle
//! tree (§3 Merkle Block, §4.4). Decoding the tree into matched transaction
//! hashes is the block store's job (`bw-state::partial_merkle`); this type
//! is only the wire-shaped container a peer hands to the manager.
//!
//! Grounded on `zebra-network`'s
//! `protocol::external::message::merkle_block::MerkleBlock`.

use std::io::{Read, Write};

use bw_chain::hash::Sha256d;
use bw_chain::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
use bw_chain::BlockHeader;

#[derive(Debug, Clone)]
pub struct MerkleBlock {
    pub header: BlockHeader,
    pub transaction_count: u32,
    /// The tree's hash nodes, depth-first, as laid out by BIP37.
    pub hashes: Vec<Sha256d>,
    /// One bit per tree node (packed into bytes, padded with zero bits).
    pub flags: Vec<u8>,
}

impl MerkleBlock {
    pub fn serialized_size(&self) -> usize {
        BlockHeader::len()
            + 4
            + bw_chain::CompactInt::size(self.hashes.len())
            + self.hashes.len() * 32
            + bw_chain::CompactInt::size(self.flags.len())
            + self.flags.len()
    }
}

impl BitcoinSerialize for MerkleBlock {
    fn bitcoin_serialize<W: Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.header.bitcoin_serialize(&mut target)?;
        self.transaction_count.bitcoin_serialize(&mut target)?;
        self.hashes.bitcoin_serialize(&mut target)?;
        self.flags.bitcoin_serialize(&mut target)
    }
}

impl BitcoinDeserialize for MerkleBlock {
    fn bitcoin_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(MerkleBlock {
            header: BlockHeader::bitcoin_deserialize(&mut reader)?,
            transaction_count: u32::bitcoin_deserialize(&mut reader)?,
            hashes: Vec::<Sha256d>::bitcoin_deserialize(&mut reader)?,
            flags: Vec::<u8>::bitcoin_deserialize(&mut reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_bytes() {
        bw_test::init();
        let header = BlockHeader::new(1, Sha256d::of(b"prev"), Sha256d::of(b"root"), 1, 2, 3);
        let block = MerkleBlock {
            header,
            transaction_count: 3,
            hashes: vec![Sha256d::of(b"a"), Sha256d::of(b"b"), Sha256d::of(b"c")],
            flags: vec![0b0000_0111],
        };
        let bytes = block.bitcoin_serialize_to_vec().unwrap();
        assert_eq!(bytes.len(), block.serialized_size());
        let parsed = MerkleBlock::bitcoin_deserialize(&bytes[..]).unwrap();
        assert_eq!(parsed.hashes, block.hashes);
        assert_eq!(parsed.flags, block.flags);
        assert_eq!(parsed.transaction_count, block.transaction_count);
    }
}
