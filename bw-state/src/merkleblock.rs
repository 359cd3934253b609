//! The decoded block representation the store works with: a header plus
//! the transaction hashes a loaded bloom filter matched, recovered from
//! the raw wire-shaped `bw_network::MerkleBlock` a peer delivers (§3, §4.4).

use bw_chain::BlockHeader;
use bw_network::MerkleBlock;

use crate::error::StateError;
use crate::partial_merkle;

/// Height is unknown until the store places the block on a chain.
pub const UNKNOWN_HEIGHT: i32 = -1;

/// A block after its partial merkle tree has been decoded and checked
/// against the header it claims to belong to.
#[derive(Clone, Debug)]
pub struct DecodedBlock {
    pub header: BlockHeader,
    pub height: i32,
    pub total_tx: u32,
    pub matched_tx_hashes: Vec<bw_chain::hash::Sha256d>,
}

impl DecodedBlock {
    /// Decode `raw`'s partial merkle tree and verify its root matches the
    /// header before trusting any of the matched hashes.
    pub fn decode(raw: &MerkleBlock) -> Result<DecodedBlock, StateError> {
        let (root, matched) =
            partial_merkle::decode(raw.transaction_count as usize, &raw.hashes, &raw.flags)?;
        if root != raw.header.merkle_root {
            return Err(StateError::MerkleRootMismatch);
        }

        Ok(DecodedBlock {
            header: raw.header,
            height: UNKNOWN_HEIGHT,
            total_tx: raw.transaction_count,
            matched_tx_hashes: matched,
        })
    }

    pub fn hash(&mut self) -> bw_chain::hash::Sha256d {
        self.header.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bw_chain::hash::Sha256d;

    #[test]
    fn decoding_checks_the_merkle_root() {
        bw_test::init();
        // A single-transaction block's merkle root is just that
        // transaction's hash; there is nothing to pair it with.
        let leaf = Sha256d::of(b"only-tx");
        let header = BlockHeader::new(1, Sha256d([0; 32]), leaf, 0, 0x1d00_ffff, 0);
        let raw = MerkleBlock {
            header,
            transaction_count: 1,
            hashes: vec![leaf],
            flags: vec![0b0000_0001],
        };
        let decoded = DecodedBlock::decode(&raw).unwrap();
        assert_eq!(decoded.matched_tx_hashes, vec![leaf]);
        assert_eq!(decoded.height, UNKNOWN_HEIGHT);
    }

    #[test]
    fn mismatched_root_is_rejected() {
        bw_test::init();
        let leaf = Sha256d::of(b"only-tx");
        let wrong_root = Sha256d::of(b"not-the-root");
        let header = BlockHeader::new(1, Sha256d([0; 32]), wrong_root, 0, 0x1d00_ffff, 0);
        let raw = MerkleBlock {
            header,
            transaction_count: 1,
            hashes: vec![leaf],
            flags: vec![0b0000_0001],
        };
        assert!(matches!(DecodedBlock::decode(&raw), Err(StateError::MerkleRootMismatch)));
    }
}
