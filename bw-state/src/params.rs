//! Chain parameters: the network-specific constants and the difficulty
//! rule a `BlockStore` consults but does not own (§4.6). `ChainParameters`
//! is an external-collaborator trait exactly as spec.md describes it;
//! `BitcoinParams` is the default concrete retarget rule this core ships so
//! a host isn't forced to write one from scratch, grounded on the
//! teacher's `zebra_consensus::block::check::difficulty_is_valid` (expand
//! compact bits, compare against a threshold) generalized into the
//! classic Bitcoin retarget window instead of Zcash's per-block LWMA.

use bw_chain::hash::Sha256d;
use bw_chain::BlockHeader;

use crate::target::Target;

/// A known-good `(height, hash)` pair used to reject deep reorgs below it
/// and to pin sync start points.
#[derive(Copy, Clone, Debug)]
pub struct Checkpoint {
    pub height: i32,
    pub hash: Sha256d,
    pub timestamp: u32,
}

/// How often the network retargets, in blocks.
pub const BLOCK_DIFFICULTY_INTERVAL: i32 = 2016;
/// The target spacing the retarget window is measured against, in seconds
/// (2 weeks at 10 minutes/block).
pub const TARGET_TIMESPAN_SECS: u32 = 14 * 24 * 60 * 60;

/// The network-specific facts and rules a `BlockStore` needs but cannot
/// derive from the blocks it has seen (§4.6).
pub trait ChainParameters: Send + Sync {
    fn standard_port(&self) -> u16;
    fn magic_number(&self) -> u32;
    fn services(&self) -> u64;
    fn dns_seeds(&self) -> &[&str];
    fn checkpoints(&self) -> &[Checkpoint];
    fn max_target(&self) -> Target;

    /// Verify `header`'s claimed difficulty is consistent with the chain.
    /// Only meaningful when `header`'s height is a
    /// `BLOCK_DIFFICULTY_INTERVAL` retarget boundary; the store is
    /// responsible for checking non-boundary headers simply repeat the
    /// previous block's bits. `interval_start` is the header at the
    /// beginning of the window that just closed
    /// (`height - BLOCK_DIFFICULTY_INTERVAL`).
    fn verify_difficulty(&self, header: &BlockHeader, interval_start: &BlockHeader) -> bool;
}

/// The classic Bitcoin retarget rule: every `BLOCK_DIFFICULTY_INTERVAL`
/// blocks, scale the previous target by the ratio of the actual window
/// timespan to `TARGET_TIMESPAN_SECS`, clamped to a 4x swing either way.
#[derive(Clone, Debug)]
pub struct BitcoinParams {
    pub standard_port: u16,
    pub magic_number: u32,
    pub services: u64,
    pub dns_seeds: Vec<&'static str>,
    pub checkpoints: Vec<Checkpoint>,
    pub max_target: Target,
}

impl BitcoinParams {
    pub fn mainnet() -> BitcoinParams {
        BitcoinParams {
            standard_port: 8333,
            magic_number: 0xD9B4_BEF9,
            services: 1,
            dns_seeds: vec![
                "seed.bitcoin.sipa.be",
                "dnsseed.bluematt.me",
                "dnsseed.bitcoin.dashjr.org",
                "seed.bitcoinstats.com",
            ],
            checkpoints: Vec::new(),
            max_target: Target::from_compact(0x1d00_ffff),
        }
    }
}

impl ChainParameters for BitcoinParams {
    fn standard_port(&self) -> u16 {
        self.standard_port
    }

    fn magic_number(&self) -> u32 {
        self.magic_number
    }

    fn services(&self) -> u64 {
        self.services
    }

    fn dns_seeds(&self) -> &[&str] {
        &self.dns_seeds
    }

    fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    fn max_target(&self) -> Target {
        self.max_target
    }

    fn verify_difficulty(&self, header: &BlockHeader, interval_start: &BlockHeader) -> bool {
        let claimed = Target::from_compact(header.bits);
        if claimed > self.max_target {
            return false;
        }

        let actual_timespan = header
            .timestamp
            .saturating_sub(interval_start.timestamp)
            .max(TARGET_TIMESPAN_SECS / 4)
            .min(TARGET_TIMESPAN_SECS * 4);
        let previous = Target::from_compact(interval_start.bits);
        let expected =
            previous.scale(actual_timespan as u64, TARGET_TIMESPAN_SECS as u64, self.max_target);

        claimed == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(timestamp: u32, bits: u32) -> BlockHeader {
        BlockHeader::new(1, Sha256d([0; 32]), Sha256d([0; 32]), timestamp, bits, 0)
    }

    #[test]
    fn unchanged_timespan_keeps_the_same_target() {
        bw_test::init();
        let params = BitcoinParams::mainnet();
        let start = header_with(0, 0x1d00_ffff);
        let end = header_with(TARGET_TIMESPAN_SECS, 0x1d00_ffff);
        assert!(params.verify_difficulty(&end, &start));
    }

    #[test]
    fn wrong_bits_are_rejected() {
        bw_test::init();
        let params = BitcoinParams::mainnet();
        let start = header_with(0, 0x1d00_ffff);
        let end = header_with(TARGET_TIMESPAN_SECS, 0x1c00_ffff);
        assert!(!params.verify_difficulty(&end, &start));
    }

    #[test]
    fn target_above_maximum_is_rejected() {
        bw_test::init();
        let params = BitcoinParams::mainnet();
        let start = header_with(0, 0x1d00_ffff);
        let end = header_with(TARGET_TIMESPAN_SECS, 0x2100_ffff);
        assert!(!params.verify_difficulty(&end, &start));
    }
}
