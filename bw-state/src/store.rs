//! The block store (§4.4): the in-memory index of known headers, the
//! orphan pool for blocks whose parent hasn't arrived yet, best-chain
//! selection and reorg bookkeeping, the locator algorithm, and the bloom
//! filter false-positive feedback loop.
//!
//! Grounded on `zebra-state`'s service in spirit (a
//! hash-indexed block index plus an explicit reorg path) but simplified to
//! height-based best-chain selection rather than cumulative-work
//! comparison, since an SPV client never has enough of the chain to
//! compare work directly — it trusts the longest header chain it can
//! verify, the same tradeoff BIP37-era lightweight clients made.

use std::collections::{HashMap, VecDeque};

use bw_chain::constants::{BLOOM_DEFAULT_FALSEPOSITIVE_RATE, BLOOM_REDUCED_FALSEPOSITIVE_RATE};
use bw_chain::hash::Sha256d;
use bw_chain::BlockHeader;

use crate::error::StateError;
use crate::params::{ChainParameters, BLOCK_DIFFICULTY_INTERVAL};

/// Bound on the orphan pool so a flood of headerless blocks can't grow it
/// without limit; oldest orphans are evicted first.
const MAX_ORPHANS: usize = 500;

#[derive(Copy, Clone, Debug)]
struct StoredHeader {
    header: BlockHeader,
    height: i32,
    prev: Sha256d,
}

/// What happened when a header was handed to the store.
#[derive(Clone, Debug)]
pub enum AcceptOutcome {
    /// Already indexed, either on a chain or still an orphan.
    AlreadyKnown,
    /// No known block has this header's `prev_block`; parked until it
    /// shows up.
    Orphan,
    /// Extended the current best chain by one block.
    ExtendsTip { height: i32 },
    /// Valid, but not longer than the current best chain.
    OldFork,
    /// This header's chain overtook the previous best chain. `disconnected`
    /// lists the abandoned blocks tip-first; `connected` lists the new
    /// blocks fork-point-first.
    Reorg { fork_height: i32, disconnected: Vec<Sha256d>, connected: Vec<Sha256d> },
}

/// What a peer's bloom-filter false-positive rate implies the manager
/// should do about that peer's filter (§4.4, §4.5 bloom lifecycle).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterFeedback {
    Ok,
    ScheduleReload,
    Disconnect,
}

pub struct BlockStore<P: ChainParameters> {
    params: P,
    by_hash: HashMap<Sha256d, StoredHeader>,
    by_height: HashMap<i32, Sha256d>,
    orphans: HashMap<Sha256d, BlockHeader>,
    orphans_by_prev: HashMap<Sha256d, Vec<Sha256d>>,
    orphan_order: VecDeque<Sha256d>,
    tip: Sha256d,
    tip_height: i32,
    average_tx_per_block: f64,
    fp_rate: f64,
}

impl<P: ChainParameters> BlockStore<P> {
    pub fn new(params: P, mut genesis: BlockHeader) -> BlockStore<P> {
        let hash = genesis.hash();
        let mut by_hash = HashMap::new();
        by_hash.insert(hash, StoredHeader { header: genesis, height: 0, prev: genesis.prev_block });
        let mut by_height = HashMap::new();
        by_height.insert(0, hash);

        BlockStore {
            params,
            by_hash,
            by_height,
            orphans: HashMap::new(),
            orphans_by_prev: HashMap::new(),
            orphan_order: VecDeque::new(),
            tip: hash,
            tip_height: 0,
            average_tx_per_block: 0.0,
            fp_rate: 0.0,
        }
    }

    pub fn params(&self) -> &P {
        &self.params
    }

    pub fn tip(&self) -> Sha256d {
        self.tip
    }

    pub fn tip_height(&self) -> i32 {
        self.tip_height
    }

    pub fn header(&self, hash: &Sha256d) -> Option<BlockHeader> {
        self.by_hash.get(hash).map(|stored| stored.header)
    }

    pub fn height_of(&self, hash: &Sha256d) -> Option<i32> {
        self.by_hash.get(hash).map(|stored| stored.height)
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    fn ancestor(&self, mut hash: Sha256d, generations: i32) -> Option<BlockHeader> {
        let mut remaining = generations;
        loop {
            let stored = self.by_hash.get(&hash)?;
            if remaining <= 0 {
                return Some(stored.header);
            }
            hash = stored.prev;
            remaining -= 1;
        }
    }

    /// Hand a newly received header to the store (§4.4's nine acceptance
    /// cases, collapsed into the cases that actually change store state —
    /// `header-only-too-recent` and `filter-reload-pending` are timing
    /// policy the peer manager applies before a header ever reaches here).
    pub fn accept_header(&mut self, mut header: BlockHeader) -> Result<AcceptOutcome, StateError> {
        let hash = header.hash();

        if self.by_hash.contains_key(&hash) || self.orphans.contains_key(&hash) {
            return Ok(AcceptOutcome::AlreadyKnown);
        }

        let parent = match self.by_hash.get(&header.prev_block) {
            Some(parent) => *parent,
            None => {
                self.insert_orphan(hash, header);
                return Ok(AcceptOutcome::Orphan);
            }
        };

        let new_height = parent.height + 1;

        if new_height % BLOCK_DIFFICULTY_INTERVAL == 0 {
            let interval_start = self
                .ancestor(header.prev_block, BLOCK_DIFFICULTY_INTERVAL - 1)
                .ok_or(StateError::MissingDifficultyAncestor(hash))?;
            if !self.params.verify_difficulty(&header, &interval_start) {
                return Err(StateError::InvalidBlock(hash));
            }
        } else if header.bits != parent.header.bits {
            return Err(StateError::InvalidBlock(hash));
        }

        if let Some(checkpoint) = self.params.checkpoints().iter().find(|c| c.height == new_height) {
            if checkpoint.hash != hash {
                return Err(StateError::CheckpointMismatch { height: new_height });
            }
        }

        self.by_hash.insert(hash, StoredHeader { header, height: new_height, prev: header.prev_block });

        let outcome = if new_height > self.tip_height {
            if header.prev_block == self.tip {
                self.by_height.insert(new_height, hash);
                self.tip = hash;
                self.tip_height = new_height;
                AcceptOutcome::ExtendsTip { height: new_height }
            } else {
                let (fork_height, disconnected, connected) = self.reorg_path(hash, new_height);
                for (offset, connected_hash) in connected.iter().enumerate() {
                    self.by_height.insert(fork_height + 1 + offset as i32, *connected_hash);
                }
                self.tip = hash;
                self.tip_height = new_height;
                AcceptOutcome::Reorg { fork_height, disconnected, connected }
            }
        } else {
            AcceptOutcome::OldFork
        };

        self.reattach_orphans(hash);

        Ok(outcome)
    }

    fn insert_orphan(&mut self, hash: Sha256d, header: BlockHeader) {
        if self.orphans.len() >= MAX_ORPHANS {
            if let Some(oldest) = self.orphan_order.pop_front() {
                if let Some(removed) = self.orphans.remove(&oldest) {
                    if let Some(siblings) = self.orphans_by_prev.get_mut(&removed.prev_block) {
                        siblings.retain(|h| *h != oldest);
                    }
                }
            }
        }

        self.orphans.insert(hash, header);
        self.orphans_by_prev.entry(header.prev_block).or_insert_with(Vec::new).push(hash);
        self.orphan_order.push_back(hash);
        metrics::gauge!("bw_state_orphan_count", self.orphans.len() as f64);
    }

    fn reattach_orphans(&mut self, parent_hash: Sha256d) {
        let children = self.orphans_by_prev.remove(&parent_hash).unwrap_or_default();
        for child_hash in children {
            if let Some(header) = self.orphans.remove(&child_hash) {
                if let Some(pos) = self.orphan_order.iter().position(|h| *h == child_hash) {
                    self.orphan_order.remove(pos);
                }
                // Ignore the nested outcome: the caller only observes the
                // header it directly submitted.
                let _ = self.accept_header(header);
            }
        }
    }

    /// Walk both chains back to their common ancestor, returning its
    /// height plus the abandoned (`disconnected`) and newly-best
    /// (`connected`) block hashes.
    fn reorg_path(&self, new_tip: Sha256d, new_height: i32) -> (i32, Vec<Sha256d>, Vec<Sha256d>) {
        let mut old_hash = self.tip;
        let mut old_height = self.tip_height;
        let mut new_hash = new_tip;
        let mut new_cursor = new_height;
        let mut disconnected = Vec::new();
        let mut connected = Vec::new();

        while new_cursor > old_height {
            connected.push(new_hash);
            new_hash = self.by_hash[&new_hash].prev;
            new_cursor -= 1;
        }
        while old_height > new_cursor {
            disconnected.push(old_hash);
            old_hash = self.by_hash[&old_hash].prev;
            old_height -= 1;
        }
        while old_hash != new_hash {
            disconnected.push(old_hash);
            connected.push(new_hash);
            old_hash = self.by_hash[&old_hash].prev;
            new_hash = self.by_hash[&new_hash].prev;
            old_height -= 1;
        }

        connected.reverse();
        (old_height, disconnected, connected)
    }

    /// The block locator for a `getheaders`/`getblocks` request: the tip,
    /// then the previous nine blocks, then exponentially sparser ancestors
    /// back to genesis.
    pub fn locator(&self) -> Vec<Sha256d> {
        let mut hashes = Vec::new();
        let mut height = self.tip_height;
        let mut step = 1;

        loop {
            match self.by_height.get(&height) {
                Some(hash) => hashes.push(*hash),
                None => break,
            }
            if height == 0 {
                break;
            }
            if hashes.len() >= 10 {
                step *= 2;
            }
            height = (height - step).max(0);
        }

        hashes
    }

    /// Update the bloom false-positive EMAs after a `merkleblock` arrives,
    /// returning whether the manager should reload or drop the peer that
    /// sent it (§4.4 bloom false-positive feedback, §4.5 bloom lifecycle).
    pub fn record_filter_feedback(
        &mut self,
        blocks_behind: i32,
        total_tx: u32,
        fp_count: usize,
    ) -> FilterFeedback {
        self.average_tx_per_block = 0.999 * self.average_tx_per_block + 0.001 * total_tx as f64;

        if self.average_tx_per_block > 0.0 {
            let total_ratio = 0.01 * total_tx as f64 / self.average_tx_per_block;
            let fp_ratio = 0.01 * fp_count as f64 / self.average_tx_per_block;
            self.fp_rate = self.fp_rate * (1.0 - total_ratio) + fp_ratio;
        }

        metrics::gauge!("bw_state_filter_fp_rate", self.fp_rate);
        metrics::gauge!("bw_state_average_tx_per_block", self.average_tx_per_block);

        if self.fp_rate > 10.0 * BLOOM_DEFAULT_FALSEPOSITIVE_RATE {
            FilterFeedback::Disconnect
        } else if blocks_behind >= 500 && self.fp_rate > 10.0 * BLOOM_REDUCED_FALSEPOSITIVE_RATE {
            FilterFeedback::ScheduleReload
        } else {
            FilterFeedback::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BitcoinParams;

    fn header(prev: Sha256d, nonce: u32) -> BlockHeader {
        BlockHeader::new(1, prev, Sha256d([0; 32]), 0, 0x1d00_ffff, nonce)
    }

    fn store_with_genesis() -> (BlockStore<BitcoinParams>, Sha256d) {
        let genesis = header(Sha256d([0; 32]), 0);
        let mut genesis_copy = genesis;
        let hash = genesis_copy.hash();
        (BlockStore::new(BitcoinParams::mainnet(), genesis), hash)
    }

    #[test]
    fn extends_tip_for_a_direct_child() {
        bw_test::init();
        let (mut store, genesis_hash) = store_with_genesis();
        let child = header(genesis_hash, 1);
        match store.accept_header(child).unwrap() {
            AcceptOutcome::ExtendsTip { height } => assert_eq!(height, 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.tip_height(), 1);
    }

    #[test]
    fn unknown_parent_is_an_orphan() {
        bw_test::init();
        let (mut store, _genesis_hash) = store_with_genesis();
        let orphan = header(Sha256d([7; 32]), 1);
        assert!(matches!(store.accept_header(orphan).unwrap(), AcceptOutcome::Orphan));
        assert_eq!(store.orphan_count(), 1);
    }

    #[test]
    fn orphan_reattaches_once_its_parent_arrives() {
        bw_test::init();
        let (mut store, genesis_hash) = store_with_genesis();
        let mut child = header(genesis_hash, 1);
        let child_hash = child.hash();
        let grandchild = header(child_hash, 2);

        assert!(matches!(store.accept_header(grandchild).unwrap(), AcceptOutcome::Orphan));
        assert_eq!(store.orphan_count(), 1);

        store.accept_header(child).unwrap();
        assert_eq!(store.orphan_count(), 0);
        assert_eq!(store.tip_height(), 2);
    }

    #[test]
    fn a_longer_side_chain_triggers_a_reorg() {
        bw_test::init();
        let (mut store, genesis_hash) = store_with_genesis();

        let mut a1 = header(genesis_hash, 1);
        let a1_hash = a1.hash();
        store.accept_header(a1).unwrap();

        let b1 = header(genesis_hash, 2);
        let mut b1_owned = b1;
        let b1_hash = b1_owned.hash();
        match store.accept_header(b1).unwrap() {
            AcceptOutcome::OldFork => {}
            other => panic!("unexpected outcome: {:?}", other),
        }

        let b2 = header(b1_hash, 3);
        match store.accept_header(b2).unwrap() {
            AcceptOutcome::Reorg { fork_height, disconnected, connected } => {
                assert_eq!(fork_height, 0);
                assert_eq!(disconnected, vec![a1_hash]);
                assert_eq!(connected.len(), 2);
                assert_eq!(connected[0], b1_hash);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.tip_height(), 2);
    }

    #[test]
    fn locator_always_ends_at_genesis() {
        bw_test::init();
        let (mut store, mut prev) = store_with_genesis();
        for i in 1..30 {
            let h = header(prev, i);
            let mut h_owned = h;
            prev = h_owned.hash();
            store.accept_header(h).unwrap();
        }
        let locator = store.locator();
        assert_eq!(store.height_of(locator.last().unwrap()), Some(0));
        assert!(locator.len() < 29, "locator should skip ancestors, not list every block");
    }

    #[test]
    fn high_false_positive_rate_schedules_disconnect() {
        bw_test::init();
        let (mut store, _genesis_hash) = store_with_genesis();
        let mut feedback = FilterFeedback::Ok;
        for _ in 0..20 {
            feedback = store.record_filter_feedback(0, 100, 50);
        }
        assert_eq!(feedback, FilterFeedback::Disconnect);
    }
}
