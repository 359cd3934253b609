//! The host-facing half of the manager: notifications a wallet/daemon
//! registers for, tagged by nothing more than "one of the registered
//! delegates" (§9's pointer-set callback design — every registered
//! delegate sees every relevant event, same as the original's array of
//! raw listener pointers).

use bw_chain::hash::Sha256d;
use bw_chain::Transaction;
use bw_network::events::{PeerId, RejectCode};
use bw_state::DecodedBlock;

use crate::error::ManagerError;

/// Callbacks the manager drives as it connects, syncs, and relays.
/// Implemented by whatever owns the wallet and block store (typically the
/// daemon binary); the manager itself holds no wallet or chain state.
pub trait ManagerDelegate: Send + Sync {
    fn sync_started(&self) {}
    fn sync_stopped(&self, _err: Option<&ManagerError>) {}
    /// A relayed or mempool-announced transaction arrived; return `true`
    /// if it's relevant (the delegate should keep relaying it / track it).
    fn relayed_tx(&self, _peer: PeerId, _tx: Transaction) -> bool {
        false
    }
    fn rejected_tx(&self, _peer: PeerId, _hash: Sha256d, _code: RejectCode) {}
    fn block_received(&self, _peer: PeerId, _block: DecodedBlock) {}
    /// A peer asked for a tx by hash; return it if the delegate has it
    /// (typically an unconfirmed transaction the wallet is relaying).
    fn requested_tx(&self, _hash: Sha256d) -> Option<Transaction> {
        None
    }
    fn save_peers(&self, _peers: &[crate::state::KnownPeer]) {}
    /// The chain reorganized, or otherwise needs its persisted header range
    /// replaced/extended (§6 `saveBlocks(replace, blocks, n)`). `replace`
    /// is set for a reorg, where `blocks` is the new best-chain segment
    /// that must overwrite whatever was previously saved for that range.
    fn save_blocks(&self, _replace: bool, _blocks: &[Sha256d]) {}
    /// A wallet transaction's confirmation/broadcast status changed (§6
    /// `txStatusUpdate`) — a generic "go re-read tx state" nudge, with no
    /// payload of its own.
    fn tx_status_update(&self) {}
    /// Whether the host believes the network is currently reachable at all
    /// (§6 `networkIsReachable`), consulted before the manager bothers
    /// dialing or keeping a connect loop running. Defaults to `true` for
    /// delegates (like tests) that don't model connectivity.
    fn network_is_reachable(&self) -> bool {
        true
    }
    /// The current best known chain tip height, used to reject peers that
    /// are too far behind and to decide whether a newly connected peer is
    /// worth electing as the download peer (§4.5 peer-connected policy).
    fn current_tip_height(&self) -> i32 {
        0
    }
    /// The current best known chain tip's header timestamp, compared
    /// against a wallet's `earliestKeyTime` to choose `getblocks` versus
    /// `getheaders` for a newly elected download peer (§4.5).
    fn current_tip_timestamp(&self) -> u32 {
        0
    }
    /// The wallet's `earliestKeyTime`: the oldest key's creation time, below
    /// which there's nothing for a rescan to find (§4.5).
    fn earliest_key_time(&self) -> u32 {
        0
    }
    /// The block locator to hand a freshly elected download peer's
    /// `getblocks`/`getheaders` request (§4.5).
    fn locator(&self) -> Vec<Sha256d> {
        Vec::new()
    }
}
