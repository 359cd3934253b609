//! The Manager-facing half of the Peer Capability contract: the callbacks
//! a `Peer` session delivers as it receives protocol messages (§4.1).
//!
//! Each peer's callback stream is totally ordered (its pump is
//! single-threaded, §5); across peers there is no ordering. Implementors
//! (the Peer Manager) must acquire their lock on entry and release it
//! before calling back into any `Peer` or host code.

use bw_chain::hash::Sha256d;
use bw_chain::Transaction;

use crate::inv::InventoryVector;
use crate::peer::DisconnectReason;

/// Opaque identity for a connected peer, stable for the lifetime of the
/// session. The Manager keys its per-peer tables (`txRelays`, `txRequests`,
/// ...) on this.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PeerId(pub u64);

/// An address relayed by a peer's `addr` message (§4.5 connect loop).
#[derive(Clone, Debug)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
    pub services: u64,
    pub timestamp: u32,
}

/// A rejection code accompanying `rejectedTx` (§4.1, §7).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RejectCode {
    Malformed,
    Invalid,
    Obsolete,
    Duplicate,
    NonStandard,
    Dust,
    InsufficientFee,
    Checkpoint,
    Other(u8),
}

/// Inbound notifications the Peer Manager implements to receive events
/// from every connected `Peer` (§4.1). `block` is generic so this crate
/// does not need to know about the block store's decoded representation;
/// the manager instantiates it with `bw_state::merkleblock::MerkleBlock`.
pub trait PeerHandler<Block>: Send + Sync {
    fn connected(&self, peer: PeerId);
    fn disconnected(&self, peer: PeerId, reason: DisconnectReason);
    fn relayed_peers(&self, peer: PeerId, peers: Vec<PeerAddress>);
    fn relayed_tx(&self, peer: PeerId, tx: Transaction);
    fn has_tx(&self, peer: PeerId, hash: Sha256d);
    fn rejected_tx(&self, peer: PeerId, hash: Sha256d, code: RejectCode);
    fn relayed_block(&self, peer: PeerId, block: Block);
    fn data_notfound(&self, peer: PeerId, items: Vec<InventoryVector>);
    fn set_fee_per_kb(&self, peer: PeerId, fee_per_kb: u64);
    /// The peer is asking us for a transaction we announced; `None` means
    /// we no longer have it (already confirmed, or published by someone
    /// else and forgotten).
    fn requested_tx(&self, peer: PeerId, hash: Sha256d) -> Option<Transaction>;
    fn network_is_reachable(&self) -> bool;
    fn thread_cleanup(&self, peer: PeerId);
}
