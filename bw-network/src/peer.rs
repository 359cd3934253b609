//! The Peer Capability contract (§4.1): everything the Peer Manager may
//! tell a peer session to do. The byte-level wire protocol behind these
//! calls (framing, handshake, ping/pong, `getheaders`, ...) is out of scope
//! for this core and is implemented by whatever `Peer` the host plugs in.

use std::time::Duration;

use bw_chain::hash::Sha256d;

use crate::bloom::Filter;
use crate::inv::InventoryVector;

/// A peer session's connection lifecycle state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConnectStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// A reason a peer was disconnected, surfaced to the manager's
/// `disconnected` callback (§7).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DisconnectReason {
    /// The peer sent a message `zebra`/Bitcoin peers would reject on
    /// protocol grounds (EPROTO, §7 `ProtocolViolation`).
    Misbehaving,
    /// No response within `PROTOCOL_TIMEOUT` (ETIMEDOUT, §7 `Timeout`).
    Timeout,
    /// A local or remote close unrelated to protocol violation.
    Closed,
}

/// Point-in-time facts a peer reports about itself (§4.1).
#[derive(Clone, Debug)]
pub struct PeerInfo {
    pub host: String,
    pub port: u16,
    pub connect_status: ConnectStatus,
    pub last_block: i32,
    pub ping_time: Option<Duration>,
    pub version: u32,
    pub services: u64,
    pub fee_per_kb: u64,
    pub timestamp: u32,
}

/// Everything the Manager may ask a `Peer` session to do (§4.1).
///
/// A concrete `Peer` owns a message-pumping thread of its own (§5) and
/// reports back to the Manager through a `PeerHandler` it was constructed
/// with; this trait only covers the outbound half of the contract. `Sync`
/// is required alongside `Send` because the manager holds peers behind a
/// shared `Arc` reachable from any connection's thread, not just the one
/// that registered it.
pub trait Peer: Send + Sync {
    fn info(&self) -> PeerInfo;

    fn connect(&self);
    fn disconnect(&self);
    /// `None` cancels any pending scheduled disconnect; `Some(d)` (re)arms
    /// the watchdog for `d` from now.
    fn schedule_disconnect(&self, after: Option<Duration>);

    fn send_filterload(&self, filter: &Filter);
    fn send_getblocks(&self, locator: Vec<Sha256d>, stop: Sha256d);
    fn send_getheaders(&self, locator: Vec<Sha256d>, stop: Sha256d);
    fn send_getdata(&self, items: Vec<InventoryVector>);
    fn send_mempool(&self);
    fn send_inv(&self, items: Vec<InventoryVector>);
    /// Guarantees any inbound message already enqueued from this peer is
    /// processed before `done` runs (§4.1) — the barrier used to sequence
    /// filter reload, mempool completion, and publish results.
    fn send_ping(&self, done: Box<dyn FnOnce() + Send>);
    fn send_getaddr(&self);
    fn rerequest_blocks(&self, hashes: Vec<Sha256d>);

    fn set_current_block_height(&self, height: i32);
    fn set_needs_filter_update(&self, needs_update: bool);
    fn set_earliest_key_time(&self, timestamp: u32);
}
