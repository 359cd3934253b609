//! The manager's mutable state, held behind a single `Mutex` (§5
//! Concurrency & Resource Model): known peer addresses, connected peer
//! sessions, and the relay bookkeeping (`txRelays`/`txRequests`) used to
//! decide who to ask for a transaction and who has already seen one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bw_chain::hash::Sha256d;
use bw_network::events::PeerId;
use bw_network::peer::Peer;
use bw_network::Filter;

/// An address learned via DNS seed, `addr`/`getaddr`, or configuration,
/// not yet (or no longer) connected.
#[derive(Clone, Debug)]
pub struct KnownPeer {
    pub host: String,
    pub port: u16,
    pub services: u64,
    pub timestamp: u32,
    pub connect_failure_count: u32,
    pub last_attempt: Option<Instant>,
}

/// A live peer session and the bookkeeping the manager keeps about it.
pub struct ConnectedPeer {
    pub id: PeerId,
    pub peer: Arc<dyn Peer>,
    pub is_download_peer: bool,
    pub filter_loaded: bool,
    pub needs_filter_reload: bool,
}

#[derive(Default)]
pub struct ManagerState {
    pub known: HashMap<(String, u16), KnownPeer>,
    pub connected: HashMap<PeerId, ConnectedPeer>,
    /// Peers known (by relay or inv) to already have a given tx.
    pub tx_relays: HashMap<Sha256d, HashSet<PeerId>>,
    /// Peers we've asked for a given tx and are waiting to hear back from.
    pub tx_requests: HashMap<Sha256d, HashSet<PeerId>>,
    /// Wallet transactions we've published, and when — drives the
    /// unrelayed-tx resend sweep (§4.5 tx publish).
    pub published: HashMap<Sha256d, Instant>,
    /// Published transactions whose relay count has reached
    /// `PEER_MAX_CONNECTIONS`, so the verified-notification only fires once.
    pub verified: HashSet<Sha256d>,
    pub filter: Option<Filter>,
    pub sync_peer: Option<PeerId>,
    pub next_peer_id: u64,
}

impl ManagerState {
    pub fn new() -> ManagerState {
        ManagerState { next_peer_id: 1, ..Default::default() }
    }

    pub fn allocate_peer_id(&mut self) -> PeerId {
        let id = PeerId(self.next_peer_id);
        self.next_peer_id += 1;
        id
    }

    /// Misbehavior/connect-failure accounting: §9 preserves the flake
    /// where a manual `connect()` call resets the failure counter, since
    /// the original treats an explicit retry as evidence the operator
    /// believes the peer is reachable again.
    pub fn record_connect_failure(&mut self, host: &str, port: u16) {
        if let Some(known) = self.known.get_mut(&(host.to_string(), port)) {
            known.connect_failure_count += 1;
            known.last_attempt = Some(Instant::now());
        }
    }

    pub fn reset_connect_failures(&mut self, host: &str, port: u16) {
        if let Some(known) = self.known.get_mut(&(host.to_string(), port)) {
            known.connect_failure_count = 0;
        }
    }

    pub fn is_backed_off(&self, host: &str, port: u16, retry_after: Duration) -> bool {
        match self.known.get(&(host.to_string(), port)) {
            Some(known) => match known.last_attempt {
                Some(at) => at.elapsed() < retry_after,
                None => false,
            },
            None => false,
        }
    }
}
