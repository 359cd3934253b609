//! The manager: connect-loop bookkeeping, peer-connected policy, the
//! bloom filter lifecycle, transaction publishing, and relay bookkeeping
//! (§4.5). Concurrency here is deliberately plain OS threads and coarse
//! mutexes rather than a `tokio`/`tower` stack — a peer
//! session is a blocking loop the host runs on its own thread, and the
//! manager is just the shared state those threads (and the host) touch
//! through a lock (§5).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bw_chain::constants::{
    EARLIEST_KEY_TIME_WINDOW_SECS, NODE_BLOOM, NODE_NETWORK, PEER_LAST_BLOCK_LAG_LIMIT,
    PEER_MAX_CONNECTIONS, PEER_VERSION_BLOOM_MIN, PROTOCOL_TIMEOUT_SECS,
};
use bw_chain::hash::Sha256d;
use bw_chain::{BwRand, Transaction};
use bw_network::events::{PeerAddress, PeerHandler, PeerId, RejectCode};
use bw_network::peer::{DisconnectReason, Peer};
use bw_network::{Filter, InventoryVector};
use bw_state::DecodedBlock;
use tracing::{debug, warn};

use crate::connect;
use crate::delegate::ManagerDelegate;
use crate::error::ManagerError;
use crate::state::{ConnectedPeer, KnownPeer, ManagerState};

pub struct PeerManager {
    state: Mutex<ManagerState>,
    delegates: Mutex<Vec<Arc<dyn ManagerDelegate>>>,
    rng: Mutex<BwRand>,
}

impl PeerManager {
    pub fn new() -> Arc<PeerManager> {
        Arc::new(PeerManager {
            state: Mutex::new(ManagerState::new()),
            delegates: Mutex::new(Vec::new()),
            rng: Mutex::new(BwRand::from_entropy()),
        })
    }

    pub fn add_delegate(&self, delegate: Arc<dyn ManagerDelegate>) {
        self.delegates.lock().unwrap().push(delegate);
    }

    fn for_each_delegate(&self, mut f: impl FnMut(&Arc<dyn ManagerDelegate>)) {
        let delegates = self.delegates.lock().unwrap().clone();
        for delegate in &delegates {
            f(delegate);
        }
    }

    /// Every registered delegate is meant to model the same host, so for
    /// the handful of callbacks that ask the host a question (rather than
    /// just notifying it), the first delegate's answer is authoritative;
    /// `default` covers the no-delegate-registered case (tests).
    fn delegate_or<T>(&self, default: T, f: impl Fn(&Arc<dyn ManagerDelegate>) -> T) -> T {
        let delegates = self.delegates.lock().unwrap().clone();
        delegates.first().map(|d| f(d)).unwrap_or(default)
    }

    pub fn learn_peer(&self, addr: PeerAddress) {
        let mut state = self.state.lock().unwrap();
        let key = (addr.host.clone(), addr.port);
        let entry = state.known.entry(key).or_insert_with(|| KnownPeer {
            host: addr.host.clone(),
            port: addr.port,
            services: addr.services,
            timestamp: addr.timestamp,
            connect_failure_count: 0,
            last_attempt: None,
        });
        if addr.timestamp > entry.timestamp {
            entry.timestamp = addr.timestamp;
            entry.services = addr.services;
        }
        drop(state);
        let snapshot: Vec<KnownPeer> = self.state.lock().unwrap().known.values().cloned().collect();
        self.for_each_delegate(|d| d.save_peers(&snapshot));
    }

    /// Pick the next address to dial, per the connect loop's peer
    /// selection policy (§4.5). Returns `None` when nothing is eligible
    /// (exhausted failure budgets, or no known peers at all).
    pub fn next_connect_target(&self) -> Option<(String, u16)> {
        let state = self.state.lock().unwrap();
        let connected_hosts: HashSet<(String, u16)> = state
            .connected
            .values()
            .map(|p| {
                let info = p.peer.info();
                (info.host, info.port)
            })
            .collect();
        let candidates: Vec<&KnownPeer> = connect::eligible(
            state.known.values().filter(|p| !connected_hosts.contains(&(p.host.clone(), p.port))),
        );
        let mut rng = self.rng.lock().unwrap();
        connect::pick(candidates, &mut rng).map(|p| (p.host.clone(), p.port))
    }

    pub fn connected_count(&self) -> usize {
        self.state.lock().unwrap().connected.len()
    }

    pub fn wants_more_connections(&self) -> bool {
        self.connected_count() < PEER_MAX_CONNECTIONS
    }

    /// A manual reconnect attempt resets the failure counter (§9): the
    /// operator asking to retry is itself evidence the peer might be
    /// reachable again, the same flake the original tracked this way.
    pub fn connect(&self, host: &str, port: u16) {
        self.state.lock().unwrap().reset_connect_failures(host, port);
    }

    pub fn connect_failed(&self, host: &str, port: u16) {
        self.state.lock().unwrap().record_connect_failure(host, port);
    }

    /// Register a freshly connected peer session and apply the full
    /// peer-connected policy (§4.5 items 2–6): reject peers that don't
    /// advertise the services this core needs or that are too far behind
    /// our tip, elect (or re-elect) a download peer, push the bloom filter
    /// and drive the mempool/publish catch-up once a peer is onboarded as
    /// a relay peer, and arm the protocol timeout watchdog. Returns `None`
    /// if the peer was rejected and disconnected outright.
    pub fn peer_connected(&self, peer: Arc<dyn Peer>) -> Option<PeerId> {
        let info = peer.info();

        if info.services & NODE_NETWORK == 0
            || (info.version >= PEER_VERSION_BLOOM_MIN && info.services & NODE_BLOOM == 0)
        {
            debug!(host = %info.host, services = info.services, version = info.version, "peer lacks required services, disconnecting");
            peer.disconnect();
            return None;
        }

        let our_tip_height = self.delegate_or(0, |d| d.current_tip_height());
        if info.last_block > 0 && our_tip_height - info.last_block >= PEER_LAST_BLOCK_LAG_LIMIT {
            debug!(host = %info.host, last_block = info.last_block, our_tip_height, "peer is too far behind our tip, disconnecting");
            peer.disconnect();
            return None;
        }

        peer.schedule_disconnect(Some(Duration::from_secs(PROTOCOL_TIMEOUT_SECS)));

        let mut state = self.state.lock().unwrap();
        let id = state.allocate_peer_id();

        let existing_is_at_least_as_good = state
            .sync_peer
            .and_then(|sync_id| state.connected.get(&sync_id))
            .map(|download_peer| download_peer.peer.info().last_block >= info.last_block)
            .unwrap_or(false);

        state.connected.insert(
            id,
            ConnectedPeer { id, peer: peer.clone(), is_download_peer: false, filter_loaded: false, needs_filter_reload: false },
        );
        metrics::gauge!("bw_peer_manager_connected_peers", state.connected.len() as f64);

        if existing_is_at_least_as_good {
            if our_tip_height >= info.last_block {
                if let Some(filter) = state.filter.clone() {
                    peer.send_filterload(&filter);
                }
                if let Some(connected) = state.connected.get_mut(&id) {
                    connected.filter_loaded = true;
                }
                let pending: Vec<Sha256d> = state.published.keys().copied().collect();
                drop(state);

                for hash in pending {
                    peer.send_inv(vec![InventoryVector::Tx(hash)]);
                }
                peer.send_ping(Box::new(|| {}));
                peer.send_mempool();
            } else {
                drop(state);
                debug!(?id, "new peer left unfiltered until the active sync finishes");
            }
            return Some(id);
        }

        // Elect a (possibly new) download peer: among every connected peer,
        // including the one that just connected, prefer the one with the
        // lowest ping time among those whose lastBlock is at least as high
        // as this peer's (§4.5 item 5).
        let candidates: Vec<(PeerId, bw_network::peer::PeerInfo)> =
            state.connected.values().map(|p| (p.id, p.peer.info())).collect();
        let elected = candidates
            .iter()
            .filter(|(_, candidate_info)| candidate_info.last_block >= info.last_block)
            .min_by_key(|(_, candidate_info)| candidate_info.ping_time.unwrap_or(Duration::MAX))
            .map(|(candidate_id, _)| *candidate_id)
            .unwrap_or(id);

        let previous_download_peer = state.sync_peer.replace(elected);
        if let Some(previous_id) = previous_download_peer {
            if previous_id != elected {
                if let Some(previous) = state.connected.get_mut(&previous_id) {
                    previous.is_download_peer = false;
                    previous.peer.disconnect();
                }
            }
        }
        let elected_peer = state.connected.get_mut(&elected).map(|connected| {
            connected.is_download_peer = true;
            connected.peer.clone()
        });
        let filter = state.filter.clone();
        drop(state);

        if let (Some(elected_peer), Some(filter)) = (&elected_peer, &filter) {
            elected_peer.send_filterload(filter);
        }
        if let Some(elected_peer) = &elected_peer {
            let tip_timestamp = self.delegate_or(0, |d| d.current_tip_timestamp());
            let earliest_key_time = self.delegate_or(0, |d| d.earliest_key_time());
            let locator = self.delegate_or(Vec::new(), |d| d.locator());
            let stop = Sha256d::default();
            if tip_timestamp.abs_diff(earliest_key_time) <= EARLIEST_KEY_TIME_WINDOW_SECS {
                elected_peer.send_getblocks(locator, stop);
            } else {
                elected_peer.send_getheaders(locator, stop);
            }
        }

        if previous_download_peer.is_none() {
            metrics::counter!("bw_peer_manager_sync_started_total", 1);
            self.for_each_delegate(|d| d.sync_started());
        } else {
            debug!(?elected, "re-elected download peer");
        }

        Some(id)
    }

    pub fn peer_disconnected(&self, id: PeerId, reason: DisconnectReason) {
        let mut state = self.state.lock().unwrap();
        let was_sync_peer = state.sync_peer == Some(id);
        state.connected.remove(&id);
        for peers in state.tx_requests.values_mut() {
            peers.remove(&id);
        }
        for peers in state.tx_relays.values_mut() {
            peers.remove(&id);
        }
        metrics::gauge!("bw_peer_manager_connected_peers", state.connected.len() as f64);

        if was_sync_peer {
            state.sync_peer = state.connected.keys().next().copied();
            let sync_ended = state.sync_peer.is_none();
            drop(state);
            debug!(?id, ?reason, "sync peer disconnected");
            if sync_ended {
                metrics::counter!("bw_peer_manager_sync_stopped_total", 1);
                self.for_each_delegate(|d| d.sync_stopped(None));
            }
            return;
        }
        drop(state);
        debug!(?id, ?reason, "peer disconnected");
    }

    /// Replace the loaded bloom filter and push it out to every connected
    /// peer (§4.5 bloom lifecycle).
    pub fn reload_filter(&self, filter: Filter) {
        let mut state = self.state.lock().unwrap();
        state.filter = Some(filter.clone());
        for peer in state.connected.values_mut() {
            peer.peer.send_filterload(&filter);
            peer.needs_filter_reload = false;
        }
        metrics::counter!("bw_peer_manager_bloom_reloads_total", 1);
    }

    /// Schedule a filter reload on every connected peer without changing
    /// it yet; the caller rebuilds the filter and calls `reload_filter`
    /// once the rebuild is ready (the two-ping round trip §4.5 describes
    /// for sequencing a reload is the caller's concern, not the manager's
    /// bookkeeping here).
    pub fn schedule_filter_reload(&self) {
        let mut state = self.state.lock().unwrap();
        for peer in state.connected.values_mut() {
            peer.needs_filter_reload = true;
        }
    }

    /// Publish a transaction: relay it over `inv` to every connected peer
    /// except the download peer (unless it's the only peer connected, in
    /// which case it has no choice), drive the resulting `getdata` round
    /// trip with a `ping` barrier, and record the relay bookkeeping (§4.5
    /// tx publish + relay bookkeeping).
    pub fn publish_tx(&self, tx: &Transaction) -> Result<(), ManagerError> {
        let hash = tx.tx_hash().ok_or_else(|| {
            ManagerError::InvalidInput("cannot publish a transaction with no cached hash".into())
        })?;

        let mut state = self.state.lock().unwrap();
        if state.connected.is_empty() {
            return Err(ManagerError::Unreachable);
        }

        let targets: Vec<(PeerId, Arc<dyn Peer>)> = if state.connected.len() == 1 {
            state.connected.values().map(|p| (p.id, p.peer.clone())).collect()
        } else {
            state
                .connected
                .values()
                .filter(|p| !p.is_download_peer)
                .map(|p| (p.id, p.peer.clone()))
                .collect()
        };

        let item = InventoryVector::Tx(hash);
        for (_, peer) in &targets {
            peer.send_inv(vec![item]);
        }

        let relayed_to: HashSet<PeerId> = targets.iter().map(|(id, _)| *id).collect();
        state.tx_relays.entry(hash).or_insert_with(HashSet::new).extend(relayed_to);
        state.published.insert(hash, Instant::now());
        drop(state);

        for (_, peer) in &targets {
            peer.send_ping(Box::new(|| {}));
        }

        metrics::counter!("bw_peer_manager_tx_published_total", 1);
        Ok(())
    }

    /// Re-announce every published wallet transaction no peer has relayed
    /// back to us yet. The host's connect loop is expected to call this on
    /// a timer (§4.5 tx publish, "unrelayed wallet tx" resend sweep).
    pub fn resend_unrelayed(&self) {
        let state = self.state.lock().unwrap();
        let stale: Vec<Sha256d> = state
            .published
            .keys()
            .filter(|hash| state.tx_relays.get(*hash).map_or(true, |peers| peers.is_empty()))
            .copied()
            .collect();
        let peers: Vec<Arc<dyn Peer>> = state.connected.values().map(|p| p.peer.clone()).collect();
        drop(state);

        for hash in stale {
            debug!(%hash, "re-announcing unrelayed wallet transaction");
            for peer in &peers {
                peer.send_inv(vec![InventoryVector::Tx(hash)]);
            }
        }
    }

    pub fn mark_tx_requested(&self, peer: PeerId, hash: Sha256d) {
        self.state.lock().unwrap().tx_requests.entry(hash).or_insert_with(HashSet::new).insert(peer);
    }

    /// Peers already known (by relay or `inv`) to have `hash`, used to
    /// avoid re-requesting a transaction from someone who already sent it.
    pub fn peers_with_tx(&self, hash: Sha256d) -> HashSet<PeerId> {
        self.state.lock().unwrap().tx_relays.get(&hash).cloned().unwrap_or_default()
    }

    /// Flags `hash` as verified (its relay count reached `PEER_MAX_CONNECTIONS`)
    /// if it hasn't been already, returning whether it just became so —
    /// the caller notifies delegates only on that transition, and only
    /// after releasing `state`'s lock.
    fn mark_verified_if_ready(state: &mut ManagerState, hash: Sha256d) -> bool {
        if state.published.contains_key(&hash)
            && !state.verified.contains(&hash)
            && state.tx_relays.get(&hash).map_or(0, |peers| peers.len()) >= PEER_MAX_CONNECTIONS
        {
            state.verified.insert(hash);
            true
        } else {
            false
        }
    }
}

impl PeerHandler<DecodedBlock> for PeerManager {
    fn connected(&self, peer: PeerId) {
        debug!(?peer, "peer session ready");
    }

    fn disconnected(&self, peer: PeerId, reason: DisconnectReason) {
        self.peer_disconnected(peer, reason);
    }

    fn relayed_peers(&self, _peer: PeerId, peers: Vec<PeerAddress>) {
        for addr in peers {
            self.learn_peer(addr);
        }
    }

    fn relayed_tx(&self, peer: PeerId, tx: Transaction) {
        if let Some(hash) = tx.tx_hash() {
            let mut state = self.state.lock().unwrap();
            state.tx_relays.entry(hash).or_insert_with(HashSet::new).insert(peer);
            if let Some(requests) = state.tx_requests.get_mut(&hash) {
                requests.remove(&peer);
            }
            let became_verified = Self::mark_verified_if_ready(&mut state, hash);
            drop(state);
            if became_verified {
                self.for_each_delegate(|d| d.tx_status_update());
            }
        }
        self.for_each_delegate(|d| {
            d.relayed_tx(peer, tx.clone());
        });
    }

    fn has_tx(&self, peer: PeerId, hash: Sha256d) {
        let mut state = self.state.lock().unwrap();
        state.tx_relays.entry(hash).or_insert_with(HashSet::new).insert(peer);
        let became_verified = Self::mark_verified_if_ready(&mut state, hash);
        drop(state);
        if became_verified {
            self.for_each_delegate(|d| d.tx_status_update());
        }
    }

    fn rejected_tx(&self, peer: PeerId, hash: Sha256d, code: RejectCode) {
        self.for_each_delegate(|d| d.rejected_tx(peer, hash, code));
    }

    fn relayed_block(&self, peer: PeerId, block: DecodedBlock) {
        self.for_each_delegate(|d| d.block_received(peer, block.clone()));
    }

    fn data_notfound(&self, peer: PeerId, items: Vec<InventoryVector>) {
        warn!(?peer, count = items.len(), "peer reported data not found");
    }

    fn set_fee_per_kb(&self, _peer: PeerId, _fee_per_kb: u64) {}

    fn requested_tx(&self, _peer: PeerId, hash: Sha256d) -> Option<Transaction> {
        let mut result = None;
        self.for_each_delegate(|d| {
            if result.is_none() {
                result = d.requested_tx(hash);
            }
        });
        result
    }

    fn network_is_reachable(&self) -> bool {
        self.delegate_or(true, |d| d.network_is_reachable())
    }

    fn thread_cleanup(&self, peer: PeerId) {
        debug!(?peer, "peer thread cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bw_network::peer::{ConnectStatus, PeerInfo};

    struct FakePeer {
        host: String,
    }

    impl Peer for FakePeer {
        fn info(&self) -> PeerInfo {
            PeerInfo {
                host: self.host.clone(),
                port: 8333,
                connect_status: ConnectStatus::Connected,
                last_block: 0,
                ping_time: None,
                version: 70015,
                services: NODE_NETWORK | NODE_BLOOM,
                fee_per_kb: 1000,
                timestamp: 0,
            }
        }
        fn connect(&self) {}
        fn disconnect(&self) {}
        fn schedule_disconnect(&self, _after: Option<Duration>) {}
        fn send_filterload(&self, _filter: &Filter) {}
        fn send_getblocks(&self, _locator: Vec<Sha256d>, _stop: Sha256d) {}
        fn send_getheaders(&self, _locator: Vec<Sha256d>, _stop: Sha256d) {}
        fn send_getdata(&self, _items: Vec<InventoryVector>) {}
        fn send_mempool(&self) {}
        fn send_inv(&self, _items: Vec<InventoryVector>) {}
        fn send_ping(&self, done: Box<dyn FnOnce() + Send>) {
            done();
        }
        fn send_getaddr(&self) {}
        fn rerequest_blocks(&self, _hashes: Vec<Sha256d>) {}
        fn set_current_block_height(&self, _height: i32) {}
        fn set_needs_filter_update(&self, _needs_update: bool) {}
        fn set_earliest_key_time(&self, _timestamp: u32) {}
    }

    #[test]
    fn first_connected_peer_becomes_the_sync_peer_and_starts_sync() {
        bw_test::init();
        struct Recorder(Mutex<bool>);
        impl ManagerDelegate for Recorder {
            fn sync_started(&self) {
                *self.0.lock().unwrap() = true;
            }
        }

        let manager = PeerManager::new();
        let recorder = Arc::new(Recorder(Mutex::new(false)));
        manager.add_delegate(recorder.clone());

        let peer: Arc<dyn Peer> = Arc::new(FakePeer { host: "10.0.0.1".into() });
        manager.peer_connected(peer);

        assert!(*recorder.0.lock().unwrap());
        assert_eq!(manager.connected_count(), 1);
    }

    #[test]
    fn a_peer_missing_required_services_is_rejected() {
        bw_test::init();
        struct NoBloomPeer;
        impl Peer for NoBloomPeer {
            fn info(&self) -> PeerInfo {
                PeerInfo {
                    host: "10.0.0.9".into(),
                    port: 8333,
                    connect_status: ConnectStatus::Connected,
                    last_block: 0,
                    ping_time: None,
                    version: 70015,
                    services: NODE_NETWORK,
                    fee_per_kb: 1000,
                    timestamp: 0,
                }
            }
            fn connect(&self) {}
            fn disconnect(&self) {}
            fn schedule_disconnect(&self, _after: Option<Duration>) {}
            fn send_filterload(&self, _filter: &Filter) {}
            fn send_getblocks(&self, _locator: Vec<Sha256d>, _stop: Sha256d) {}
            fn send_getheaders(&self, _locator: Vec<Sha256d>, _stop: Sha256d) {}
            fn send_getdata(&self, _items: Vec<InventoryVector>) {}
            fn send_mempool(&self) {}
            fn send_inv(&self, _items: Vec<InventoryVector>) {}
            fn send_ping(&self, done: Box<dyn FnOnce() + Send>) {
                done();
            }
            fn send_getaddr(&self) {}
            fn rerequest_blocks(&self, _hashes: Vec<Sha256d>) {}
            fn set_current_block_height(&self, _height: i32) {}
            fn set_needs_filter_update(&self, _needs_update: bool) {}
            fn set_earliest_key_time(&self, _timestamp: u32) {}
        }

        let manager = PeerManager::new();
        let peer: Arc<dyn Peer> = Arc::new(NoBloomPeer);
        assert!(manager.peer_connected(peer).is_none());
        assert_eq!(manager.connected_count(), 0);
    }

    #[test]
    fn publishing_a_transaction_with_no_cached_hash_is_rejected() {
        bw_test::init();
        let manager = PeerManager::new();
        let tx = Transaction::new(1, Vec::new(), Vec::new(), 0);
        assert!(matches!(manager.publish_tx(&tx), Err(ManagerError::InvalidInput(_))));
    }

    #[test]
    fn publishing_with_no_peers_is_unreachable() {
        bw_test::init();
        let manager = PeerManager::new();
        let mut tx = Transaction::new(1, Vec::new(), Vec::new(), 0);
        tx.recompute_hash().unwrap();
        assert!(matches!(manager.publish_tx(&tx), Err(ManagerError::Unreachable)));
    }

    #[test]
    fn publishing_excludes_the_download_peer_when_others_are_connected() {
        bw_test::init();
        let manager = PeerManager::new();
        let download_peer: Arc<dyn Peer> = Arc::new(FakePeer { host: "10.0.0.10".into() });
        manager.peer_connected(download_peer).unwrap();
        let relay_peer: Arc<dyn Peer> = Arc::new(FakePeer { host: "10.0.0.11".into() });
        let relay_id = manager.peer_connected(relay_peer).unwrap();

        let mut tx = Transaction::new(1, Vec::new(), Vec::new(), 0);
        tx.recompute_hash().unwrap();
        let hash = tx.tx_hash().unwrap();
        manager.publish_tx(&tx).unwrap();

        let relayed_to = manager.peers_with_tx(hash);
        assert_eq!(relayed_to.len(), 1);
        assert!(relayed_to.contains(&relay_id));
    }

    #[test]
    fn losing_the_sync_peer_stops_sync() {
        bw_test::init();
        struct Recorder(Mutex<bool>);
        impl ManagerDelegate for Recorder {
            fn sync_stopped(&self, _err: Option<&ManagerError>) {
                *self.0.lock().unwrap() = true;
            }
        }

        let manager = PeerManager::new();
        let recorder = Arc::new(Recorder(Mutex::new(false)));
        manager.add_delegate(recorder.clone());

        let peer: Arc<dyn Peer> = Arc::new(FakePeer { host: "10.0.0.2".into() });
        let id = manager.peer_connected(peer).unwrap();
        manager.peer_disconnected(id, DisconnectReason::Closed);

        assert!(*recorder.0.lock().unwrap());
        assert_eq!(manager.connected_count(), 0);
    }
}
