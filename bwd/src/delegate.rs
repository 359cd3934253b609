//! Wires the wallet and block store into the peer manager's delegate seam
//! (§4.5, §9). This is the one place in the daemon that touches both the
//! `Wallet` lock and the `PeerManager`'s internal lock, so the ordering
//! discipline the manager documents applies here above all: never call into
//! the manager while still holding the wallet lock, since the manager may
//! itself call back into a delegate (this one) from another peer's thread.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use bw_chain::hash::Sha256d;
use bw_chain::transparent::Address;
use bw_chain::Transaction;
use bw_chain::serialization::BitcoinSerialize;
use bw_network::bloom::BLOOM_UPDATE_ALL;
use bw_network::events::{PeerId, RejectCode};
use bw_network::Filter;
use bw_peer_manager::{KnownPeer, ManagerDelegate, PeerManager};
use bw_state::{AcceptOutcome, BitcoinParams, BlockStore, DecodedBlock};
use bw_wallet::Wallet;
use tracing::{info, warn};

use crate::config::Config;

/// Owns the wallet and chain state the daemon is running on behalf of, and
/// forwards the manager's notifications to them.
pub struct WalletHost {
    wallet: Mutex<Wallet>,
    store: Mutex<BlockStore<BitcoinParams>>,
    manager: Arc<PeerManager>,
    bloom_fp_rate: f64,
}

impl WalletHost {
    pub fn new(
        wallet: Wallet,
        store: BlockStore<BitcoinParams>,
        manager: Arc<PeerManager>,
        config: &Config,
    ) -> Arc<WalletHost> {
        Arc::new(WalletHost {
            wallet: Mutex::new(wallet),
            store: Mutex::new(store),
            manager,
            bloom_fp_rate: config.bloom_false_positive_rate,
        })
    }

    /// Snapshot every watched address and every outpoint worth tracking
    /// (current UTXOs plus recent wallet tx outputs) into a fresh bloom
    /// filter and push it to every connected peer. `BLOOM_UPDATE_ALL` keeps
    /// the filter self-maintaining: a peer adds any output matched by the
    /// filter back into it, so a new UTXO's outpoint doesn't need a reload
    /// to be watched for its eventual spend. Called on startup and whenever
    /// the wallet hands out a new address or spends/receives funds (§4.5
    /// bloom lifecycle).
    pub fn rebuild_filter(&self) {
        let (addresses, outpoints): (Vec<String>, Vec<bw_chain::transaction::OutPoint>) = {
            let wallet = self.wallet.lock().unwrap();
            (wallet.watched_addresses().map(str::to_owned).collect(), wallet.filter_outpoints())
        };

        let element_count = addresses.len() + outpoints.len();
        let mut filter = Filter::new(element_count.max(1), self.bloom_fp_rate, 0, BLOOM_UPDATE_ALL);
        for raw in &addresses {
            if let Ok(address) = Address::from_str(raw) {
                filter.insert(&address.hash().0);
            }
        }
        for outpoint in &outpoints {
            if let Ok(bytes) = outpoint.bitcoin_serialize_to_vec() {
                filter.insert(&bytes);
            }
        }
        self.manager.reload_filter(filter);
    }

    pub fn balance(&self) -> u64 {
        self.wallet.lock().unwrap().balance
    }

    pub fn new_address(&self) -> Result<String, bw_wallet::WalletError> {
        let address = {
            let mut wallet = self.wallet.lock().unwrap();
            wallet.unused_addrs(1, bw_wallet::Chain::External)?.remove(0)
        };
        self.rebuild_filter();
        Ok(address)
    }

    /// `fork_id` is the BCH-style replay-protection byte folded into the
    /// sighash; this host runs against classic Bitcoin, which doesn't use
    /// one, so it always signs with `0`.
    pub fn send(&self, outputs: Vec<(bw_chain::script::Script, u64)>) -> Result<Transaction, bw_wallet::WalletError> {
        let tx = {
            let mut wallet = self.wallet.lock().unwrap();
            wallet.build_transaction(outputs, 0)?
        };
        self.rebuild_filter();
        if let Some(hash) = tx.tx_hash() {
            info!(%hash, "built transaction");
        }
        Ok(tx)
    }

    fn flush_wallet_events(&self, wallet: &mut Wallet) {
        for event in wallet.take_events() {
            info!(?event, "wallet event");
        }
    }
}

impl ManagerDelegate for WalletHost {
    fn sync_started(&self) {
        info!("sync started");
    }

    fn sync_stopped(&self, err: Option<&bw_peer_manager::ManagerError>) {
        match err {
            Some(err) => warn!(%err, "sync stopped with an error"),
            None => info!("sync stopped"),
        }
    }

    fn relayed_tx(&self, peer: PeerId, tx: Transaction) -> bool {
        let mut wallet = self.wallet.lock().unwrap();
        let belongs = match wallet.register_transaction(tx) {
            Ok(belongs) => belongs,
            Err(err) => {
                warn!(?peer, %err, "dropped malformed relayed transaction");
                false
            }
        };
        self.flush_wallet_events(&mut wallet);
        belongs
    }

    fn rejected_tx(&self, peer: PeerId, hash: Sha256d, code: RejectCode) {
        warn!(?peer, %hash, ?code, "peer rejected a published transaction");
    }

    fn block_received(&self, peer: PeerId, block: DecodedBlock) {
        let timestamp = block.header.timestamp;
        let total_tx = block.total_tx;
        let matched_count = block.matched_tx_hashes.len();

        let outcome = {
            let mut store = self.store.lock().unwrap();
            match store.accept_header(block.header) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(?peer, %err, "rejected header from relayed block");
                    return;
                }
            }
        };

        let new_tip_height = match &outcome {
            AcceptOutcome::ExtendsTip { height } => Some(*height),
            AcceptOutcome::Reorg { .. } => Some(self.store.lock().unwrap().tip_height()),
            AcceptOutcome::AlreadyKnown | AcceptOutcome::Orphan | AcceptOutcome::OldFork => None,
        };

        if let Some(height) = new_tip_height {
            info!(?peer, height, matched = matched_count, "chain tip advanced");

            let fp_count = {
                let mut wallet = self.wallet.lock().unwrap();

                if let AcceptOutcome::Reorg { fork_height, disconnected, connected } = &outcome {
                    let fork_height = *fork_height;
                    warn!(?peer, fork_height, disconnected = disconnected.len(), connected = connected.len(), "chain reorganized");
                    wallet.unconfirm_from_height(fork_height + 1);
                }

                let fp_count =
                    block.matched_tx_hashes.iter().filter(|hash| !wallet.knows_tx(*hash)).count();

                wallet.set_current_height(height);
                for hash in &block.matched_tx_hashes {
                    wallet.update_transaction(*hash, height, timestamp);
                }
                self.flush_wallet_events(&mut wallet);
                fp_count
            };

            if let AcceptOutcome::Reorg { connected, .. } = &outcome {
                self.save_blocks(true, connected);
            }

            let feedback = {
                let mut store = self.store.lock().unwrap();
                store.record_filter_feedback(0, total_tx, fp_count)
            };
            match feedback {
                bw_state::FilterFeedback::Disconnect => {
                    warn!(?peer, "bloom filter false-positive rate far too high for this peer");
                }
                bw_state::FilterFeedback::ScheduleReload => self.rebuild_filter(),
                bw_state::FilterFeedback::Ok => {}
            }
        }
    }

    fn requested_tx(&self, _hash: Sha256d) -> Option<Transaction> {
        None
    }

    fn save_peers(&self, peers: &[KnownPeer]) {
        info!(count = peers.len(), "known peer set updated");
    }

    fn save_blocks(&self, replace: bool, blocks: &[Sha256d]) {
        info!(replace, count = blocks.len(), "persisting header range");
    }

    fn tx_status_update(&self) {
        info!("wallet transaction status changed");
    }

    fn current_tip_height(&self) -> i32 {
        self.store.lock().unwrap().tip_height()
    }

    fn current_tip_timestamp(&self) -> u32 {
        let store = self.store.lock().unwrap();
        store.header(&store.tip()).map(|h| h.timestamp).unwrap_or(0)
    }

    fn locator(&self) -> Vec<Sha256d> {
        self.store.lock().unwrap().locator()
    }
}
