//! The wallet's aggregate state: address chains, tx log, UTXO set, and
//! balance recomputation (§3, §4.2).

use std::collections::{HashMap, HashSet};

use bw_chain::constants::{TX_MAX_LOCK_HEIGHT, TX_MAX_SIZE, TX_MIN_OUTPUT_AMOUNT};
use bw_chain::hash::Sha256d;
use bw_chain::script::Script;
use bw_chain::transaction::{OutPoint, Output};
use bw_chain::{Network, Transaction};
use tracing::{debug, info};

use crate::coinselect::{self, Utxo};
use crate::error::WalletError;
use crate::keychain::Keychain;
use crate::masterkey::{Chain, MasterKey};
use crate::ordering;
use crate::sign;

/// A notification the wallet emits to the host after releasing its lock
/// (§5, §6).
#[derive(Debug, Clone)]
pub enum WalletEvent {
    BalanceChanged { balance: u64 },
    TxAdded { tx_hash: Sha256d },
    TxUpdated { tx_hash: Sha256d },
    TxDeleted { tx_hash: Sha256d, notify_user: bool, recommend_rescan: bool },
}

pub struct Wallet {
    keychain: Keychain,
    network: Network,
    fee_per_kb: u64,

    tx_log: Vec<Sha256d>,
    all_tx: HashMap<Sha256d, Transaction>,
    invalid_tx: HashSet<Sha256d>,
    pending_tx: HashSet<Sha256d>,
    spent_outputs: HashSet<OutPoint>,
    utxos: Vec<Utxo>,
    balance_hist: Vec<u64>,

    pub balance: u64,
    pub total_received: u64,
    pub total_sent: u64,

    current_height: i32,
    events: Vec<WalletEvent>,
}

impl Wallet {
    pub fn new(seed: &[u8], network: Network, fee_per_kb: u64) -> Result<Wallet, WalletError> {
        let master = MasterKey::from_seed(seed)?;
        let mut keychain = Keychain::new(master, network);
        keychain.unused_addrs_default(Chain::External)?;
        keychain.unused_addrs_default(Chain::Internal)?;
        Ok(Wallet {
            keychain,
            network,
            fee_per_kb,
            tx_log: Vec::new(),
            all_tx: HashMap::new(),
            invalid_tx: HashSet::new(),
            pending_tx: HashSet::new(),
            spent_outputs: HashSet::new(),
            utxos: Vec::new(),
            balance_hist: Vec::new(),
            balance: 0,
            total_received: 0,
            total_sent: 0,
            current_height: 0,
            events: Vec::new(),
        })
    }

    /// Drain notifications staged since the last drain, for the caller to
    /// deliver to the host only after releasing any lock it holds (§5, §9).
    pub fn take_events(&mut self) -> Vec<WalletEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_current_height(&mut self, height: i32) {
        self.current_height = height;
    }

    pub fn contains(&self, address: &str) -> bool {
        self.keychain.contains(address)
    }

    /// Whether this wallet has ever seen `hash`, used to tell a genuine
    /// match from a bloom filter false positive when a `merkleblock`
    /// arrives (§4.4 bloom false-positive feedback).
    pub fn knows_tx(&self, hash: &Sha256d) -> bool {
        self.all_tx.contains_key(hash)
    }

    pub fn unused_addrs(&mut self, n: usize, chain: Chain) -> Result<Vec<String>, WalletError> {
        self.keychain.unused_addrs(n, chain)
    }

    /// Every address this wallet currently watches, for a host building a
    /// bloom filter to load onto peers (§4.5 bloom lifecycle).
    pub fn watched_addresses(&self) -> impl Iterator<Item = &str> {
        self.keychain.all_addresses()
    }

    /// A tx "belongs" to the wallet iff any output address is ours, or any
    /// input's prevout (when known) has an address that is ours (§4.2
    /// Containment). Does not inspect sigScripts (§9).
    fn contains_tx(&self, tx: &Transaction) -> bool {
        tx.outputs.iter().any(|o| self.keychain.contains(&o.address))
            || tx.inputs.iter().any(|i| !i.address.is_empty() && self.keychain.contains(&i.address))
    }

    fn chain_position(&self, tx: &Transaction) -> Option<usize> {
        let address = tx.outputs.first().map(|o| o.address.as_str())?;
        self.keychain.all_addresses().position(|a| a == address)
    }

    fn insert_sorted(&mut self, hash: Sha256d) {
        let tx = self.all_tx.get(&hash).expect("tx must be registered before ordering").clone();
        let pos = self
            .tx_log
            .iter()
            .position(|existing| {
                let existing_tx = &self.all_tx[existing];
                ordering::compare(&tx, existing_tx, &self.all_tx, |t| self.chain_position(t))
                    == std::cmp::Ordering::Less
            })
            .unwrap_or(self.tx_log.len());
        self.tx_log.insert(pos, hash);
    }

    /// Register a newly seen transaction. Returns whether it belongs to the
    /// wallet (and was therefore inserted into the ordered log).
    pub fn register_transaction(&mut self, mut tx: Transaction) -> Result<bool, WalletError> {
        if tx.timestamp == 0 {
            tx.timestamp = now_unix().max(0) as u32;
        }
        let hash = tx.tx_hash().ok_or(WalletError::NotSigned)?;
        if self.all_tx.contains_key(&hash) {
            return Ok(self.tx_log.contains(&hash));
        }

        let belongs = self.contains_tx(&tx);
        self.all_tx.insert(hash, tx);
        if belongs {
            self.insert_sorted(hash);
            self.recompute_balance();
            self.events.push(WalletEvent::TxAdded { tx_hash: hash });
            info!(tx_hash = %hash, "transaction added to wallet");
        } else {
            debug!(tx_hash = %hash, "non-wallet transaction retained for conflict detection");
        }
        Ok(belongs)
    }

    /// Attach confirmation info to a transaction already known to the
    /// wallet and recompute balance.
    pub fn update_transaction(&mut self, hash: Sha256d, height: i32, timestamp: u32) {
        if let Some(tx) = self.all_tx.get_mut(&hash) {
            tx.block_height = height;
            tx.timestamp = timestamp;
            if self.tx_log.contains(&hash) {
                self.recompute_balance();
                self.events.push(WalletEvent::TxUpdated { tx_hash: hash });
            }
        }
    }

    /// Unconfirm every wallet transaction recorded at or above `height` —
    /// the ancestor-height replay a reorg requires before any surviving
    /// matched hash on the new chain is reconfirmed via
    /// [`Wallet::update_transaction`] (§4.4 cases 5/6/9).
    pub fn unconfirm_from_height(&mut self, height: i32) {
        let affected: Vec<Sha256d> = self
            .all_tx
            .iter()
            .filter(|(_, tx)| !tx.is_unconfirmed() && tx.block_height >= height)
            .map(|(hash, _)| *hash)
            .collect();
        if affected.is_empty() {
            return;
        }
        for hash in &affected {
            if let Some(tx) = self.all_tx.get_mut(hash) {
                tx.block_height = bw_chain::constants::TX_UNCONFIRMED;
            }
        }
        self.recompute_balance();
        for hash in affected {
            if self.tx_log.contains(&hash) {
                self.events.push(WalletEvent::TxUpdated { tx_hash: hash });
            }
        }
    }

    /// Remove a transaction and any transactions depending on it.
    pub fn remove_transaction(&mut self, hash: Sha256d, notify_user: bool, recommend_rescan: bool) {
        let dependents: Vec<Sha256d> = self
            .all_tx
            .iter()
            .filter(|(h, tx)| **h != hash && ordering::depends_on(tx, hash, &self.all_tx))
            .map(|(h, _)| *h)
            .collect();
        for dependent in dependents {
            self.remove_transaction(dependent, notify_user, recommend_rescan);
        }
        self.all_tx.remove(&hash);
        self.tx_log.retain(|h| *h != hash);
        self.invalid_tx.remove(&hash);
        self.pending_tx.remove(&hash);
        self.recompute_balance();
        self.events.push(WalletEvent::TxDeleted { tx_hash: hash, notify_user, recommend_rescan });
    }

    /// Recompute `balance`, `utxos`, `spentOutputs`, `invalidTx`, and
    /// `pendingTx` from scratch by walking the ordered tx log (§4.2 Balance
    /// recomputation). Idempotent: safe to call after any structural
    /// change.
    pub fn recompute_balance(&mut self) {
        self.invalid_tx.clear();
        self.pending_tx.clear();
        self.spent_outputs.clear();
        self.utxos.clear();
        self.balance_hist.clear();

        let mut balance: u64 = 0;
        let mut total_received: u64 = 0;
        let mut total_sent: u64 = 0;

        let log = self.tx_log.clone();
        for hash in &log {
            let tx = self.all_tx[hash].clone();
            let unconfirmed = tx.is_unconfirmed();

            let conflicts = unconfirmed
                && tx.inputs.iter().any(|i| {
                    self.spent_outputs.contains(&i.prevout) || self.invalid_tx.contains(&i.prevout.tx_hash)
                });
            if conflicts {
                self.invalid_tx.insert(*hash);
                self.balance_hist.push(balance);
                continue;
            }

            for input in &tx.inputs {
                self.spent_outputs.insert(input.prevout);
            }

            let pending = unconfirmed && self.is_pending(&tx);
            if pending {
                self.pending_tx.insert(*hash);
            } else {
                for (index, output) in tx.outputs.iter().enumerate() {
                    if self.keychain.contains(&output.address) {
                        self.utxos.push(Utxo {
                            outpoint: OutPoint { tx_hash: *hash, index: index as u32 },
                            amount: output.amount,
                            script: output.script.clone(),
                        });
                        balance += output.amount;
                        total_received += output.amount;
                    }
                }
            }

            // A later tx in the log may spend a UTXO created by an earlier
            // one; sweep it out of the set now that its outpoint is known
            // to be spent.
            let spent_now = self.spent_outputs.clone();
            let mut spent_amount = 0u64;
            self.utxos.retain(|utxo| {
                let spent = spent_now.contains(&utxo.outpoint);
                if spent {
                    spent_amount += utxo.amount;
                }
                !spent
            });
            balance = balance.saturating_sub(spent_amount);
            total_sent += spent_amount;

            self.balance_hist.push(balance);
        }

        self.balance = balance;
        self.total_received = total_received;
        self.total_sent = total_sent;
        self.events.push(WalletEvent::BalanceChanged { balance });
    }

    fn is_pending(&self, tx: &Transaction) -> bool {
        if tx.serialized_size() > TX_MAX_SIZE {
            return true;
        }
        if tx.outputs.iter().any(|o| o.amount < TX_MIN_OUTPUT_AMOUNT) {
            return true;
        }
        if tx.inputs.iter().any(|i| i.sequence < u32::MAX - 1) {
            return true;
        }
        if tx.lock_time < TX_MAX_LOCK_HEIGHT && tx.lock_time as i64 > (self.current_height as i64 + 1) {
            return true;
        }
        if tx.inputs.iter().any(|i| i.sequence < u32::MAX) && tx.lock_time as i64 > now_unix() {
            return true;
        }
        tx.inputs.iter().any(|i| self.pending_tx.contains(&i.prevout.tx_hash))
    }

    pub fn utxos(&self) -> &[Utxo] {
        &self.utxos
    }

    /// Outpoints worth loading into the bloom filter alongside watched
    /// addresses: every current UTXO, plus every output of a wallet
    /// transaction that's unconfirmed or confirmed within the last 100
    /// blocks, so a future spend of one is matched before it ever shows up
    /// as a UTXO (§4.5 bloom lifecycle).
    pub fn filter_outpoints(&self) -> Vec<OutPoint> {
        let mut outpoints: Vec<OutPoint> = self.utxos.iter().map(|u| u.outpoint).collect();
        for hash in &self.tx_log {
            let tx = &self.all_tx[hash];
            let recent = tx.is_unconfirmed() || self.current_height - tx.block_height < 100;
            if recent {
                outpoints.extend(
                    (0..tx.outputs.len() as u32).map(|index| OutPoint { tx_hash: *hash, index }),
                );
            }
        }
        outpoints
    }

    /// Build and sign a transaction paying `outputs`, selecting coins and
    /// adding change as needed (§4.2).
    pub fn build_transaction(
        &mut self,
        outputs: Vec<(Script, u64)>,
        fork_id: u8,
    ) -> Result<Transaction, WalletError> {
        if outputs.is_empty() {
            return Err(WalletError::NoOutputs);
        }
        let network = self.network;
        let built_outputs: Vec<Output> =
            outputs.into_iter().map(|(script, amount)| Output::new(amount, script, network)).collect();

        let utxos = self.utxos.clone();
        let fee_per_kb = self.fee_per_kb;
        let mut rng = bw_chain::BwRand::from_entropy();
        let keychain = &mut self.keychain;

        let mut tx = coinselect::select_coins(
            &utxos,
            built_outputs,
            fee_per_kb,
            self.balance,
            || -> Result<Script, WalletError> {
                let addr = keychain.unused_addrs(1, Chain::Internal)?;
                let address: bw_chain::transparent::Address = addr[0].parse()?;
                Ok(Script::new_p2pkh(address.hash()))
            },
            network,
            &mut rng,
        )?;

        sign::sign_transaction(&mut tx, &self.keychain, fork_id)?;
        for output in &tx.outputs {
            if self.keychain.contains(&output.address) {
                self.keychain.mark_used(&output.address)?;
            }
        }
        Ok(tx)
    }

    pub fn min_output_amount(&self) -> u64 {
        coinselect::min_output_amount(self.fee_per_kb)
    }

    pub fn max_output_amount(&self) -> u64 {
        coinselect::max_output_amount(&self.utxos, self.fee_per_kb)
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bw_chain::transaction::Input;
    use bw_chain::Hash160;

    fn wallet() -> Wallet {
        Wallet::new(b"a reasonably long deterministic test seed!!", Network::Mainnet, 1000).unwrap()
    }

    #[test]
    fn receiving_a_confirmed_tx_updates_balance() {
        bw_test::init();
        let mut w = wallet();
        let addrs = w.unused_addrs(1, Chain::External).unwrap();
        let address: bw_chain::transparent::Address = addrs[0].parse().unwrap();
        let output = Output::new(100_000, Script::new_p2pkh(address.hash()), Network::Mainnet);
        let input = Input::new_unsigned(
            OutPoint { tx_hash: Sha256d::of(b"funding"), index: 0 },
            0,
            Script::new_p2pkh(Hash160([1u8; 20])),
            0xFFFFFFFF,
            Network::Mainnet,
        );
        let mut tx = Transaction::new(1, vec![input], vec![output], 0);
        tx.inputs[0].signature = Some(Script::new_p2pk_sig(&[1u8; 71]));
        tx.block_height = 100;
        tx.recompute_hash().unwrap();

        let belongs = w.register_transaction(tx).unwrap();
        assert!(belongs);
        assert_eq!(w.balance, 100_000);
        assert_eq!(w.total_received, 100_000);
    }

    #[test]
    fn conflicting_spend_becomes_invalid() {
        bw_test::init();
        let mut w = wallet();
        let addrs = w.unused_addrs(1, Chain::External).unwrap();
        let address: bw_chain::transparent::Address = addrs[0].parse().unwrap();

        let funding_prevout = OutPoint { tx_hash: Sha256d::of(b"utxo-source"), index: 0 };
        let funding_output = Output::new(100_000, Script::new_p2pkh(address.hash()), Network::Mainnet);
        let mut funding = Transaction::new(
            1,
            vec![Input::new_unsigned(
                funding_prevout,
                0,
                Script::new_p2pkh(Hash160([1u8; 20])),
                0xFFFFFFFF,
                Network::Mainnet,
            )],
            vec![funding_output],
            0,
        );
        funding.inputs[0].signature = Some(Script::new_p2pk_sig(&[1u8; 71]));
        funding.block_height = 10;
        funding.recompute_hash().unwrap();
        let shared_outpoint = OutPoint { tx_hash: funding.tx_hash().unwrap(), index: 0 };
        w.register_transaction(funding).unwrap();

        let spend = |sig_byte: u8| {
            let input = Input::new_unsigned(
                shared_outpoint,
                100_000,
                Script::new_p2pkh(address.hash()),
                0xFFFFFFFF,
                Network::Mainnet,
            );
            let mut input = input;
            input.signature = Some(Script::new_p2pk_sig(&[sig_byte; 71]));
            let output = Output::new(90_000, Script::new_p2pkh(Hash160([2u8; 20])), Network::Mainnet);
            let mut tx = Transaction::new(1, vec![input], vec![output], 0);
            tx.recompute_hash().unwrap();
            tx
        };

        let t1 = spend(10);
        w.register_transaction(t1).unwrap();
        let balance_after_t1 = w.balance;

        let t2 = spend(20);
        let t2_hash = t2.tx_hash().unwrap();
        w.register_transaction(t2).unwrap();

        assert!(w.invalid_tx.contains(&t2_hash));
        assert_eq!(w.balance, balance_after_t1);
    }

    #[test]
    fn unconfirming_from_a_height_reopens_affected_transactions() {
        bw_test::init();
        let mut w = wallet();
        let addrs = w.unused_addrs(1, Chain::External).unwrap();
        let address: bw_chain::transparent::Address = addrs[0].parse().unwrap();
        let output = Output::new(100_000, Script::new_p2pkh(address.hash()), Network::Mainnet);
        let input = Input::new_unsigned(
            OutPoint { tx_hash: Sha256d::of(b"funding"), index: 0 },
            0,
            Script::new_p2pkh(Hash160([1u8; 20])),
            0xFFFFFFFF,
            Network::Mainnet,
        );
        let mut tx = Transaction::new(1, vec![input], vec![output], 0);
        tx.inputs[0].signature = Some(Script::new_p2pk_sig(&[1u8; 71]));
        tx.block_height = 100;
        tx.recompute_hash().unwrap();
        let hash = tx.tx_hash().unwrap();
        w.register_transaction(tx).unwrap();
        w.update_transaction(hash, 100, 1_600_000_000);

        w.unconfirm_from_height(100);

        assert!(w.all_tx[&hash].is_unconfirmed());
    }

    #[test]
    fn filter_outpoints_covers_utxos_and_recent_transactions() {
        bw_test::init();
        let mut w = wallet();
        let addrs = w.unused_addrs(1, Chain::External).unwrap();
        let address: bw_chain::transparent::Address = addrs[0].parse().unwrap();
        let output = Output::new(100_000, Script::new_p2pkh(address.hash()), Network::Mainnet);
        let input = Input::new_unsigned(
            OutPoint { tx_hash: Sha256d::of(b"funding"), index: 0 },
            0,
            Script::new_p2pkh(Hash160([1u8; 20])),
            0xFFFFFFFF,
            Network::Mainnet,
        );
        let mut tx = Transaction::new(1, vec![input], vec![output], 0);
        tx.inputs[0].signature = Some(Script::new_p2pk_sig(&[1u8; 71]));
        tx.block_height = 100;
        tx.recompute_hash().unwrap();
        let hash = tx.tx_hash().unwrap();
        w.set_current_height(100);
        w.register_transaction(tx).unwrap();

        let outpoints = w.filter_outpoints();

        assert!(!w.utxos().is_empty());
        assert!(outpoints.contains(&OutPoint { tx_hash: hash, index: 0 }));
    }
}
