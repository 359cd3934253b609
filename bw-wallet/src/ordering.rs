//! The wallet's transaction log total order (§4.2 Ordering).

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use bw_chain::constants::TX_UNCONFIRMED;
use bw_chain::hash::Sha256d;
use bw_chain::Transaction;

/// Does `a` depend, transitively via its inputs, on the transaction
/// identified by `target`?
pub fn depends_on(a: &Transaction, target: Sha256d, all_tx: &HashMap<Sha256d, Transaction>) -> bool {
    let mut seen = HashSet::new();
    let mut stack: Vec<Sha256d> = a.inputs.iter().map(|i| i.prevout.tx_hash).collect();
    while let Some(hash) = stack.pop() {
        if hash == target {
            return true;
        }
        if !seen.insert(hash) {
            continue;
        }
        if let Some(tx) = all_tx.get(&hash) {
            stack.extend(tx.inputs.iter().map(|i| i.prevout.tx_hash));
        }
    }
    false
}

/// The wallet's total order over two transactions (§4.2):
/// 1. topological dependency wins outright;
/// 2. else, if both are confirmed at different heights, the lower height is earlier;
/// 3. else, fall back to `chain_position` (the index of each tx's first
///    output address within its address chain).
pub fn compare(
    a: &Transaction,
    b: &Transaction,
    all_tx: &HashMap<Sha256d, Transaction>,
    chain_position: impl Fn(&Transaction) -> Option<usize>,
) -> Ordering {
    if let (Some(a_hash), Some(b_hash)) = (a.tx_hash(), b.tx_hash()) {
        if a_hash == b_hash {
            return Ordering::Equal;
        }
        if depends_on(a, b_hash, all_tx) {
            return Ordering::Greater;
        }
        if depends_on(b, a_hash, all_tx) {
            return Ordering::Less;
        }
    }

    let both_confirmed_different_heights = a.block_height != TX_UNCONFIRMED
        && b.block_height != TX_UNCONFIRMED
        && a.block_height != b.block_height;
    if both_confirmed_different_heights {
        return a.block_height.cmp(&b.block_height);
    }

    chain_position(a).cmp(&chain_position(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bw_chain::transaction::{Input, OutPoint, Output};
    use bw_chain::script::Script;
    use bw_chain::{Hash160, Network};

    fn tx_spending(prev: Sha256d, height: i32) -> Transaction {
        let input = Input::new_unsigned(
            OutPoint { tx_hash: prev, index: 0 },
            50_000,
            Script::new_p2pkh(Hash160([1u8; 20])),
            0xFFFFFFFF,
            Network::Mainnet,
        );
        let output = Output::new(40_000, Script::new_p2pkh(Hash160([2u8; 20])), Network::Mainnet);
        let mut tx = Transaction::new(1, vec![input], vec![output], 0);
        tx.block_height = height;
        tx
    }

    #[test]
    fn lower_height_sorts_earlier() {
        bw_test::init();
        let all_tx = HashMap::new();
        let early = tx_spending(Sha256d::of(b"a"), 100);
        let late = tx_spending(Sha256d::of(b"b"), 200);
        assert_eq!(compare(&early, &late, &all_tx, |_| None), Ordering::Less);
    }

    #[test]
    fn dependency_outranks_height() {
        bw_test::init();
        let mut parent = tx_spending(Sha256d::of(b"genesis"), 50);
        parent.inputs[0].signature = Some(Script::new_p2pk_sig(&[1u8; 71]));
        parent.recompute_hash().unwrap();
        let mut all_tx = HashMap::new();
        let parent_hash = parent.tx_hash().unwrap();
        let child = tx_spending(parent_hash, 10);
        all_tx.insert(parent_hash, parent.clone());
        assert_eq!(compare(&child, &parent, &all_tx, |_| None), Ordering::Greater);
    }
}
