//! Fee estimation and coin selection (§4.2).

use bw_chain::constants::{
    MIN_FEE_PER_KB, TX_FEE_PER_KB, TX_INPUT_SIZE, TX_MAX_SIZE, TX_MIN_OUTPUT_AMOUNT,
    TX_OUTPUT_SIZE,
};
use bw_chain::script::Script;
use bw_chain::transaction::{Input, OutPoint, Output};
use bw_chain::{BwRand, Network, Transaction};

use crate::error::WalletError;

/// A spendable output known to the wallet.
#[derive(Clone, Debug)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub amount: u64,
    /// The prevout's `scriptPubKey`.
    pub script: Script,
}

/// `txFee(size)` (§4.2): the larger of the flat per-KB rate and the
/// configured `feePerKb`, rounded up to the nearest 100.
pub fn tx_fee(size: usize, fee_per_kb: u64) -> u64 {
    let flat = div_ceil(size as u64, 1000) * TX_FEE_PER_KB;
    let scaled = round_up_100(div_ceil(size as u64 * fee_per_kb, 1000));
    flat.max(scaled)
}

fn div_ceil(n: u64, d: u64) -> u64 {
    (n + d - 1) / d
}

fn round_up_100(n: u64) -> u64 {
    ((n + 99) / 100) * 100
}

/// The minimum amount any output (including change) may carry (§4.2).
pub fn min_output_amount(fee_per_kb: u64) -> u64 {
    TX_MIN_OUTPUT_AMOUNT.max(div_ceil(TX_MIN_OUTPUT_AMOUNT * fee_per_kb, MIN_FEE_PER_KB))
}

/// The maximum amount spendable from `utxos` in one transaction with two
/// outputs (a destination and a change output) (§4.2).
pub fn max_output_amount(utxos: &[Utxo], fee_per_kb: u64) -> u64 {
    let total: u64 = utxos.iter().map(|u| u.amount).sum();
    let n_in = utxos.len();
    let size = 8
        + bw_chain::CompactInt::size(n_in)
        + n_in * TX_INPUT_SIZE
        + bw_chain::CompactInt::size(2)
        + 2 * TX_OUTPUT_SIZE;
    total.saturating_sub(tx_fee(size, fee_per_kb))
}

/// Build an unsigned transaction paying `outputs`, selecting from `utxos` in
/// the order given, adding a change output when needed, and shuffling the
/// final output order (§4.2 step 6). `network` is used to derive each
/// input's address from its prevout script.
pub fn select_coins(
    utxos: &[Utxo],
    mut outputs: Vec<Output>,
    fee_per_kb: u64,
    wallet_balance: u64,
    mut change_script: impl FnMut() -> Result<Script, WalletError>,
    network: Network,
    rng: &mut BwRand,
) -> Result<Transaction, WalletError> {
    if outputs.is_empty() {
        return Err(WalletError::NoOutputs);
    }

    loop {
        match try_select(utxos, &outputs, fee_per_kb, network) {
            Selection::Built { mut inputs, fee, total_in } => {
                let amount: u64 = outputs.iter().map(|o| o.amount).sum();
                // Round the fee up so the balance left behind after this
                // spend lands on a multiple of 100 satoshis (§4.2 step 4).
                let rounding = (wallet_balance - (amount + fee)) % 100;
                let fee = fee + rounding;
                let change = total_in.saturating_sub(amount + fee);
                if change > min_output_amount(fee_per_kb) {
                    let script = change_script()?;
                    outputs.push(Output::new(change, script, network));
                }
                inputs.sort_by_key(|i: &Input| i.prevout.tx_hash.0);
                rng.shuffle(&mut outputs);
                return Ok(Transaction::new(
                    bw_chain::constants::TX_VERSION,
                    inputs,
                    outputs,
                    bw_chain::constants::TX_LOCKTIME,
                ));
            }
            Selection::NeedsSmallerOutputSet => {
                if !shave_last_output(&mut outputs, fee_per_kb) {
                    return Err(WalletError::InsufficientFunds);
                }
            }
            Selection::InsufficientFunds => return Err(WalletError::InsufficientFunds),
        }
    }
}

enum Selection {
    Built { inputs: Vec<Input>, fee: u64, total_in: u64 },
    NeedsSmallerOutputSet,
    InsufficientFunds,
}

fn try_select(utxos: &[Utxo], outputs: &[Output], fee_per_kb: u64, network: Network) -> Selection {
    let amount: u64 = outputs.iter().map(|o| o.amount).sum();
    let mut size = 8
        + bw_chain::CompactInt::size(outputs.len())
        + outputs.iter().map(Output::serialized_size).sum::<usize>();
    let mut fee = tx_fee(size + TX_OUTPUT_SIZE, fee_per_kb);

    let mut inputs = Vec::new();
    let mut total_in = 0u64;

    for utxo in utxos {
        if size + TX_INPUT_SIZE + TX_OUTPUT_SIZE > TX_MAX_SIZE {
            return Selection::NeedsSmallerOutputSet;
        }

        inputs.push(Input::new_unsigned(
            utxo.outpoint,
            utxo.amount,
            utxo.script.clone(),
            bw_chain::constants::TXIN_SEQUENCE,
            network,
        ));
        total_in += utxo.amount;
        size += TX_INPUT_SIZE;
        fee = tx_fee(size + TX_OUTPUT_SIZE, fee_per_kb);

        if total_in == amount + fee || total_in >= amount + fee + min_output_amount(fee_per_kb) {
            return Selection::Built { inputs, fee, total_in };
        }
    }

    Selection::InsufficientFunds
}

/// Shave the last output's amount down to make room for fees, or drop it
/// entirely if shaving would push it under the dust floor (§4.2 step 3).
fn shave_last_output(outputs: &mut Vec<Output>, fee_per_kb: u64) -> bool {
    let min = min_output_amount(fee_per_kb);
    if let Some(last) = outputs.last_mut() {
        if last.amount > min {
            last.amount = min;
            return true;
        }
    }
    outputs.pop().is_some() && !outputs.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bw_chain::hash::{Hash160, Sha256d};

    fn utxo(amount: u64, seed: u8) -> Utxo {
        Utxo {
            outpoint: OutPoint { tx_hash: Sha256d::of(&[seed]), index: 0 },
            amount,
            script: Script::new_p2pkh(Hash160([seed; 20])),
        }
    }

    #[test]
    fn selects_exact_coins_for_request() {
        bw_test::init();
        let utxos = vec![utxo(50_000, 1), utxo(30_000, 2), utxo(20_000, 3)];
        let dest = Output::new(60_000, Script::new_p2pkh(Hash160([9u8; 20])), Network::Mainnet);
        let mut rng = BwRand::new(1);
        let mut change_calls = 0;
        let tx = select_coins(
            &utxos,
            vec![dest],
            1000,
            100_000,
            || {
                change_calls += 1;
                Ok(Script::new_p2pkh(Hash160([8u8; 20])))
            },
            Network::Mainnet,
            &mut rng,
        )
        .unwrap();

        let total_in: u64 = tx.inputs.iter().map(|i| i.amount).sum();
        assert_eq!(total_in, 80_000);
        assert_eq!(tx.inputs.len(), 2);
        // Either an exact match or a change output was added.
        assert!(tx.outputs.len() == 1 || change_calls == 1);
    }

    #[test]
    fn fails_with_insufficient_funds() {
        bw_test::init();
        let utxos = vec![utxo(10_000, 1)];
        let dest = Output::new(60_000, Script::new_p2pkh(Hash160([9u8; 20])), Network::Mainnet);
        let mut rng = BwRand::new(1);
        let result = select_coins(
            &utxos,
            vec![dest],
            1000,
            10_000,
            || Ok(Script::new_p2pkh(Hash160([8u8; 20]))),
            Network::Mainnet,
            &mut rng,
        );
        assert!(result.is_err());
    }

    #[test]
    fn fee_rounds_so_the_remaining_balance_is_a_multiple_of_100() {
        bw_test::init();
        let utxos = vec![utxo(50_000, 1), utxo(30_000, 2), utxo(20_000, 3)];
        let dest = Output::new(60_000, Script::new_p2pkh(Hash160([9u8; 20])), Network::Mainnet);
        let mut rng = BwRand::new(1);
        let wallet_balance = 100_001;
        let tx = select_coins(
            &utxos,
            vec![dest],
            1000,
            wallet_balance,
            || Ok(Script::new_p2pkh(Hash160([8u8; 20]))),
            Network::Mainnet,
            &mut rng,
        )
        .unwrap();

        let fee_paid = {
            let total_in: u64 = tx.inputs.iter().map(|i| i.amount).sum();
            let total_out: u64 = tx.outputs.iter().map(|o| o.amount).sum();
            total_in - total_out
        };
        assert_eq!((wallet_balance - 60_000 - fee_paid) % 100, 0);
    }
}
