//! Transaction data model (§3) and the two wire/digest serialization forms
//! (§4.3).

pub mod codec;
pub mod sighash;

pub use sighash::{SigHash, SigHashBase};

use std::io;

use serde::{Deserialize, Serialize};

use crate::cached::Cached;
use crate::constants::TX_UNCONFIRMED;
use crate::hash::Sha256d;
use crate::network::Network;
use crate::script::{Element, Script, Template};
use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
use crate::transparent::Address;

/// A reference to a previous transaction's output.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub struct OutPoint {
    pub tx_hash: Sha256d,
    pub index: u32,
}

impl BitcoinSerialize for OutPoint {
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
        self.tx_hash.bitcoin_serialize(&mut target)?;
        self.index.bitcoin_serialize(&mut target)
    }
}

impl BitcoinDeserialize for OutPoint {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let tx_hash = Sha256d::bitcoin_deserialize(&mut reader)?;
        let index = u32::bitcoin_deserialize(&mut reader)?;
        Ok(OutPoint { tx_hash, index })
    }
}

/// Derive an address string from a recognized `scriptPubKey` template.
fn address_from_script(script: &Script, network: Network) -> Option<String> {
    match script.template() {
        Template::PayToPubkeyHash(hash) => {
            Some(Address::PublicKeyHash { network, hash }.to_string())
        }
        Template::PayToPubkey(pubkey) => Some(Address::from_pubkey(network, &pubkey).to_string()),
        Template::Unknown => None,
    }
}

/// Derive an address string from a `scriptSig`, for inputs whose prevout
/// script is unknown. Only possible for a P2PKH scriptSig, which carries the
/// spending pubkey alongside the signature; a P2PK scriptSig carries no
/// pubkey and so yields no address.
fn address_from_sig_script(sig_script: &Script, network: Network) -> Option<String> {
    if let [Element::Push(_sig), Element::Push(pubkey)] = sig_script.elements().as_slice() {
        if pubkey.len() == 33 || pubkey.len() == 65 {
            return Some(Address::from_pubkey(network, pubkey).to_string());
        }
    }
    None
}

/// An input: a reference to a spent output, its amount when known, the
/// prevout's `scriptPubKey` when known, a `scriptSig` once signed, a
/// sequence number, and a derived address (§3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub prevout: OutPoint,
    pub amount: u64,
    pub script: Option<Script>,
    pub signature: Option<Script>,
    pub sequence: u32,
    pub address: String,
}

impl Input {
    /// Construct an unsigned input spending a known prevout.
    pub fn new_unsigned(
        prevout: OutPoint,
        amount: u64,
        script: Script,
        sequence: u32,
        network: Network,
    ) -> Input {
        let address = address_from_script(&script, network).unwrap_or_default();
        Input { prevout, amount, script: Some(script), signature: None, sequence, address }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// The number of bytes this input would occupy once serialized,
    /// preferring the real `scriptSig` once signed.
    pub fn serialized_size(&self) -> usize {
        let script_len = self
            .signature
            .as_ref()
            .or(self.script.as_ref())
            .map(|s| s.0.len())
            .unwrap_or(0);
        36 + crate::varint::CompactInt::size(script_len) + script_len + 4
    }
}

/// An output: an amount, a `scriptPubKey`, and its derived address (§3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub amount: u64,
    pub script: Script,
    pub address: String,
}

impl Output {
    pub fn new(amount: u64, script: Script, network: Network) -> Output {
        let address = address_from_script(&script, network).unwrap_or_default();
        Output { amount, script, address }
    }

    pub fn serialized_size(&self) -> usize {
        8 + self.script.serialized_size()
    }
}

/// A transaction: version, inputs, outputs, lock time, plus three
/// non-serialized fields — `tx_hash` (computed only once signed),
/// `block_height` (or `TX_UNCONFIRMED`), and `timestamp` (§3).
///
/// Identity is `tx_hash`: two transactions with the same hash compare equal
/// regardless of any other field.
#[derive(Clone, Debug)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub lock_time: u32,
    tx_hash: Cached<Sha256d>,
    pub block_height: i32,
    pub timestamp: u32,
}

impl Transaction {
    pub fn new(version: i32, inputs: Vec<Input>, outputs: Vec<Output>, lock_time: u32) -> Transaction {
        Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            tx_hash: Cached::new(),
            block_height: TX_UNCONFIRMED,
            timestamp: 0,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.inputs.iter().all(Input::is_signed)
    }

    pub fn tx_hash(&self) -> Option<Sha256d> {
        self.tx_hash.value()
    }

    pub fn is_unconfirmed(&self) -> bool {
        self.block_height == TX_UNCONFIRMED
    }

    /// Recompute and cache `tx_hash` from the canonical legacy serialization
    /// of the fully signed transaction. Fails if any input is still unsigned.
    pub fn recompute_hash(&mut self) -> Result<Sha256d, SerializationError> {
        if !self.is_signed() {
            return Err(SerializationError::Parse(
                "cannot compute txHash of a partially-unsigned transaction",
            ));
        }
        let bytes = codec::serialize_legacy_to_vec(self, None)?;
        let hash = Sha256d::of(&bytes);
        self.tx_hash = Cached::from(hash);
        Ok(hash)
    }

    pub fn serialized_size(&self) -> usize {
        4 + crate::varint::CompactInt::size(self.inputs.len())
            + self.inputs.iter().map(Input::serialized_size).sum::<usize>()
            + crate::varint::CompactInt::size(self.outputs.len())
            + self.outputs.iter().map(Output::serialized_size).sum::<usize>()
            + 4
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.tx_hash.value(), other.tx_hash.value()) {
            return a == b;
        }
        self.version == other.version
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.lock_time == other.lock_time
    }
}

impl Eq for Transaction {}

impl BitcoinSerialize for Transaction {
    fn bitcoin_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        codec::serialize_legacy(self, None, target)
    }
}

impl BitcoinDeserialize for Transaction {
    fn bitcoin_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        codec::parse_legacy(reader, Network::Mainnet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash160;
    use crate::script::Script;

    fn sample_unsigned() -> Transaction {
        let prevout = OutPoint { tx_hash: Sha256d::of(b"prev"), index: 0 };
        let input = Input::new_unsigned(
            prevout,
            200_000,
            Script::new_p2pkh(Hash160([3u8; 20])),
            0xFFFFFFFF,
            Network::Mainnet,
        );
        let output = Output::new(100_000, Script::new_p2pkh(Hash160([4u8; 20])), Network::Mainnet);
        Transaction::new(1, vec![input], vec![output], 0)
    }

    #[test]
    fn unsigned_tx_has_no_hash() {
        bw_test::init();
        let tx = sample_unsigned();
        assert!(!tx.is_signed());
        assert_eq!(tx.tx_hash(), None);
    }

    #[test]
    fn equality_falls_back_to_structure_before_signing() {
        bw_test::init();
        let a = sample_unsigned();
        let b = sample_unsigned();
        assert_eq!(a, b);
    }
}
