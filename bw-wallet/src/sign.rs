//! Signs each matching input of a transaction against a P2PKH or P2PK
//! prevout script template (§4.2).

use bw_chain::script::{Script, Template};
use bw_chain::transaction::codec;
use bw_chain::transaction::sighash::SigHash;
use bw_chain::Transaction;
use secp256k1::Message;

use crate::error::WalletError;
use crate::keychain::Keychain;

/// Sign every input of `tx` whose derived address matches a key in
/// `keychain`, under `forkId | SIGHASH_ALL` (§4.2). Fails if any input has
/// no matching key. Recomputes `tx_hash` once every input is signed.
pub fn sign_transaction(
    tx: &mut Transaction,
    keychain: &Keychain,
    fork_id: u8,
) -> Result<(), WalletError> {
    let hashtype = SigHash::all(fork_id);

    for idx in 0..tx.inputs.len() {
        let address = tx.inputs[idx].address.clone();
        let secret = keychain.private_key_for(&address).ok_or(WalletError::NoMatchingKey)?;
        let script =
            tx.inputs[idx].script.clone().ok_or(WalletError::NoMatchingKey)?;

        let digest = codec::legacy_sighash(tx, idx, hashtype)?;
        let message =
            Message::from_slice(&digest.0).map_err(|_| WalletError::InvalidKeyMaterial)?;

        let secp = keychain.secp();
        let signature = secp.sign(&message, &secret);
        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(hashtype.as_u32() as u8);
        let pubkey = secp256k1::PublicKey::from_secret_key(secp, &secret);

        let sig_script = match script.template() {
            Template::PayToPubkeyHash(_) => Script::new_p2pkh_sig(&sig_bytes, &pubkey.serialize()),
            Template::PayToPubkey(_) => Script::new_p2pk_sig(&sig_bytes),
            Template::Unknown => return Err(WalletError::NoMatchingKey),
        };
        tx.inputs[idx].signature = Some(sig_script);
    }

    tx.recompute_hash()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bw_chain::hash::Sha256d;
    use bw_chain::transaction::{Input, OutPoint, Output};
    use bw_chain::Network;

    use crate::keychain::Keychain;
    use crate::masterkey::{Chain, MasterKey};

    #[test]
    fn signs_p2pkh_input_and_round_trips() {
        bw_test::init();
        let master = MasterKey::from_seed(b"a reasonably long deterministic test seed!!").unwrap();
        let mut keychain = Keychain::new(master, Network::Mainnet);
        let addrs = keychain.unused_addrs(1, Chain::External).unwrap();
        let entry_script = {
            let addr: bw_chain::transparent::Address = addrs[0].parse().unwrap();
            Script::new_p2pkh(addr.hash())
        };

        let prevout = OutPoint { tx_hash: Sha256d::of(b"funding-tx"), index: 0 };
        let input = Input::new_unsigned(prevout, 200_000, entry_script, 0xFFFFFFFF, Network::Mainnet);
        let output = Output::new(
            100_000,
            Script::new_p2pkh(bw_chain::Hash160([9u8; 20])),
            Network::Mainnet,
        );
        let mut tx = Transaction::new(1, vec![input], vec![output], 0);

        sign_transaction(&mut tx, &keychain, 0).unwrap();

        assert!(tx.is_signed());
        assert!(tx.tx_hash().is_some());

        let bytes = codec::serialize_legacy_to_vec(&tx, None).unwrap();
        let parsed = codec::parse_legacy(&bytes[..], Network::Mainnet).unwrap();
        let reserialized = codec::serialize_legacy_to_vec(&parsed, None).unwrap();
        assert_eq!(bytes, reserialized);
    }
}
