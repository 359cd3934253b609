//! Bit-exact transaction serialization: the legacy digest form and the
//! BIP143-style witness digest form, selected by `hashType` (§4.3).

use std::io::{self, Read, Write};

use crate::hash::{sha256d, Sha256d};
use crate::network::Network;
use crate::script::{Script, Template};
use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
use crate::varint::CompactInt;

use super::sighash::{SigHash, SigHashBase};
use super::{Input, Output, OutPoint, Transaction};

/// When producing a plain wire serialization (as opposed to a signature
/// pre-image), pass no signing context.
pub type SignContext = (usize, SigHash);

fn write_script_field<W: Write>(bytes: &[u8], mut out: W) -> io::Result<()> {
    CompactInt::from(bytes.len()).bitcoin_serialize(&mut out)?;
    out.write_all(bytes)
}

fn read_script_field<R: Read>(mut reader: R) -> Result<Vec<u8>, SerializationError> {
    let len = CompactInt::bitcoin_deserialize(&mut reader)?.value() as usize;
    let mut bytes = vec![0u8; 0];
    reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Serialize one input in plain wire form: the real `scriptSig` once
/// signed, or — for an unsigned input this process built internally — the
/// prevout `scriptPubKey` followed by its amount, an in-memory-only
/// extension that is never produced by, or expected from, a peer (§4.3).
fn write_input_wire<W: Write>(input: &Input, mut out: W) -> io::Result<()> {
    input.prevout.bitcoin_serialize(&mut out)?;
    match (&input.signature, &input.script) {
        (Some(sig), _) => write_script_field(&sig.0, &mut out)?,
        (None, Some(script)) => {
            write_script_field(&script.0, &mut out)?;
            input.amount.bitcoin_serialize(&mut out)?;
        }
        (None, None) => write_script_field(&[], &mut out)?,
    }
    input.sequence.bitcoin_serialize(&mut out)
}

fn write_output_wire<W: Write>(output: &Output, mut out: W) -> io::Result<()> {
    output.amount.bitcoin_serialize(&mut out)?;
    output.script.bitcoin_serialize(&mut out)
}

/// Serialize `tx`'s legacy form, either as a plain wire encoding
/// (`sign_context: None`) or as a signature pre-image for one input
/// (`sign_context: Some((idx, hashtype))`) (§4.3).
pub fn serialize_legacy<W: Write>(
    tx: &Transaction,
    sign_context: Option<SignContext>,
    mut out: W,
) -> Result<(), io::Error> {
    tx.version.bitcoin_serialize(&mut out)?;

    match sign_context {
        Some((idx, hashtype)) if hashtype.anyone_can_pay => {
            CompactInt::from(1).bitcoin_serialize(&mut out)?;
            let input = &tx.inputs[idx];
            input.prevout.bitcoin_serialize(&mut out)?;
            let script_code = input.script.as_ref().map(|s| s.0.as_slice()).unwrap_or(&[]);
            write_script_field(script_code, &mut out)?;
            input.sequence.bitcoin_serialize(&mut out)?;
        }
        Some((idx, hashtype)) => {
            CompactInt::from(tx.inputs.len()).bitcoin_serialize(&mut out)?;
            for (i, input) in tx.inputs.iter().enumerate() {
                input.prevout.bitcoin_serialize(&mut out)?;
                if i == idx {
                    let script_code = input.script.as_ref().map(|s| s.0.as_slice()).unwrap_or(&[]);
                    write_script_field(script_code, &mut out)?;
                } else {
                    write_script_field(&[], &mut out)?;
                }
                let seq = if i != idx
                    && matches!(hashtype.base, SigHashBase::None | SigHashBase::Single)
                {
                    0
                } else {
                    input.sequence
                };
                seq.bitcoin_serialize(&mut out)?;
            }
        }
        None => {
            CompactInt::from(tx.inputs.len()).bitcoin_serialize(&mut out)?;
            for input in &tx.inputs {
                write_input_wire(input, &mut out)?;
            }
        }
    }

    match sign_context.map(|(idx, h)| (idx, h.base)) {
        Some((_, SigHashBase::None)) => {
            CompactInt::from(0usize).bitcoin_serialize(&mut out)?;
        }
        Some((idx, SigHashBase::Single)) if idx < tx.outputs.len() => {
            CompactInt::from(idx + 1).bitcoin_serialize(&mut out)?;
            for (i, output) in tx.outputs.iter().enumerate().take(idx + 1) {
                if i < idx {
                    u64::MAX.bitcoin_serialize(&mut out)?;
                    write_script_field(&[], &mut out)?;
                } else {
                    write_output_wire(output, &mut out)?;
                }
            }
        }
        _ => {
            CompactInt::from(tx.outputs.len()).bitcoin_serialize(&mut out)?;
            for output in &tx.outputs {
                write_output_wire(output, &mut out)?;
            }
        }
    }

    tx.lock_time.bitcoin_serialize(&mut out)?;

    if let Some((_, hashtype)) = sign_context {
        hashtype.as_u32().bitcoin_serialize(&mut out)?;
    }
    Ok(())
}

pub fn serialize_legacy_to_vec(
    tx: &Transaction,
    sign_context: Option<SignContext>,
) -> Result<Vec<u8>, io::Error> {
    let mut buf = Vec::new();
    serialize_legacy(tx, sign_context, &mut buf)?;
    Ok(buf)
}

/// The legacy signature pre-image digest for input `idx` under `hashtype`.
pub fn legacy_sighash(tx: &Transaction, idx: usize, hashtype: SigHash) -> Result<Sha256d, io::Error> {
    let bytes = serialize_legacy_to_vec(tx, Some((idx, hashtype)))?;
    Ok(Sha256d::of(&bytes))
}

/// The BIP143-style witness pre-image digest for input `idx`, given the
/// prevout's `scriptPubKey` (`script_code`) and `amount` (§4.3).
pub fn witness_sighash(
    tx: &Transaction,
    idx: usize,
    hashtype: SigHash,
    script_code: &Script,
    amount: u64,
) -> Result<Sha256d, io::Error> {
    let mut preimage = Vec::new();
    tx.version.bitcoin_serialize(&mut preimage)?;

    let hash_prevouts = if hashtype.anyone_can_pay {
        [0u8; 32]
    } else {
        let mut buf = Vec::new();
        for input in &tx.inputs {
            input.prevout.bitcoin_serialize(&mut buf)?;
        }
        sha256d(&buf)
    };
    preimage.write_all(&hash_prevouts)?;

    let hash_sequence = if !hashtype.anyone_can_pay && matches!(hashtype.base, SigHashBase::All) {
        let mut buf = Vec::new();
        for input in &tx.inputs {
            input.sequence.bitcoin_serialize(&mut buf)?;
        }
        sha256d(&buf)
    } else {
        [0u8; 32]
    };
    preimage.write_all(&hash_sequence)?;

    tx.inputs[idx].prevout.bitcoin_serialize(&mut preimage)?;
    write_script_field(&script_code.0, &mut preimage)?;
    amount.bitcoin_serialize(&mut preimage)?;
    tx.inputs[idx].sequence.bitcoin_serialize(&mut preimage)?;

    let hash_outputs = match hashtype.base {
        SigHashBase::All => {
            let mut buf = Vec::new();
            for output in &tx.outputs {
                write_output_wire(output, &mut buf)?;
            }
            sha256d(&buf)
        }
        SigHashBase::Single if idx < tx.outputs.len() => {
            let mut buf = Vec::new();
            write_output_wire(&tx.outputs[idx], &mut buf)?;
            sha256d(&buf)
        }
        _ => [0u8; 32],
    };
    preimage.write_all(&hash_outputs)?;

    tx.lock_time.bitcoin_serialize(&mut preimage)?;
    hashtype.as_u32().bitcoin_serialize(&mut preimage)?;

    Ok(Sha256d::of(&preimage))
}

fn read_input<R: Read>(mut reader: R, network: Network) -> Result<Input, SerializationError> {
    let prevout = OutPoint::bitcoin_deserialize(&mut reader)?;
    let raw = read_script_field(&mut reader)?;
    let candidate = Script(raw);
    let recognized = !matches!(candidate.template(), Template::Unknown);

    let (script, signature, amount) = if recognized {
        let amount = u64::bitcoin_deserialize(&mut reader)?;
        (Some(candidate), None, amount)
    } else {
        (None, Some(candidate), 0)
    };
    let sequence = u32::bitcoin_deserialize(&mut reader)?;

    let address = script
        .as_ref()
        .and_then(|s| super::address_from_script(s, network))
        .or_else(|| signature.as_ref().and_then(|s| super::address_from_sig_script(s, network)))
        .unwrap_or_default();

    Ok(Input { prevout, amount, script, signature, sequence, address })
}

fn read_output<R: Read>(mut reader: R, network: Network) -> Result<Output, SerializationError> {
    let amount = u64::bitcoin_deserialize(&mut reader)?;
    let script = Script::bitcoin_deserialize(&mut reader)?;
    Ok(Output::new(amount, script, network))
}

/// Parse a legacy-serialized transaction (§4.3). Computes `tx_hash` only if
/// every parsed input turned out to be signed.
pub fn parse_legacy<R: Read>(mut reader: R, network: Network) -> Result<Transaction, SerializationError> {
    let version = i32::bitcoin_deserialize(&mut reader)?;

    let n_in = CompactInt::bitcoin_deserialize(&mut reader)?.value();
    let mut inputs = Vec::with_capacity(n_in.min(100_000) as usize);
    for _ in 0..n_in {
        inputs.push(read_input(&mut reader, network)?);
    }

    let n_out = CompactInt::bitcoin_deserialize(&mut reader)?.value();
    let mut outputs = Vec::with_capacity(n_out.min(100_000) as usize);
    for _ in 0..n_out {
        outputs.push(read_output(&mut reader, network)?);
    }

    let lock_time = u32::bitcoin_deserialize(&mut reader)?;

    let mut tx = Transaction::new(version, inputs, outputs, lock_time);
    if tx.is_signed() {
        tx.recompute_hash()?;
    }
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SIGHASH_FORKID;
    use crate::hash::Hash160;

    fn signed_round_trip_tx() -> Transaction {
        let prevout = OutPoint { tx_hash: Sha256d::of(b"roundtrip-prev"), index: 3 };
        let script = Script::new_p2pkh(Hash160([5u8; 20]));
        let mut input = Input::new_unsigned(prevout, 200_000, script, 0xFFFFFFFF, Network::Mainnet);
        input.signature = Some(Script::new_p2pkh_sig(&[1u8; 71], &[2u8; 33]));
        let output = Output::new(100_000, Script::new_p2pkh(Hash160([6u8; 20])), Network::Mainnet);
        let mut tx = Transaction::new(1, vec![input], vec![output], 0);
        tx.recompute_hash().unwrap();
        tx
    }

    #[test]
    fn signed_tx_round_trips_byte_identical() {
        bw_test::init();
        let tx = signed_round_trip_tx();
        let bytes = serialize_legacy_to_vec(&tx, None).unwrap();
        let parsed = parse_legacy(&bytes[..], Network::Mainnet).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.lock_time, 0);
        assert_eq!(parsed.inputs.len(), 1);
        assert_eq!(parsed.outputs.len(), 1);
        assert_eq!(parsed.tx_hash(), Some(Sha256d::of(&bytes)));
        let reserialized = serialize_legacy_to_vec(&parsed, None).unwrap();
        assert_eq!(bytes, reserialized);
    }

    #[test]
    fn legacy_sighash_all_is_deterministic() {
        bw_test::init();
        let tx = signed_round_trip_tx();
        let a = legacy_sighash(&tx, 0, SigHash::all(0)).unwrap();
        let b = legacy_sighash(&tx, 0, SigHash::all(0)).unwrap();
        assert_eq!(a, b);
        let none = legacy_sighash(&tx, 0, SigHash::none(0)).unwrap();
        assert_ne!(a, none);
    }

    #[test]
    fn witness_digest_differs_from_legacy() {
        bw_test::init();
        let tx = signed_round_trip_tx();
        let script_code = Script::new_p2pkh(Hash160([5u8; 20]));
        let legacy = legacy_sighash(&tx, 0, SigHash::all(0)).unwrap();
        let witness =
            witness_sighash(&tx, 0, SigHash::all(SIGHASH_FORKID), &script_code, 200_000).unwrap();
        assert_ne!(legacy, witness);
    }
}
