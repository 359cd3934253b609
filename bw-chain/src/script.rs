//! Script parsing/emission for the small set of templates this core needs to
//! recognize: pay-to-pubkey-hash and pay-to-pubkey.
//!
//! Full script execution is out of scope (§1 Non-goals); what remains is an
//! element parser/emitter and template matcher, mirroring `zebra-chain`'s
//! `transparent::Script`, generalized to carry opcode-level structure instead
//! of being an opaque byte blob.

use std::fmt;

use crate::hash::Hash160;
use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
use crate::varint::CompactInt;

/// Opcodes referenced by this core (§6).
pub mod op {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1NEGATE: u8 = 0x4f;
    pub const OP_1: u8 = 0x51;
    pub const OP_16: u8 = 0x60;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUAL: u8 = 0x87;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
}

/// A raw Bitcoin script, retained as bytes for bit-exact round-tripping.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Script(pub Vec<u8>);

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Script").field(&hex::encode(&self.0)).finish()
    }
}

/// One parsed item from a script: a data push, or a non-push opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Push(Vec<u8>),
    Op(u8),
}

/// Append a single data push to `out`, choosing the minimal push opcode.
pub fn push_data(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len == 0 {
        out.push(op::OP_0);
    } else if len < op::OP_PUSHDATA1 as usize {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(op::OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= 0xffff {
        out.push(op::OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(op::OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(data);
}

impl Script {
    pub fn new() -> Script {
        Script(Vec::new())
    }

    pub fn serialized_size(&self) -> usize {
        CompactInt::size(self.0.len()) + self.0.len()
    }

    /// Parse the script into a flat list of pushes/opcodes. Stops (without
    /// error) if a push's declared length runs past the end of the script,
    /// since that is simply not a recognizable template for our purposes.
    pub fn elements(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let bytes = &self.0[..];
        let mut i = 0usize;
        while i < bytes.len() {
            let opcode = bytes[i];
            i += 1;
            let push_len = if opcode == op::OP_0 {
                Some(0)
            } else if opcode < op::OP_PUSHDATA1 {
                Some(opcode as usize)
            } else if opcode == op::OP_PUSHDATA1 {
                if i >= bytes.len() {
                    break;
                }
                let n = bytes[i] as usize;
                i += 1;
                Some(n)
            } else if opcode == op::OP_PUSHDATA2 {
                if i + 2 > bytes.len() {
                    break;
                }
                let n = u16::from_le_bytes([bytes[i], bytes[i + 1]]) as usize;
                i += 2;
                Some(n)
            } else if opcode == op::OP_PUSHDATA4 {
                if i + 4 > bytes.len() {
                    break;
                }
                let n = u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
                    as usize;
                i += 4;
                Some(n)
            } else {
                None
            };

            match push_len {
                Some(n) => {
                    if i + n > bytes.len() {
                        break;
                    }
                    out.push(Element::Push(bytes[i..i + n].to_vec()));
                    i += n;
                }
                None => out.push(Element::Op(opcode)),
            }
        }
        out
    }

    /// Build a standard pay-to-pubkey-hash `scriptPubKey`:
    /// `OP_DUP OP_HASH160 <20-byte-hash> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn new_p2pkh(hash: Hash160) -> Script {
        let mut bytes = vec![op::OP_DUP, op::OP_HASH160];
        push_data(&mut bytes, &hash.0);
        bytes.push(op::OP_EQUALVERIFY);
        bytes.push(op::OP_CHECKSIG);
        Script(bytes)
    }

    /// Build a standard pay-to-pubkey `scriptPubKey`: `<pubkey> OP_CHECKSIG`.
    pub fn new_p2pk(pubkey: &[u8]) -> Script {
        let mut bytes = Vec::new();
        push_data(&mut bytes, pubkey);
        bytes.push(op::OP_CHECKSIG);
        Script(bytes)
    }

    /// Build the `scriptSig` for a spent P2PKH output: `<sig> <pubkey>`.
    pub fn new_p2pkh_sig(signature: &[u8], pubkey: &[u8]) -> Script {
        let mut bytes = Vec::new();
        push_data(&mut bytes, signature);
        push_data(&mut bytes, pubkey);
        Script(bytes)
    }

    /// Build the `scriptSig` for a spent P2PK output: `<sig>`.
    pub fn new_p2pk_sig(signature: &[u8]) -> Script {
        let mut bytes = Vec::new();
        push_data(&mut bytes, signature);
        Script(bytes)
    }

    /// Recognize this script as a known template, if possible.
    pub fn template(&self) -> Template {
        let bytes = &self.0[..];
        if bytes.len() == 25
            && bytes[0] == op::OP_DUP
            && bytes[1] == op::OP_HASH160
            && bytes[2] == 20
            && bytes[23] == op::OP_EQUALVERIFY
            && bytes[24] == op::OP_CHECKSIG
        {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&bytes[3..23]);
            return Template::PayToPubkeyHash(Hash160(hash));
        }
        // P2PK: a single push of a compressed (33) or uncompressed (65)
        // pubkey followed by OP_CHECKSIG and nothing else.
        let elements = self.elements();
        if let [Element::Push(data), Element::Op(opcode)] = elements.as_slice() {
            if *opcode == op::OP_CHECKSIG && (data.len() == 33 || data.len() == 65) {
                return Template::PayToPubkey(data.clone());
            }
        }
        Template::Unknown
    }
}

/// A recognized script template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    PayToPubkeyHash(Hash160),
    PayToPubkey(Vec<u8>),
    Unknown,
}

impl BitcoinSerialize for Script {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        CompactInt::from(self.0.len()).bitcoin_serialize(&mut target)?;
        target.write_all(&self.0)
    }
}

impl BitcoinDeserialize for Script {
    fn bitcoin_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = CompactInt::bitcoin_deserialize(&mut reader)?.value();
        let mut bytes = Vec::new();
        std::io::Read::take(&mut reader, len).read_to_end(&mut bytes)?;
        Ok(Script(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p2pkh_roundtrip_template() {
        bw_test::init();
        let hash = Hash160([7u8; 20]);
        let script = Script::new_p2pkh(hash);
        assert_eq!(script.template(), Template::PayToPubkeyHash(hash));
        assert_eq!(script.serialized_size(), CompactInt::size(25) + 25);
    }

    #[test]
    fn p2pk_template() {
        bw_test::init();
        let pubkey = vec![2u8; 33];
        let script = Script::new_p2pk(&pubkey);
        assert_eq!(script.template(), Template::PayToPubkey(pubkey));
    }

    #[test]
    fn unknown_template() {
        bw_test::init();
        let script = Script(vec![op::OP_EQUAL]);
        assert_eq!(script.template(), Template::Unknown);
    }
}
