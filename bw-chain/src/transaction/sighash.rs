//! The `hashType` that selects a transaction's signature pre-image form
//! (§4.3, §6).

use crate::constants::{
    SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_FORKID, SIGHASH_NONE, SIGHASH_SINGLE,
};

/// The base signing scope: which outputs are committed to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SigHashBase {
    All,
    None,
    Single,
}

/// A fully decoded `hashType`: base scope, the `ANYONECANPAY` input-scope
/// flag, and a configurable fork-id byte. A zero fork id selects the legacy
/// digest form; a nonzero one (e.g. `SIGHASH_FORKID`) selects the BIP143
/// witness digest form.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SigHash {
    pub base: SigHashBase,
    pub anyone_can_pay: bool,
    pub fork_id: u8,
}

impl SigHash {
    pub fn all(fork_id: u8) -> SigHash {
        SigHash { base: SigHashBase::All, anyone_can_pay: false, fork_id }
    }

    pub fn none(fork_id: u8) -> SigHash {
        SigHash { base: SigHashBase::None, anyone_can_pay: false, fork_id }
    }

    pub fn single(fork_id: u8) -> SigHash {
        SigHash { base: SigHashBase::Single, anyone_can_pay: false, fork_id }
    }

    pub fn with_anyone_can_pay(mut self) -> SigHash {
        self.anyone_can_pay = true;
        self
    }

    /// Whether this hashType selects the BIP143-style witness digest (§4.3).
    pub fn uses_witness_digest(&self) -> bool {
        self.fork_id & SIGHASH_FORKID != 0
    }

    /// Encode as the 4-byte `hashType` appended to a legacy pre-image, or
    /// carried in the witness digest's tail.
    pub fn as_u32(&self) -> u32 {
        let mut byte = match self.base {
            SigHashBase::All => SIGHASH_ALL,
            SigHashBase::None => SIGHASH_NONE,
            SigHashBase::Single => SIGHASH_SINGLE,
        };
        if self.anyone_can_pay {
            byte |= SIGHASH_ANYONECANPAY;
        }
        byte |= self.fork_id;
        byte as u32
    }

    pub fn from_u32(value: u32) -> SigHash {
        let byte = value as u8;
        let base = match byte & 0x1f {
            SIGHASH_NONE => SigHashBase::None,
            SIGHASH_SINGLE => SigHashBase::Single,
            _ => SigHashBase::All,
        };
        let anyone_can_pay = byte & SIGHASH_ANYONECANPAY != 0;
        let fork_id = byte & !(SIGHASH_ANYONECANPAY | 0x1f);
        SigHash { base, anyone_can_pay, fork_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_u32() {
        bw_test::init();
        for sighash in [
            SigHash::all(0),
            SigHash::none(0),
            SigHash::single(0),
            SigHash::all(SIGHASH_FORKID),
            SigHash::single(SIGHASH_FORKID).with_anyone_can_pay(),
        ] {
            let decoded = SigHash::from_u32(sighash.as_u32());
            assert_eq!(decoded, sighash);
        }
    }

    #[test]
    fn fork_id_selects_witness_digest() {
        bw_test::init();
        assert!(!SigHash::all(0).uses_witness_digest());
        assert!(SigHash::all(SIGHASH_FORKID).uses_witness_digest());
    }
}
