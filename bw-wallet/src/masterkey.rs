//! BIP32-style non-hardened public-key derivation for the wallet's
//! external/internal address chains (§4.2).
//!
//! This core treats BIP32 as an external cryptographic contract (§1), but the
//! gap-limit chain itself is testable only against a real derivation, so this
//! module implements plain (non-hardened) CKD directly over `secp256k1` and
//! `hmac`/`sha2`, the same primitives `zebra-chain`'s address module reaches
//! for.

use hmac::{Hmac, Mac, NewMac};
use secp256k1::{PublicKey, Secp256k1, SecretKey, Signing};
use sha2::Sha512;

use crate::error::WalletError;

type HmacSha512 = Hmac<Sha512>;

/// An extended private key: a secret key plus the chain code needed to
/// derive its children.
#[derive(Clone)]
pub struct ExtendedPrivateKey {
    pub secret_key: SecretKey,
    pub chain_code: [u8; 32],
}

impl ExtendedPrivateKey {
    /// Build a master extended key from a BIP32 seed (already generated by
    /// some external BIP39 mnemonic-to-seed collaborator).
    pub fn from_seed(seed: &[u8]) -> Result<ExtendedPrivateKey, WalletError> {
        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
            .map_err(|_| WalletError::InvalidKeyMaterial)?;
        mac.update(seed);
        let result = mac.finalize().into_bytes();
        let (key_bytes, chain_code_bytes) = result.split_at(32);
        let secret_key =
            SecretKey::from_slice(key_bytes).map_err(|_| WalletError::InvalidKeyMaterial)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(chain_code_bytes);
        Ok(ExtendedPrivateKey { secret_key, chain_code })
    }

    /// Derive the non-hardened child at `index` (`index < 2^31`).
    pub fn derive_child<C: Signing>(
        &self,
        secp: &Secp256k1<C>,
        index: u32,
    ) -> Result<ExtendedPrivateKey, WalletError> {
        if index & 0x8000_0000 != 0 {
            return Err(WalletError::InvalidKeyMaterial);
        }
        let parent_public = PublicKey::from_secret_key(secp, &self.secret_key);

        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|_| WalletError::InvalidKeyMaterial)?;
        mac.update(&parent_public.serialize());
        mac.update(&index.to_be_bytes());
        let result = mac.finalize().into_bytes();
        let (tweak_bytes, chain_code_bytes) = result.split_at(32);

        let mut child_secret = self.secret_key;
        let tweak =
            SecretKey::from_slice(tweak_bytes).map_err(|_| WalletError::InvalidKeyMaterial)?;
        child_secret.add_assign(tweak.as_ref()).map_err(|_| WalletError::InvalidKeyMaterial)?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(chain_code_bytes);
        Ok(ExtendedPrivateKey { secret_key: child_secret, chain_code })
    }

    pub fn public_key<C: Signing>(&self, secp: &Secp256k1<C>) -> PublicKey {
        PublicKey::from_secret_key(secp, &self.secret_key)
    }
}

/// A `BIP32`-style master key, held by the wallet as the sole key
/// material: derivation of `external`/`internal` chains reads from this.
pub struct MasterKey {
    root: ExtendedPrivateKey,
}

/// Which address chain an address/key is derived on (§3).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Chain {
    External = 0,
    Internal = 1,
}

impl MasterKey {
    pub fn from_seed(seed: &[u8]) -> Result<MasterKey, WalletError> {
        Ok(MasterKey { root: ExtendedPrivateKey::from_seed(seed)? })
    }

    /// Derive the private key at `chain/index` (`m/chain/index`, no
    /// account-level hardening — that level is assumed handled upstream of
    /// this core, e.g. by the host's mnemonic-to-seed step).
    pub fn derive<C: Signing>(
        &self,
        secp: &Secp256k1<C>,
        chain: Chain,
        index: u32,
    ) -> Result<ExtendedPrivateKey, WalletError> {
        let chain_key = self.root.derive_child(secp, chain as u32)?;
        chain_key.derive_child(secp, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        bw_test::init();
        let secp = Secp256k1::signing_only();
        let master = MasterKey::from_seed(b"correct horse battery staple seed material!!").unwrap();
        let a = master.derive(&secp, Chain::External, 0).unwrap();
        let b = master.derive(&secp, Chain::External, 0).unwrap();
        assert_eq!(a.secret_key, b.secret_key);
    }

    #[test]
    fn different_indices_differ() {
        bw_test::init();
        let secp = Secp256k1::signing_only();
        let master = MasterKey::from_seed(b"correct horse battery staple seed material!!").unwrap();
        let a = master.derive(&secp, Chain::External, 0).unwrap();
        let b = master.derive(&secp, Chain::External, 1).unwrap();
        assert_ne!(a.secret_key, b.secret_key);
    }

    #[test]
    fn external_and_internal_chains_differ() {
        bw_test::init();
        let secp = Secp256k1::signing_only();
        let master = MasterKey::from_seed(b"correct horse battery staple seed material!!").unwrap();
        let ext = master.derive(&secp, Chain::External, 0).unwrap();
        let int = master.derive(&secp, Chain::Internal, 0).unwrap();
        assert_ne!(ext.secret_key, int.secret_key);
    }
}
