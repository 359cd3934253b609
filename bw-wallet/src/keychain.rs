//! Deterministic external/internal address chains with gap-limit growth
//! (§4.2).

use bw_chain::constants::{SEQUENCE_GAP_LIMIT_EXTERNAL, SEQUENCE_GAP_LIMIT_INTERNAL};
use bw_chain::transparent::Address;
use bw_chain::Network;
use secp256k1::{Secp256k1, SecretKey, SignOnly};

use crate::error::WalletError;
use crate::masterkey::{Chain, MasterKey};

/// One derived address and whether the wallet has ever seen it used.
#[derive(Clone, Debug)]
pub struct AddressEntry {
    pub index: u32,
    pub address: String,
    pub public_key: Vec<u8>,
    pub used: bool,
}

fn gap_limit(chain: Chain) -> usize {
    match chain {
        Chain::External => SEQUENCE_GAP_LIMIT_EXTERNAL,
        Chain::Internal => SEQUENCE_GAP_LIMIT_INTERNAL,
    }
}

/// Owns the wallet's master key and the two append-only address chains
/// derived from it.
pub struct Keychain {
    master: MasterKey,
    secp: Secp256k1<SignOnly>,
    network: Network,
    external: Vec<AddressEntry>,
    internal: Vec<AddressEntry>,
}

impl Keychain {
    pub fn new(master: MasterKey, network: Network) -> Keychain {
        Keychain {
            master,
            secp: Secp256k1::signing_only(),
            network,
            external: Vec::new(),
            internal: Vec::new(),
        }
    }

    fn entries(&self, chain: Chain) -> &Vec<AddressEntry> {
        match chain {
            Chain::External => &self.external,
            Chain::Internal => &self.internal,
        }
    }

    fn entries_mut(&mut self, chain: Chain) -> &mut Vec<AddressEntry> {
        match chain {
            Chain::External => &mut self.external,
            Chain::Internal => &mut self.internal,
        }
    }

    fn extend_to(&mut self, chain: Chain, min_len: usize) -> Result<(), WalletError> {
        while self.entries(chain).len() < min_len {
            let index = self.entries(chain).len() as u32;
            let key = self.master.derive(&self.secp, chain, index)?;
            let pubkey = key.public_key(&self.secp);
            let pubkey_bytes = pubkey.serialize().to_vec();
            let address = Address::from_pubkey(self.network, &pubkey_bytes).to_string();
            self.entries_mut(chain).push(AddressEntry {
                index,
                address,
                public_key: pubkey_bytes,
                used: false,
            });
        }
        Ok(())
    }

    /// The next `n` addresses following the last *used* address on `chain`,
    /// extending the chain one address at a time until there are at least
    /// `n` trailing unused addresses (§4.2).
    pub fn unused_addrs(&mut self, n: usize, chain: Chain) -> Result<Vec<String>, WalletError> {
        loop {
            let last_used = self.entries(chain).iter().rposition(|e| e.used);
            let start = last_used.map(|i| i + 1).unwrap_or(0);
            let trailing_unused = self.entries(chain).len() - start;
            if trailing_unused >= n {
                return Ok(self.entries(chain)[start..start + n]
                    .iter()
                    .map(|e| e.address.clone())
                    .collect());
            }
            let grow_to = self.entries(chain).len() + 1;
            self.extend_to(chain, grow_to)?;
        }
    }

    /// The default gap-limit-worth of unused addresses on `chain`.
    pub fn unused_addrs_default(&mut self, chain: Chain) -> Result<Vec<String>, WalletError> {
        self.unused_addrs(gap_limit(chain), chain)
    }

    /// Mark `address` used (if it belongs to either chain) and top the
    /// chain's trailing unused addresses back up to its gap limit.
    pub fn mark_used(&mut self, address: &str) -> Result<bool, WalletError> {
        for chain in [Chain::External, Chain::Internal] {
            if let Some(entry) = self.entries_mut(chain).iter_mut().find(|e| e.address == address)
            {
                entry.used = true;
                self.unused_addrs_default(chain)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.external.iter().any(|e| e.address == address)
            || self.internal.iter().any(|e| e.address == address)
    }

    pub fn all_addresses(&self) -> impl Iterator<Item = &str> {
        self.external.iter().chain(self.internal.iter()).map(|e| e.address.as_str())
    }

    /// Recompute the private key for `address`, for signing.
    pub fn private_key_for(&self, address: &str) -> Option<SecretKey> {
        for chain in [Chain::External, Chain::Internal] {
            if let Some(entry) = self.entries(chain).iter().find(|e| e.address == address) {
                return self.master.derive(&self.secp, chain, entry.index).ok().map(|k| k.secret_key);
            }
        }
        None
    }

    pub fn secp(&self) -> &Secp256k1<SignOnly> {
        &self.secp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keychain() -> Keychain {
        let master = MasterKey::from_seed(b"a reasonably long deterministic test seed!!").unwrap();
        Keychain::new(master, Network::Mainnet)
    }

    #[test]
    fn unused_addrs_grows_chain_and_is_stable() {
        bw_test::init();
        let mut kc = keychain();
        let first = kc.unused_addrs(3, Chain::External).unwrap();
        assert_eq!(first.len(), 3);
        let second = kc.unused_addrs(3, Chain::External).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn marking_used_advances_the_window() {
        bw_test::init();
        let mut kc = keychain();
        let initial = kc.unused_addrs(1, Chain::External).unwrap();
        kc.mark_used(&initial[0]).unwrap();
        let next = kc.unused_addrs(1, Chain::External).unwrap();
        assert_ne!(initial[0], next[0]);
    }

    #[test]
    fn private_key_matches_derived_address() {
        bw_test::init();
        let mut kc = keychain();
        let addrs = kc.unused_addrs(1, Chain::External).unwrap();
        let secret = kc.private_key_for(&addrs[0]).expect("key must exist for a derived address");
        let pubkey = secp256k1::PublicKey::from_secret_key(kc.secp(), &secret);
        let derived = Address::from_pubkey(Network::Mainnet, &pubkey.serialize()).to_string();
        assert_eq!(derived, addrs[0]);
    }
}
