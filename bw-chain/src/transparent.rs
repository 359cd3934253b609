//! Base58Check addresses: encoding/decoding pay-to-pubkey-hash and
//! pay-to-script-hash payloads, per network (§3, §6).
//!
//! Grounded on `zebra-chain`'s `transparent::Address`, generalized from the
//! Zcash-style multi-byte prefixes down to Bitcoin's single version byte.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hash::Hash160;
use crate::network::Network;
use crate::serialization::SerializationError;

/// Version byte for a P2PKH address, by network (§6: PUBKEY_ADDRESS).
fn pubkey_version(network: Network) -> u8 {
    match network {
        Network::Mainnet => 48,
        Network::Testnet => 111,
    }
}

/// Version byte for a P2SH address, by network (§6: SCRIPT_ADDRESS).
fn script_version(network: Network) -> u8 {
    match network {
        Network::Mainnet => 50,
        Network::Testnet => 58,
    }
}

/// A transparent payment address: either a pay-to-pubkey-hash or
/// pay-to-script-hash destination, tagged with the network it was derived
/// for so it round-trips through the right version byte.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub enum Address {
    PublicKeyHash { network: Network, hash: Hash160 },
    ScriptHash { network: Network, hash: Hash160 },
}

impl Address {
    pub fn network(&self) -> Network {
        match self {
            Address::PublicKeyHash { network, .. } => *network,
            Address::ScriptHash { network, .. } => *network,
        }
    }

    pub fn hash(&self) -> Hash160 {
        match self {
            Address::PublicKeyHash { hash, .. } => *hash,
            Address::ScriptHash { hash, .. } => *hash,
        }
    }

    pub fn from_pubkey(network: Network, pubkey: &[u8]) -> Address {
        Address::PublicKeyHash { network, hash: Hash160::of(pubkey) }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (version, hash) = match self {
            Address::PublicKeyHash { network, hash } => (pubkey_version(*network), hash),
            Address::ScriptHash { network, hash } => (script_version(*network), hash),
        };
        let mut payload = Vec::with_capacity(21);
        payload.push(version);
        payload.extend_from_slice(&hash.0);
        f.write_str(&bs58::encode(payload).with_check().into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let payload = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|_| SerializationError::Parse("invalid base58check address"))?;
        if payload.len() != 21 {
            return Err(SerializationError::Parse("address payload is not 21 bytes"));
        }
        let version = payload[0];
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        let hash = Hash160(hash);

        for network in [Network::Mainnet, Network::Testnet] {
            if version == pubkey_version(network) {
                return Ok(Address::PublicKeyHash { network, hash });
            }
            if version == script_version(network) {
                return Ok(Address::ScriptHash { network, hash });
            }
        }
        Err(SerializationError::Parse("unrecognized address version byte"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_hash_roundtrip_mainnet() {
        bw_test::init();
        let addr = Address::PublicKeyHash { network: Network::Mainnet, hash: Hash160([1u8; 20]) };
        let s = addr.to_string();
        let parsed: Address = s.parse().unwrap();
        assert_eq!(addr, parsed);
        assert_eq!(parsed.network(), Network::Mainnet);
    }

    #[test]
    fn script_hash_roundtrip_testnet() {
        bw_test::init();
        let addr = Address::ScriptHash { network: Network::Testnet, hash: Hash160([9u8; 20]) };
        let s = addr.to_string();
        let parsed: Address = s.parse().unwrap();
        assert_eq!(addr, parsed);
        assert_eq!(parsed.network(), Network::Testnet);
    }

    #[test]
    fn rejects_bad_checksum() {
        bw_test::init();
        let addr = Address::PublicKeyHash { network: Network::Mainnet, hash: Hash160([1u8; 20]) };
        let mut s = addr.to_string();
        s.push('x');
        assert!(s.parse::<Address>().is_err());
    }
}
