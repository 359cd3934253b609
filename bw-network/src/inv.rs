//! Inventory vectors: typed hashes advertised or requested over `inv` /
//! `getdata` / `notfound` (§4.1, §4.5 relay bookkeeping).
//!
//! Grounded on `zebra-network`'s `protocol::external::inv::InventoryHash`; the
//! `FilteredBlock` variant carries the extra meaning BIP37 gives it (ask for
//! a `merkleblock` instead of a `block`), which this core always uses once a
//! bloom filter is loaded.

use std::io::{Read, Write};

use bw_chain::hash::Sha256d;
use bw_chain::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// A typed hash naming some piece of data a peer has or wants (§4.1).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InventoryVector {
    Error,
    Tx(Sha256d),
    Block(Sha256d),
    FilteredBlock(Sha256d),
}

impl InventoryVector {
    pub fn hash(&self) -> Option<Sha256d> {
        match self {
            InventoryVector::Error => None,
            InventoryVector::Tx(h) | InventoryVector::Block(h) | InventoryVector::FilteredBlock(h) => {
                Some(*h)
            }
        }
    }
}

impl From<Sha256d> for InventoryVector {
    fn from(hash: Sha256d) -> InventoryVector {
        InventoryVector::Tx(hash)
    }
}

impl BitcoinSerialize for InventoryVector {
    fn bitcoin_serialize<W: Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        let (code, hash): (u32, Sha256d) = match *self {
            InventoryVector::Error => (0, Sha256d::zero()),
            InventoryVector::Tx(h) => (1, h),
            InventoryVector::Block(h) => (2, h),
            InventoryVector::FilteredBlock(h) => (3, h),
        };
        code.bitcoin_serialize(&mut target)?;
        hash.bitcoin_serialize(&mut target)
    }
}

impl BitcoinDeserialize for InventoryVector {
    fn bitcoin_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let code = u32::bitcoin_deserialize(&mut reader)?;
        let hash = Sha256d::bitcoin_deserialize(&mut reader)?;
        match code {
            0 => Ok(InventoryVector::Error),
            1 => Ok(InventoryVector::Tx(hash)),
            2 => Ok(InventoryVector::Block(hash)),
            3 => Ok(InventoryVector::FilteredBlock(hash)),
            _ => Err(SerializationError::Parse("invalid inventory vector code")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_each_variant() {
        bw_test::init();
        let hash = Sha256d::of(b"some-hash");
        for vector in [
            InventoryVector::Error,
            InventoryVector::Tx(hash),
            InventoryVector::Block(hash),
            InventoryVector::FilteredBlock(hash),
        ] {
            let bytes = vector.bitcoin_serialize_to_vec().unwrap();
            let parsed = InventoryVector::bitcoin_deserialize(&bytes[..]).unwrap();
            assert_eq!(vector, parsed);
        }
    }
}
