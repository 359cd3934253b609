//! Which chain a wallet/peer/address belongs to.

use serde::{Deserialize, Serialize};

/// The production chain or its public test chain.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}
