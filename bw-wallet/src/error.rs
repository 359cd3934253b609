//! Wallet error kinds surfaced to the host (§7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("key derivation produced invalid key material")]
    InvalidKeyMaterial,

    #[error("no key in the wallet matches this input's prevout script")]
    NoMatchingKey,

    #[error("cannot build a transaction with no outputs")]
    NoOutputs,

    #[error("insufficient funds: balance does not cover the requested amount plus fees")]
    InsufficientFunds,

    #[error("cannot publish a transaction that is not fully signed")]
    NotSigned,

    #[error("serialization error: {0}")]
    Serialization(#[from] bw_chain::SerializationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
