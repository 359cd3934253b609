//! The wallet engine: deterministic address chains, an ordered transaction
//! log, the UTXO set derived from it, and a coin-selecting transaction
//! builder (§4.2).

pub mod coinselect;
pub mod error;
pub mod keychain;
pub mod masterkey;
pub mod ordering;
pub mod sign;
pub mod wallet;

pub use coinselect::Utxo;
pub use error::WalletError;
pub use keychain::Keychain;
pub use masterkey::{Chain, MasterKey};
pub use wallet::{Wallet, WalletEvent};
