//! Core codec, address, script and transaction types for the SPV wallet core.
//!
//! This crate is the leaf of the dependency graph: it has no knowledge of
//! peers, block stores or wallets, only of the wire-level shapes that those
//! higher layers serialize and sign.

pub mod block;
pub mod cached;
pub mod constants;
pub mod hash;
pub mod network;
pub mod rand;
pub mod script;
pub mod serialization;
pub mod transaction;
pub mod transparent;
pub mod varint;

pub use block::Header as BlockHeader;
pub use cached::Cached;
pub use hash::{hash160, sha256d, Hash160, Sha256d};
pub use network::Network;
pub use rand::BwRand;
pub use serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
pub use transaction::{Input, Output, OutPoint, SigHash, Transaction};
pub use transparent::Address;
pub use varint::CompactInt;
