//! The block store (§4.4): header chain tracking, orphan handling, reorg
//! detection, locators, difficulty verification and the bloom
//! false-positive feedback loop, plus the partial merkle tree decoder that
//! turns a raw `merkleblock` into matched transaction hashes.

pub mod error;
pub mod merkleblock;
pub mod params;
pub mod partial_merkle;
pub mod store;
pub mod target;

pub use error::StateError;
pub use merkleblock::{DecodedBlock, UNKNOWN_HEIGHT};
pub use params::{BitcoinParams, ChainParameters, Checkpoint, BLOCK_DIFFICULTY_INTERVAL};
pub use store::{AcceptOutcome, BlockStore, FilterFeedback};
pub use target::Target;
