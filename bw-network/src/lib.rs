//! The Peer Capability contract (§4.1): what the Peer Manager may ask a
//! peer session to do, what a peer session reports back, inventory
//! vectors, and a concrete BIP37 bloom filter. The wire-level protocol
//! behind these calls is an external collaborator's concern.

pub mod bloom;
pub mod events;
pub mod inv;
pub mod merkleblock;
pub mod peer;

pub use bloom::Filter;
pub use events::{PeerAddress, PeerHandler, PeerId, RejectCode};
pub use inv::InventoryVector;
pub use merkleblock::MerkleBlock;
pub use peer::{ConnectStatus, DisconnectReason, Peer, PeerInfo};
