use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("block {0} does not extend any known block and is older than the orphan horizon")]
    OrphanTooOld(bw_chain::hash::Sha256d),
    #[error("block {0} failed verification against its claimed parent")]
    InvalidBlock(bw_chain::hash::Sha256d),
    #[error("block at height {height} does not match the checkpoint hash")]
    CheckpointMismatch { height: i32 },
    #[error("difficulty-interval ancestor for block {0} is not in memory")]
    MissingDifficultyAncestor(bw_chain::hash::Sha256d),
    #[error("partial merkle tree is malformed: {0}")]
    MalformedMerkleTree(&'static str),
    #[error("partial merkle tree root does not match the block header")]
    MerkleRootMismatch,
}
