use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("no reachable peers: the network appears unreachable")]
    Unreachable,
    #[error("publishing transaction timed out waiting for a relay peer")]
    PublishTimeout,
    #[error("peer violated protocol: {0}")]
    ProtocolViolation(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
