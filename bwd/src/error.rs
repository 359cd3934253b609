//! Top-level error kinds the daemon surfaces at its CLI boundary. Lower
//! layers keep their own specific error types (`WalletError`, `StateError`,
//! `ManagerError`); this just gives `main` one enum to match on before
//! handing anything unexpected off to `color_eyre`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("reading config at {path}: {source}")]
    ReadConfig { path: String, source: std::io::Error },

    #[error("parsing config: {0}")]
    ParseConfig(#[from] toml::de::Error),

    #[error("writing config at {path}: {source}")]
    WriteConfig { path: String, source: std::io::Error },

    #[error("could not determine a data directory for this platform")]
    NoDataDir,

    #[error(transparent)]
    Wallet(#[from] bw_wallet::WalletError),

    #[error(transparent)]
    State(#[from] bw_state::StateError),

    #[error(transparent)]
    Manager(#[from] bw_peer_manager::ManagerError),

    #[error("no address in {0:?} is recognized by this wallet")]
    UnknownAddress(String),
}
