//! Daemon configuration: network selection, the peer addresses to seed the
//! connect loop with, and the handful of tunables the wallet/manager expose.
//!
//! Loaded from a TOML file the same way `zebrad` reads its own config
//! (`toml` + `serde`), with [`dirs`] picking a sensible per-platform default
//! location when the caller doesn't name one explicitly.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bw_chain::constants::{BLOOM_DEFAULT_FALSEPOSITIVE_RATE, TX_FEE_PER_KB};
use bw_chain::Network;

use crate::error::DaemonError;

/// Runtime configuration for `bwd`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub network: Network,
    /// Where headers, the wallet's tx log, and the persisted seed live.
    pub data_dir: PathBuf,
    /// `host:port` pairs to seed the connect loop with before any `addr`
    /// relay has taught it about the rest of the network.
    pub peers: Vec<String>,
    pub fee_per_kb: u64,
    pub bloom_false_positive_rate: f64,
    /// `RUST_LOG`-style filter directive for `tracing-subscriber`.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network: Network::Mainnet,
            data_dir: default_data_dir(),
            peers: Vec::new(),
            fee_per_kb: TX_FEE_PER_KB,
            bloom_false_positive_rate: BLOOM_DEFAULT_FALSEPOSITIVE_RATE,
            log_filter: "bwd=info,bw_peer_manager=info,bw_state=info".into(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("bwd")
}

/// Fluent builder for [`Config`], for callers (tests, `main`) that only
/// want to override a couple of fields.
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder { inner: Config::default() }
    }

    pub fn network(mut self, network: Network) -> Self {
        self.inner.network = network;
        self
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.inner.data_dir = dir.into();
        self
    }

    pub fn peers(mut self, peers: Vec<String>) -> Self {
        self.inner.peers = peers;
        self
    }

    pub fn fee_per_kb(mut self, fee_per_kb: u64) -> Self {
        self.inner.fee_per_kb = fee_per_kb;
        self
    }

    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Config {
    /// Load `path` if it exists, otherwise return the default configuration
    /// (the caller decides whether to persist it back with `save`).
    pub fn load(path: &Path) -> Result<Config, DaemonError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(err) => Err(DaemonError::ReadConfig { path: path.display().to_string(), source: err }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), DaemonError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| DaemonError::WriteConfig { path: path.display().to_string(), source })?;
        }
        let rendered = toml::to_string_pretty(self).expect("Config always serializes");
        fs::write(path, rendered)
            .map_err(|source| DaemonError::WriteConfig { path: path.display().to_string(), source })
    }

    pub fn seed_path(&self) -> PathBuf {
        self.data_dir.join("seed.key")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .network(Network::Testnet)
            .peers(vec!["10.0.0.1:18333".into()])
            .fee_per_kb(2000)
            .finish();
        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.peers, vec!["10.0.0.1:18333".to_string()]);
        assert_eq!(cfg.fee_per_kb, 2000);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = ConfigBuilder::new().peers(vec!["example.invalid:8333".into()]).finish();
        let rendered = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn loading_a_missing_file_falls_back_to_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/bwd/does-not-exist.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
