//! `bwd`: a reference host for the wallet engine, block store, and peer
//! manager — wires them together behind a small CLI the way `zebrad` wires
//! its own crates behind `abscissa_core`. Dialing and running a concrete
//! peer session (the actual TCP framing and handshake) is left to whatever
//! embeds this core, exactly as `bw_network::peer::Peer` documents; this
//! binary exercises everything up to that boundary; peers are only shown as
//! connect-loop targets, never actually dialed.

mod config;
mod delegate;
mod error;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tracing::info;

use bw_chain::hash::Sha256d;
use bw_chain::script::Script;
use bw_chain::transparent::Address;
use bw_chain::{BlockHeader, Network};
use bw_peer_manager::PeerManager;
use bw_state::{BitcoinParams, BlockStore, ChainParameters};
use bw_wallet::Wallet;

use config::Config;
use delegate::WalletHost;

#[derive(Parser)]
#[command(name = "bwd")]
#[command(about = "SPV wallet daemon", version)]
struct Cli {
    /// Path to the TOML config file; defaults to `<data dir>/bwd.toml`.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the connect loop and keep the wallet synced.
    Run,
    /// Hand out a fresh receiving address.
    Address,
    /// Print the current confirmed balance, in satoshis.
    Balance,
    /// Build, sign, and publish a payment.
    Send {
        address: String,
        amount_satoshis: u64,
    },
}

fn config_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.config.clone().unwrap_or_else(|| config.data_dir.join("bwd.toml"))
}

fn init_tracing(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The real Bitcoin mainnet genesis header, used to seed the block store
/// when no prior header chain has been persisted (§4.4).
fn genesis_header(network: Network) -> BlockHeader {
    match network {
        Network::Mainnet => BlockHeader::new(
            1,
            Sha256d::default(),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33".parse().unwrap(),
            1_231_006_505,
            0x1d00ffff,
            2_083_236_893,
        ),
        Network::Testnet => BlockHeader::new(
            1,
            Sha256d::default(),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33".parse().unwrap(),
            1_296_688_602,
            0x1d00ffff,
            414_098_458,
        ),
    }
}

/// `bw_chain::BwRand` is explicitly non-cryptographic (peer selection and
/// output shuffling only); the wallet's master seed needs real entropy, so
/// this reaches for `rand`'s OS-backed generator instead, same as the
/// teacher pulls in `rand` for `zebrad`.
fn load_or_create_seed(config: &Config) -> Result<Vec<u8>> {
    use rand::RngCore;

    let path = config.seed_path();
    if let Ok(existing) = std::fs::read(&path) {
        return Ok(existing);
    }
    let mut seed = vec![0u8; 32];
    let mut rng = rand::rngs::OsRng;
    rng.fill_bytes(&mut seed);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &seed)?;
    info!(path = %path.display(), "generated a new wallet seed");
    Ok(seed)
}

fn build_host(config: &Config) -> Result<(Arc<WalletHost>, Arc<PeerManager>)> {
    let seed = load_or_create_seed(config)?;
    let wallet = Wallet::new(&seed, config.network, config.fee_per_kb)?;
    let store = BlockStore::new(BitcoinParams::mainnet(), genesis_header(config.network));
    let manager = PeerManager::new();
    let host = WalletHost::new(wallet, store, manager.clone(), config);
    manager.add_delegate(host.clone());
    host.rebuild_filter();
    Ok((host, manager))
}

fn run(config: &Config) -> Result<()> {
    let (_host, manager) = build_host(config)?;
    let params = BitcoinParams::mainnet();

    for entry in &config.peers {
        if let Some((ip, port)) = entry.rsplit_once(':') {
            let port: u16 = port.parse().unwrap_or_else(|_| params.standard_port());
            manager.learn_peer(bw_network::PeerAddress {
                host: ip.to_string(),
                port,
                services: 0,
                timestamp: 0,
            });
        }
    }

    info!(peers = config.peers.len(), "connect loop starting");
    loop {
        if manager.wants_more_connections() {
            match manager.next_connect_target() {
                Some((host, port)) => {
                    // Dialing the actual TCP connection and running its
                    // message-pumping loop is left to a concrete `Peer`
                    // the embedder supplies; this core only decides who
                    // to dial next.
                    info!(%host, port, "would dial peer");
                }
                None => info!("no eligible peers to dial"),
            }
        }
        manager.resend_unrelayed();
        std::thread::sleep(Duration::from_secs(30));
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = Config::load(
        &cli.config.clone().unwrap_or_else(|| Config::default().data_dir.join("bwd.toml")),
    )?;
    init_tracing(&config.log_filter);
    config.save(&config_path(&cli, &config))?;

    match cli.command {
        Command::Run => run(&config),
        Command::Address => {
            let (host, _manager) = build_host(&config)?;
            println!("{}", host.new_address()?);
            Ok(())
        }
        Command::Balance => {
            let (host, _manager) = build_host(&config)?;
            println!("{}", host.balance());
            Ok(())
        }
        Command::Send { address, amount_satoshis } => {
            let (host, _manager) = build_host(&config)?;
            let parsed: Address =
                Address::from_str(&address).map_err(|_| eyre!("not a valid address: {address}"))?;
            let script = Script::new_p2pkh(parsed.hash());
            let tx = host.send(vec![(script, amount_satoshis)])?;
            println!("{}", tx.tx_hash().expect("just built and signed"));
            Ok(())
        }
    }
}
