//! Normative constants governing transaction limits, fee policy, peer
//! connection limits, and bloom filter defaults.

/// Current transaction format version this core produces.
pub const TX_VERSION: i32 = 1;
pub const TX_LOCKTIME: u32 = 0;

pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_NONE: u8 = 0x02;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;
pub const SIGHASH_FORKID: u8 = 0x40;

pub const TX_FEE_PER_KB: u64 = 1000;
pub const TX_OUTPUT_SIZE: usize = 34;
pub const TX_INPUT_SIZE: usize = 148;

/// `TX_FEE_PER_KB * 3 * (TX_OUTPUT_SIZE + TX_INPUT_SIZE) / 1000`
pub const TX_MIN_OUTPUT_AMOUNT: u64 =
    TX_FEE_PER_KB * 3 * (TX_OUTPUT_SIZE as u64 + TX_INPUT_SIZE as u64) / 1000;

pub const TX_MAX_SIZE: usize = 100_000;
pub const TX_FREE_MAX_SIZE: usize = 1000;
pub const TX_FREE_MIN_PRIORITY: u64 = 57_600_000;

pub const TX_UNCONFIRMED: i32 = i32::MAX;
pub const TX_MAX_LOCK_HEIGHT: u32 = 500_000_000;

pub const TXIN_SEQUENCE: u32 = u32::MAX;
pub const SATOSHIS: u64 = 100_000_000;
pub const MAX_MONEY: u64 = 84_000_000 * SATOSHIS;

pub const PEER_MAX_CONNECTIONS: usize = 3;
pub const MAX_CONNECT_FAILURES: u32 = 20;
pub const PROTOCOL_TIMEOUT_SECS: u64 = 20;

/// A peer can serve the full block chain on request.
pub const NODE_NETWORK: u64 = 1 << 0;
/// A peer honors `filterload`/`filteradd`/`filterclear` (BIP37).
pub const NODE_BLOOM: u64 = 1 << 2;

/// Protocol version at and above which a peer is expected to have adopted
/// BIP37 bloom filtering; below it, `NODE_BLOOM` isn't meaningful and a peer
/// shouldn't be rejected for lacking it.
pub const PEER_VERSION_BLOOM_MIN: u32 = 70011;

/// A connected peer whose advertised `lastBlock` trails ours by at least
/// this many blocks isn't useful as a sync or relay peer (§4.5).
pub const PEER_LAST_BLOCK_LAG_LIMIT: i32 = 10;

/// Width of the window, centered on a wallet's `earliestKeyTime`, within
/// which a newly elected download peer is asked for full blocks
/// (`getblocks`) rather than headers alone (`getheaders`) (§4.5).
pub const EARLIEST_KEY_TIME_WINDOW_SECS: u32 = 7 * 24 * 60 * 60;

/// Minimum relay fee rate below which the reference implementation's
/// `minOutputAmount` scaling bottoms out.
pub const MIN_FEE_PER_KB: u64 = TX_FEE_PER_KB;

/// `BLOOM_UPDATE_ALL` flag for filterload, from BIP37.
pub const BLOOM_UPDATE_ALL: u8 = 1;

pub const BLOOM_DEFAULT_FALSEPOSITIVE_RATE: f64 = 0.0005;
pub const BLOOM_REDUCED_FALSEPOSITIVE_RATE: f64 = 0.00005;

pub const SEQUENCE_GAP_LIMIT_EXTERNAL: usize = 10;
pub const SEQUENCE_GAP_LIMIT_INTERNAL: usize = 5;
