//! Shared test setup, used the same way across every crate in this
//! workspace: call `bw_test::init()` at the top of a test to get readable
//! `tracing` output when a test fails and `RUST_LOG` is set.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a `tracing` subscriber reading its filter from `RUST_LOG`
/// (`bw=debug` etc.), defaulting to `warn` when unset. Safe to call from
/// every test; only the first call has any effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init().ok();
    });
}
