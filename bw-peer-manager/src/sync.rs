//! Sync termination (§4.5): deciding when the chain is caught up so the
//! host can stop issuing `getheaders`/`getblocks` and tell delegates sync
//! has finished.

use std::time::{Duration, Instant};

/// Tracks the best height announced by the sync peer (via its `version`
/// message's `start_height`, kept current as new blocks arrive) against
/// our local tip, plus how long it's been since the last header arrived.
pub struct SyncTracker {
    peer_height: i32,
    local_height: i32,
    last_progress: Instant,
}

impl SyncTracker {
    pub fn new(peer_height: i32, local_height: i32) -> SyncTracker {
        SyncTracker { peer_height, local_height, last_progress: Instant::now() }
    }

    pub fn record_peer_height(&mut self, height: i32) {
        if height > self.peer_height {
            self.peer_height = height;
        }
    }

    pub fn record_local_progress(&mut self, height: i32) {
        self.local_height = height;
        self.last_progress = Instant::now();
    }

    /// Sync is considered complete once the local tip has caught up to
    /// the peer's announced height, or once it's been quiet for `quiet`
    /// without any new headers (the peer may simply have nothing left to
    /// send, e.g. after a header-only sync that's waiting on filtered
    /// blocks instead).
    pub fn is_complete(&self, quiet: Duration) -> bool {
        self.local_height >= self.peer_height || self.last_progress.elapsed() >= quiet
    }

    pub fn blocks_behind(&self) -> i32 {
        (self.peer_height - self.local_height).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_once_local_height_catches_up() {
        bw_test::init();
        let mut tracker = SyncTracker::new(100, 0);
        assert!(!tracker.is_complete(Duration::from_secs(30)));
        tracker.record_local_progress(100);
        assert!(tracker.is_complete(Duration::from_secs(30)));
    }

    #[test]
    fn blocks_behind_never_goes_negative() {
        bw_test::init();
        let mut tracker = SyncTracker::new(50, 0);
        tracker.record_local_progress(80);
        assert_eq!(tracker.blocks_behind(), 0);
    }
}
