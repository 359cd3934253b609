//! Peer selection for the connect loop (§4.5): prefer more recently seen
//! addresses, but not deterministically so an adversary can't predict
//! who we'll dial next just by flooding `addr` messages.

use bw_chain::constants::MAX_CONNECT_FAILURES;
use bw_chain::BwRand;

use crate::state::KnownPeer;

/// Candidates eligible to dial right now: under the failure cap and not
/// already connected (the caller filters out already-connected hosts
/// before calling this).
pub fn eligible<'a>(known: impl Iterator<Item = &'a KnownPeer>) -> Vec<&'a KnownPeer> {
    known.filter(|peer| peer.connect_failure_count < MAX_CONNECT_FAILURES).collect()
}

/// Pick one candidate to dial next. `BwRand::gen_range_quadratic_bias`
/// favors higher indices, so candidates are sorted oldest-timestamp-first
/// and the bias lands disproportionately on the most recently seen
/// addresses at the end of that order.
pub fn pick<'a>(mut candidates: Vec<&'a KnownPeer>, rng: &mut BwRand) -> Option<&'a KnownPeer> {
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let index = rng.gen_range_quadratic_bias(candidates.len());
    Some(candidates[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn peer(timestamp: u32, failures: u32) -> KnownPeer {
        KnownPeer {
            host: format!("peer-{}", timestamp),
            port: 8333,
            services: 0,
            timestamp,
            connect_failure_count: failures,
            last_attempt: None,
        }
    }

    #[test]
    fn excludes_peers_past_the_failure_cap() {
        bw_test::init();
        let peers = vec![peer(1, 0), peer(2, MAX_CONNECT_FAILURES)];
        let remaining = eligible(peers.iter());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp, 1);
    }

    #[test]
    fn picks_favor_recently_seen_peers_over_many_trials() {
        bw_test::init();
        let peers = vec![peer(1, 0), peer(2, 0), peer(3, 0), peer(4, 0), peer(5, 0)];
        let mut rng = BwRand::new(123);
        let mut picked_newest = 0;
        for _ in 0..200 {
            let candidates = eligible(peers.iter());
            if let Some(picked) = pick(candidates, &mut rng) {
                if picked.timestamp == 5 {
                    picked_newest += 1;
                }
            }
        }
        // The bias favors the high-index end of the ascending-timestamp
        // sort, so the newest peer should be picked disproportionately
        // often relative to a uniform 1/5 share.
        assert!(picked_newest > 40);
    }
}
