//! A small non-cryptographic PRNG for output shuffling and peer selection
//! only (§9). Never use this for keys, nonces, or anything security-relevant
//! — signing reaches for `secp256k1`'s own RNG hooks for that, and so
//! should anything derived from this core.

use std::time::{SystemTime, UNIX_EPOCH};

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(seed: u64) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in seed.to_le_bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A deterministic, reproducible PRNG seeded by FNV-1a over `time ^ pid`.
pub struct BwRand(u64);

impl BwRand {
    /// Build a generator from an explicit seed, for reproducible tests.
    pub fn new(seed: u64) -> BwRand {
        let mut state = fnv1a(seed);
        if state == 0 {
            state = FNV_OFFSET_BASIS;
        }
        BwRand(state)
    }

    /// Build a generator seeded from the process clock and pid, the way
    /// the wallet's output shuffle and peer selection are seeded in practice.
    pub fn from_entropy() -> BwRand {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let pid = std::process::id() as u64;
        BwRand::new(nanos ^ pid)
    }

    /// xorshift64*: cheap, well-distributed enough for shuffling, and
    /// emphatically not cryptographically secure.
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// A value in `[0, upper)`. Returns 0 when `upper == 0`.
    pub fn gen_range(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() % upper as u64) as usize
    }

    /// A Fisher-Yates shuffle of `slice`, in place.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        if slice.len() < 2 {
            return;
        }
        for i in (1..slice.len()).rev() {
            let j = self.gen_range(i + 1);
            slice.swap(i, j);
        }
    }

    /// A biased pick favoring higher indices quadratically, used when the
    /// peer manager selects among known peers sorted by timestamp
    /// ascending so the bias lands on the most recently seen ones (§4.5).
    pub fn gen_range_quadratic_bias(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        let r = self.gen_range(upper * upper);
        ((r as f64).sqrt() as usize).min(upper - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_fixed_seed() {
        bw_test::init();
        let mut a = BwRand::new(42);
        let mut b = BwRand::new(42);
        let seq_a: Vec<u64> = (0..10).map(|_| a.next_u64()).collect();
        let seq_b: Vec<u64> = (0..10).map(|_| b.next_u64()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        bw_test::init();
        let mut rng = BwRand::new(7);
        let mut values: Vec<u32> = (0..20).collect();
        let original = values.clone();
        rng.shuffle(&mut values);
        let mut sorted = values.clone();
        sorted.sort();
        assert_eq!(sorted, original);
    }

    #[test]
    fn gen_range_is_in_bounds() {
        bw_test::init();
        let mut rng = BwRand::new(99);
        for _ in 0..1000 {
            assert!(rng.gen_range(5) < 5);
        }
    }
}
