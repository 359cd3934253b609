//! A `Cached<T>` is an option that is never itself serialized onto the wire;
//! it lets a type carry a lazily (re)computed field — transaction identity,
//! in this core's case — without that field taking part in equality or
//! round-trip comparisons beyond "both populated and equal".

use serde::{Deserialize, Serialize};

use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

#[derive(Clone, Copy, Eq, Serialize, Deserialize)]
pub struct Cached<T: Clone + Copy>(Option<T>);

impl<T: Clone + Copy> Cached<T> {
    pub fn new() -> Cached<T> {
        Cached(None)
    }
    pub fn from(val: T) -> Cached<T> {
        Cached(Some(val))
    }
    pub fn value(&self) -> Option<T> {
        self.0
    }
    pub fn mut_value(&mut self) -> &mut Option<T> {
        &mut self.0
    }
    pub fn has_value(&self) -> bool {
        self.0.is_some()
    }
}

impl<T: Clone + Copy> Default for Cached<T> {
    fn default() -> Self {
        Cached::new()
    }
}

/// Two caches compare equal unless both are populated and disagree — so a
/// freshly-parsed value (always populated) can be compared against a
/// hand-built one (often left empty) in tests.
impl<T: PartialEq + Copy> PartialEq for Cached<T> {
    fn eq(&self, other: &Self) -> bool {
        match self.0 {
            None => true,
            Some(val) => match other.0 {
                Some(rhs) => val == rhs,
                None => true,
            },
        }
    }
}

impl<T: Clone + Copy + std::fmt::Debug> std::fmt::Debug for Cached<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: Clone + Copy> BitcoinSerialize for Cached<T> {
    fn bitcoin_serialize<W: std::io::Write>(&self, _: W) -> Result<(), std::io::Error> {
        Ok(())
    }
}

impl<T: Clone + Copy> BitcoinDeserialize for Cached<T> {
    fn bitcoin_deserialize<R: std::io::Read>(_: R) -> Result<Self, SerializationError> {
        Ok(Cached(None))
    }
}
