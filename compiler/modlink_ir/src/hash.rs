//! Content fingerprints.
//!
//! Fast, seedless hashing (`FxHasher`) so fingerprints are stable across
//! build sessions and can be stored in the persisted link cache.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

/// A content hash of some linker-visible data.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(u64);

impl ContentHash {
    /// Create a new content hash from a u64 value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Hash any `Hash` value.
    #[must_use]
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = FxHasher::default();
        value.hash(&mut hasher);
        ContentHash(hasher.finish())
    }

    /// Format as a hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:016x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(ContentHash::of("Data.Set"), ContentHash::of("Data.Set"));
        assert_ne!(ContentHash::of("Data.Set"), ContentHash::of("Data.Map"));
    }

    #[test]
    fn test_hex_is_fixed_width() {
        assert_eq!(ContentHash::new(0xab).to_hex(), "00000000000000ab");
        assert_eq!(ContentHash::new(0xab).to_string(), "00000000000000ab");
    }
}
