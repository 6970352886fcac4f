use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use crypto::keccak256;

pub const BLOOM_BYTES: usize = 256;

/// 2048 bit log filter, three bits per indexed item.
#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bloom(#[serde(with = "BigArray")] [u8; BLOOM_BYTES]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0; BLOOM_BYTES])
    }
}

impl Debug for Bloom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bloom({})", hex::encode(self.0))
    }
}

impl Bloom {
    pub fn from_item<B: AsRef<[u8]>>(item: B) -> Self {
        let hash = keccak256(item);
        let hash = hash.as_bytes();
        let mut bloom = Self::default();
        for i in [0_usize, 2, 4] {
            let bit = ((hash[i] as usize & 0x07) << 8) | hash[i + 1] as usize;
            bloom.0[BLOOM_BYTES - 1 - bit / 8] |= 1 << (bit % 8);
        }
        bloom
    }

    pub fn accrue(&mut self, other: &Bloom) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= *b;
        }
    }

    pub fn contains(&self, other: &Bloom) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| a & b == *b)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accrue_and_contains() {
        let a = Bloom::from_item(b"address");
        let b = Bloom::from_item(b"topic");
        let mut both = Bloom::default();
        assert!(both.is_empty());
        both.accrue(&a);
        both.accrue(&b);
        assert!(both.contains(&a));
        assert!(both.contains(&b));
        assert!(!a.contains(&both) || a == both);
    }
}
