//! Deterministic sequence generator behind the position schedule.
//!
//! The generator is part of the wire format: a mark can only be read back by
//! a decoder that reproduces the exact same stream. It is therefore pinned to
//!
//! - a SHA-256 derived 32-byte seed (see [`integrity::schedule_seed`]),
//! - the ChaCha20 keystream, consumed one `u32` word at a time,
//! - an explicit widening-multiply bounded draw.
//!
//! `rand::Rng::gen_range` is deliberately not used: its range mapping is an
//! implementation detail of `rand` and may change between releases.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::integrity;

pub struct SequenceGenerator {
    rng: ChaCha20Rng,
}

impl SequenceGenerator {
    pub fn new(seed: &str) -> Self {
        Self {
            rng: ChaCha20Rng::from_seed(integrity::schedule_seed(seed)),
        }
    }

    /// Next integer in `[0, bound)`, without modulo bias.
    ///
    /// A zero bound yields 0 and consumes nothing.
    pub fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        let mut m = u64::from(self.rng.next_u32()) * u64::from(bound);
        let mut low = m as u32;
        if low < bound {
            let threshold = bound.wrapping_neg() % bound;
            while low < threshold {
                m = u64::from(self.rng.next_u32()) * u64::from(bound);
                low = m as u32;
            }
        }
        (m >> 32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(seed: &str, bounds: &[u32]) -> Vec<u32> {
        let mut generator = SequenceGenerator::new(seed);
        bounds.iter().map(|&b| generator.next_below(b)).collect()
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let bounds: Vec<u32> = (1..500).collect();
        assert_eq!(draw("secret", &bounds), draw("secret", &bounds));
    }

    #[test]
    fn test_different_seed_differs() {
        let bounds = vec![1_000_000u32; 64];
        assert_ne!(draw("secret-a", &bounds), draw("secret-b", &bounds));
    }

    #[test]
    fn test_values_within_bound() {
        let mut generator = SequenceGenerator::new("bounds");
        for bound in [1u32, 2, 3, 7, 10, 409, 65_536, u32::MAX] {
            for _ in 0..200 {
                assert!(generator.next_below(bound) < bound);
            }
        }
    }

    #[test]
    fn test_bound_one_always_zero() {
        let mut generator = SequenceGenerator::new("one");
        assert!((0..100).all(|_| generator.next_below(1) == 0));
    }

    #[test]
    fn test_zero_bound_consumes_nothing() {
        let mut a = SequenceGenerator::new("zero");
        let mut b = SequenceGenerator::new("zero");
        assert_eq!(a.next_below(0), 0);
        assert_eq!(a.next_below(1000), b.next_below(1000));
    }

    #[test]
    fn test_roughly_uniform() {
        let mut generator = SequenceGenerator::new("uniform");
        let mut counts = [0u32; 4];
        for _ in 0..40_000 {
            counts[generator.next_below(4) as usize] += 1;
        }
        for c in counts {
            assert!((9_000..11_000).contains(&c), "skewed bucket: {}", c);
        }
    }
}
