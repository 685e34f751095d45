//! Deterministic utilities for reproducible splits
//!
//! A seeded LCG drives every shuffle, so the same seed always yields the same
//! train/test partition on every platform.

use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses Knuth's MMIX constants and returns the high bits only
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        Self {
            state: Wrapping(seed),
        }
    }

    /// Next value in range [0, 2^31); low LCG bits have short periods
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 >> 33
    }

    /// Random index in range [0, max)
    pub fn next_index(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as usize
    }

    /// Fisher-Yates shuffle in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(42);
        for _ in 0..100 {
            assert!(rng.next_index(10) < 10);
        }
        assert_eq!(rng.next_index(0), 0);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = LcgRng::new(7);
        let mut items: Vec<usize> = (0..50).collect();
        rng.shuffle(&mut items);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, sorted);
    }

    #[test]
    fn test_shuffle_seed_sensitivity() {
        let mut a: Vec<usize> = (0..20).collect();
        let mut b = a.clone();
        LcgRng::new(1).shuffle(&mut a);
        LcgRng::new(2).shuffle(&mut b);
        assert_ne!(a, b);
    }
}
