// Deterministic pseudo-random numbers for bot navigation.
//
// xoshiro256++ (Blackman & Vigna, 2019) seeded through SplitMix64. The
// navigation layer draws from it when an idle bot picks a roam goal, and the
// test/benchmark harnesses use it to build reproducible synthetic graphs.
//
// Bots in a match must make the same choices on every replay of a demo, so
// nothing here touches OS entropy or the standard library's hasher seeds.
// Each consumer owns its own `NavRng`; there is no global generator.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ generator state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavRng {
    s: [u64; 4],
}

impl NavRng {
    /// Seed a generator. Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform `f32` in [0, 1) built from the top 24 bits.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform `f32` in `[low, high)`. Returns `low` when the range is empty.
    pub fn range_f32(&mut self, low: f32, high: f32) -> f32 {
        if high <= low {
            return low;
        }
        low + self.next_f32() * (high - low)
    }

    /// Uniform `usize` in `[low, high)` without modulo bias.
    ///
    /// Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        assert!(low < high, "range_usize: low must be less than high");
        let range = (high - low) as u64;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1)) as usize;
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range) as usize;
            }
        }
    }

    /// Pick one element uniformly. `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let i = self.range_usize(0, items.len());
        items.get(i)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = NavRng::new(7);
        let mut b = NavRng::new(7);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = NavRng::new(7);
        let mut b = NavRng::new(8);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn range_usize_stays_in_bounds() {
        let mut rng = NavRng::new(31);
        for _ in 0..10_000 {
            let v = rng.range_usize(3, 17);
            assert!((3..17).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn range_f32_handles_empty_range() {
        let mut rng = NavRng::new(1);
        assert_eq!(rng.range_f32(5.0, 5.0), 5.0);
        for _ in 0..1000 {
            let v = rng.range_f32(-64.0, 64.0);
            assert!((-64.0..64.0).contains(&v));
        }
    }

    #[test]
    fn choose_visits_every_element() {
        let mut rng = NavRng::new(99);
        let items = [10, 20, 30, 40];
        let mut seen = [false; 4];
        for _ in 0..500 {
            let v = *rng.choose(&items).unwrap();
            seen[items.iter().position(|&x| x == v).unwrap()] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert!(rng.choose::<u8>(&[]).is_none());
    }

    #[test]
    fn chance_extremes() {
        let mut rng = NavRng::new(5);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn state_survives_json() {
        let mut rng = NavRng::new(42);
        for _ in 0..50 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: NavRng = serde_json::from_str(&json).unwrap();
        for _ in 0..50 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
