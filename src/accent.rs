//! Source of the decorative accent-bar fill fraction on highlight cards.
//! The value is presentation only and never feeds back into layout.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const MIN_FILL: f32 = 0.4;
pub const MAX_FILL: f32 = 0.8;

pub trait AccentSource {
    /// Filled fraction of the next accent bar, in `MIN_FILL..MAX_FILL`.
    fn next_fill(&mut self) -> f32;
}

pub struct RandomAccent {
    rng: StdRng,
}

impl RandomAccent {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl AccentSource for RandomAccent {
    fn next_fill(&mut self) -> f32 {
        self.rng.random_range(MIN_FILL..MAX_FILL)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedAccent(pub f32);

impl AccentSource for FixedAccent {
    fn next_fill(&mut self) -> f32 {
        self.0.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_source_is_reproducible_and_in_range() {
        let mut a = RandomAccent::seeded(7);
        let mut b = RandomAccent::seeded(7);
        for _ in 0..32 {
            let fill = a.next_fill();
            assert_eq!(fill, b.next_fill());
            assert!((MIN_FILL..MAX_FILL).contains(&fill));
        }
    }

    #[test]
    fn fixed_source_is_clamped() {
        assert_eq!(FixedAccent(0.5).next_fill(), 0.5);
        assert_eq!(FixedAccent(3.0).next_fill(), 1.0);
    }
}
