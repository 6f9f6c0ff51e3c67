//! Randomness for the displayed transfer rate.
//!
//! The rate is cosmetic, so it sits behind a trait that tests can pin.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait Jitter: Send {
    /// A sample in `[-amplitude, amplitude)`. Zero amplitude yields zero.
    fn sample(&mut self, amplitude: f64) -> f64;
}

/// Thread-local RNG, used by the daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn sample(&mut self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        rand::thread_rng().gen_range(-amplitude..amplitude)
    }
}

/// Reproducible sequence from a fixed seed.
pub struct SeededJitter {
    rng: StdRng,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Jitter for SeededJitter {
    fn sample(&mut self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-amplitude..amplitude)
    }
}

/// Always returns the same offset, clamped into the requested range.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn sample(&mut self, amplitude: f64) -> f64 {
        self.0.clamp(-amplitude.abs(), amplitude.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_jitter_bounds_are_respected() {
        let mut jitter = RandomJitter;
        for _ in 0..256 {
            let v = jitter.sample(25.0);
            assert!((-25.0..25.0).contains(&v), "{v} out of range");
        }
    }

    #[test]
    fn seeded_jitter_is_reproducible() {
        let mut a = SeededJitter::new(7);
        let mut b = SeededJitter::new(7);
        for _ in 0..16 {
            assert_eq!(a.sample(25.0), b.sample(25.0));
        }
    }

    #[test]
    fn zero_amplitude_is_silent() {
        assert_eq!(RandomJitter.sample(0.0), 0.0);
        assert_eq!(SeededJitter::new(1).sample(0.0), 0.0);
        assert_eq!(FixedJitter(3.0).sample(0.0), 0.0);
    }

    #[test]
    fn fixed_jitter_clamps() {
        assert_eq!(FixedJitter(40.0).sample(25.0), 25.0);
        assert_eq!(FixedJitter(-10.0).sample(25.0), -10.0);
    }
}
