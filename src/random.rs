//! Seedable randomness for navigation choices and think-time.

use std::time::Duration;

use rand::distr::uniform::SampleUniform;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::error::EmptyCandidateSet;

/// Random choices for one iteration. Not shared between iterations.
#[derive(Debug, Clone)]
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    /// Deterministic selector; the same seed replays the same choices
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Uniformly pick one candidate.
    pub fn pick_one<'a, T>(&mut self, candidates: &'a [T]) -> Result<&'a T, EmptyCandidateSet> {
        candidates.choose(&mut self.rng).ok_or(EmptyCandidateSet)
    }

    /// Uniform value in `[min, max]`, both ends inclusive. Swapped bounds
    /// are tolerated.
    pub fn pick_range<T>(&mut self, min: T, max: T) -> T
    where
        T: SampleUniform + PartialOrd + Copy,
    {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        self.rng.random_range(low..=high)
    }

    /// Uniform duration in `[min, max]` at millisecond resolution.
    pub fn pick_duration(&mut self, min: Duration, max: Duration) -> Duration {
        let min = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.pick_range(min, max))
    }

    /// Fair coin flip
    pub fn chance(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    /// Independent generator derived from this one, for collaborators that
    /// need their own stream (e.g. synthetic checkout data).
    pub fn fork(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.rng.random())
    }
}

/// Seed for one iteration, derived from a run-wide base seed, the Goose
/// user index and the iteration number (splitmix64 finalizer).
pub fn iteration_seed(base: u64, user: usize, iteration: u64) -> u64 {
    let mut z = base
        ^ (user as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ iteration.wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
