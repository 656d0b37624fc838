/// Injectable randomness.
///
/// Every random decision the engine makes (Bernoulli trials, effect
/// durations, shuffle seeds) goes through `RandomSource`, so tests can
/// script the exact draws. The seeded shuffle algorithm itself does NOT
/// use this source; see `shuffle.rs`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub trait RandomSource {
    /// Uniform float in `[0, 1)`.
    fn next_float(&mut self) -> f64;

    /// Uniform integer in `min..=max`. Callers guarantee `min <= max`.
    fn next_int(&mut self, min: u32, max: u32) -> u32;

    /// Fresh seed for a one-off permutation.
    fn next_seed(&mut self) -> u64;
}

/// `RandomSource` backed by any `rand` generator.
#[derive(Clone, Debug)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        RngSource { rng }
    }
}

impl RngSource<StdRng> {
    /// Entropy-seeded source for real sessions.
    pub fn from_entropy() -> Self {
        RngSource { rng: StdRng::from_os_rng() }
    }
}

impl RngSource<ChaCha8Rng> {
    /// Reproducible source (replays, tests).
    pub fn seeded(seed: u64) -> Self {
        RngSource { rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_float(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn next_int(&mut self, min: u32, max: u32) -> u32 {
        if min >= max { return min; }
        self.rng.random_range(min..=max)
    }

    fn next_seed(&mut self) -> u64 {
        self.rng.random::<u64>()
    }
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn next_float(&mut self) -> f64 { (**self).next_float() }
    fn next_int(&mut self, min: u32, max: u32) -> u32 { (**self).next_int(min, max) }
    fn next_seed(&mut self) -> u64 { (**self).next_seed() }
}

impl<T: RandomSource + ?Sized> RandomSource for Box<T> {
    fn next_float(&mut self) -> f64 { (**self).next_float() }
    fn next_int(&mut self, min: u32, max: u32) -> u32 { (**self).next_int(min, max) }
    fn next_seed(&mut self) -> u64 { (**self).next_seed() }
}

/// Test double: replays scripted draws in order.
///
/// Floats, ints and seeds are kept in separate queues so a test can say
/// "hide fires, shuffle doesn't, duration 2" without caring about
/// interleaving. An exhausted queue panics, which flags an unexpected draw.
#[cfg(test)]
#[derive(Default, Debug)]
pub struct ScriptedRandom {
    pub floats: std::collections::VecDeque<f64>,
    pub ints: std::collections::VecDeque<u32>,
    pub seeds: std::collections::VecDeque<u64>,
    pub float_draws: usize,
}

#[cfg(test)]
impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn floats(mut self, values: &[f64]) -> Self {
        self.floats.extend(values.iter().copied());
        self
    }

    pub fn ints(mut self, values: &[u32]) -> Self {
        self.ints.extend(values.iter().copied());
        self
    }

    pub fn seeds(mut self, values: &[u64]) -> Self {
        self.seeds.extend(values.iter().copied());
        self
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRandom {
    fn next_float(&mut self) -> f64 {
        self.float_draws += 1;
        self.floats.pop_front().expect("unexpected float draw")
    }

    fn next_int(&mut self, min: u32, max: u32) -> u32 {
        let v = self.ints.pop_front().expect("unexpected int draw");
        assert!((min..=max).contains(&v), "scripted int {v} outside {min}..={max}");
        v
    }

    fn next_seed(&mut self) -> u64 {
        self.seeds.pop_front().unwrap_or(0)
    }
}
