//! Randomness consulted by the election loop: whether a leader deliberately stalls before renewing,
//! and how long an actor waits between cycles. Both sit behind traits so tests can script them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::Duration;

/// Decides, once per leader cycle, whether to simulate a slow or partitioned leader by stalling
/// before the renewal is sent.
pub trait FaultModel {
    fn should_stall(&mut self) -> bool;
}

/// Source of the factor `U ∈ [0.5, 1.5)` scaling the pause between cycles.
pub trait JitterSource {
    fn sample(&mut self) -> f64;
}

/// The pause between cycles: a quarter of the lease scaled by `u`, so always within
/// `[ttl / 8, 3 * ttl / 8]`. A NaN factor counts as 1.
pub fn jitter_delay(lease_ttl: Duration, u: f64) -> Duration {
    let u = if u.is_nan() { 1.0 } else { u.clamp(0.5, 1.5) };
    (lease_ttl / 4).mul_f64(u)
}

pub struct NeverStall;

impl FaultModel for NeverStall {
    fn should_stall(&mut self) -> bool {
        false
    }
}

/// Stalls according to a fixed script, then never again.
pub struct ScriptedStall(VecDeque<bool>);

impl ScriptedStall {
    pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
        Self(script.into_iter().collect())
    }
}

impl FaultModel for ScriptedStall {
    fn should_stall(&mut self) -> bool {
        self.0.pop_front().unwrap_or(false)
    }
}

/// Stalls with a fixed probability per leader cycle.
pub struct RandomStall {
    probability: f64,
    rng: StdRng,
}

impl RandomStall {
    /// A quarter of leader cycles stall.
    pub const DEFAULT_PROBABILITY: f64 = 0.25;

    /// `probability` is clamped to `[0, 1]`; NaN never stalls.
    pub fn new(probability: f64, rng: StdRng) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability, rng }
    }
}

impl FaultModel for RandomStall {
    fn should_stall(&mut self) -> bool {
        self.rng.random_bool(self.probability)
    }
}

/// Uniform jitter from a seedable generator.
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(rng: StdRng) -> Self {
        Self(rng)
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl JitterSource for SeededRandom {
    fn sample(&mut self) -> f64 {
        self.0.random_range(0.5..1.5)
    }
}

/// Always the same factor.
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&mut self) -> f64 {
        self.0
    }
}

/// A generator for one actor: derived from `seed` when given, so a run can be replayed,
/// otherwise from the operating system.
pub fn actor_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ stream),
        None => StdRng::from_os_rng(),
    }
}
