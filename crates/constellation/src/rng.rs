//! The single source of randomness for a simulation.
//!
//! Every random decision (spawn direction, sizes, scatter forces) goes through one of these, so
//! that a seeded simulation replays bit-for-bit.

use glam::Vec2;
use rand::{Rng as _, SeedableRng as _};

/// A seedable pseudo-random source.
#[derive(Debug, Clone)]
pub struct SimulationRng {
    /// The underlying generator
    inner: rand::rngs::StdRng,
}

impl SimulationRng {
    /// A reproducible source.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    /// A source seeded from the OS.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            inner: rand::rngs::StdRng::from_entropy(),
        }
    }

    /// Seeded if a seed is given, otherwise from entropy.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// A uniform sample from `[min, max)`. A degenerate or broken range just returns `min`, rather
    /// than panicking like `gen_range` would.
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return min;
        }
        self.inner.gen_range(min..max)
    }

    /// A uniform sample from `[-spread / 2, spread / 2)`.
    pub fn jitter(&mut self, spread: f32) -> f32 {
        let half = spread.abs() / 2.0;
        self.range(-half, half)
    }

    /// A uniformly random unit vector.
    pub fn direction(&mut self) -> Vec2 {
        Vec2::from_angle(self.range(0.0, std::f32::consts::TAU))
    }

    /// Pick a random item from a slice.
    pub fn pick<'items, T>(&mut self, items: &'items [T]) -> Option<&'items T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.inner.gen_range(0..items.len()))
    }
}
