//! Random Source Adapters

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ports::RandomSource;

// ============================================================================
// StdRandomSource - Production randomness
// ============================================================================

/// Random source backed by `rand`'s `StdRng`.
///
/// # Example
///
/// ```rust
/// use qn_network_core::adapters::StdRandomSource;
/// use qn_network_core::ports::RandomSource;
///
/// let rng = StdRandomSource::seeded(7);
/// let draw = rng.next_f64();
/// assert!((0.0..1.0).contains(&draw));
/// ```
#[derive(Debug)]
pub struct StdRandomSource {
    rng: Mutex<StdRng>,
}

impl StdRandomSource {
    /// Seed from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible source for simulations.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for StdRandomSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandomSource {
    fn next_f64(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}

// ============================================================================
// ScriptedRandomSource - Deterministic testing
// ============================================================================

/// Cycles through a fixed list of draws.
///
/// Values are clamped into `[0, 1)`. An empty script always yields `0.0`.
///
/// ```rust
/// use qn_network_core::adapters::ScriptedRandomSource;
/// use qn_network_core::ports::RandomSource;
///
/// let rng = ScriptedRandomSource::new(vec![0.25, 0.75]);
/// assert_eq!(rng.next_f64(), 0.25);
/// assert_eq!(rng.next_f64(), 0.75);
/// assert_eq!(rng.next_f64(), 0.25);
/// ```
#[derive(Debug)]
pub struct ScriptedRandomSource {
    values: Vec<f64>,
    cursor: AtomicUsize,
}

/// Largest `f64` strictly below one.
const BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

impl ScriptedRandomSource {
    /// Create from a script of draws.
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, BELOW_ONE) })
                .collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl RandomSource for ScriptedRandomSource {
    fn next_f64(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.values[i % self.values.len()]
    }
}
