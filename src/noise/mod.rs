//! Laplace noise source
//!
//! The Laplace mechanism releases `true_value + Lap(Δ/ε)`. Sampling is split in two:
//! - [`sample_laplace`]: pure function of `(rng, scale)`
//! - [`NoiseSource`]: shareable capability that owns an entropy stream
//!
//! Production code uses [`LaplaceNoise`] (ChaCha20 CSPRNG seeded from OS entropy).
//! Fixed seeds and [`NoNoise`] exist for reproducible tests only.
//!
//! ## Floating-point limitation
//!
//! The sampler is the textbook `-scale * ln(U)` with a random sign, computed
//! in `f64`. `U` comes from a 52-bit grid and `ln` rounds, so the set of
//! reachable outputs is not the same around every true value. An observer of
//! the low-order bits of `truth + noise` can learn more than `ε` allows
//! (Mironov, "On Significance of the Least Significant Bits for Differential
//! Privacy", CCS 2012). Closing this needs the snapping mechanism or a
//! discretised Laplace sampler on a power-of-two grid; neither is done here.
//! The exact summation in the aggregate operators fixes the sensitivity side
//! of the floating-point problem, not this one.

use crate::{Error, Result};
use rand::distributions::Open01;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Mutex;

/// Draw one value from Laplace(0, `scale`).
///
/// Samples an Exp(1/scale) magnitude from an open-interval uniform (so `ln`
/// never sees 0) and attaches a fair random sign. A `scale` of 0 yields 0.
pub fn sample_laplace<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    if scale == 0.0 {
        return 0.0;
    }
    let u: f64 = rng.sample(Open01);
    let magnitude = -scale * u.ln();
    if rng.gen::<bool>() {
        magnitude
    } else {
        -magnitude
    }
}

/// Source of calibrated perturbation.
///
/// Implementations must be safe to share across concurrently running queries.
pub trait NoiseSource: Send + Sync {
    /// Draw one value from Laplace(0, `scale`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEpsilon`] when `scale` is negative or not finite
    /// (it is always derived as `Δ / ε`), or [`Error::AgentPoisoned`] if the
    /// entropy stream is unavailable.
    fn sample_laplace(&self, scale: f64) -> Result<f64>;
}

/// ChaCha20-backed Laplace sampler.
pub struct LaplaceNoise {
    rng: Mutex<ChaCha20Rng>,
}

impl LaplaceNoise {
    /// Seed from operating system entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::from_entropy()),
        }
    }

    /// Fixed seed for reproducible output.
    ///
    /// Never use a fixed seed for real releases: the noise becomes predictable.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl Default for LaplaceNoise {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl NoiseSource for LaplaceNoise {
    fn sample_laplace(&self, scale: f64) -> Result<f64> {
        check_scale(scale)?;
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| Error::AgentPoisoned("noise RNG".to_string()))?;
        Ok(sample_laplace(&mut *rng, scale))
    }
}

/// Zero perturbation.
///
/// Releases the exact statistic. Only for tests that need to observe the true
/// value through the full charge path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNoise;

impl NoiseSource for NoNoise {
    fn sample_laplace(&self, scale: f64) -> Result<f64> {
        check_scale(scale)?;
        Ok(0.0)
    }
}

fn check_scale(scale: f64) -> Result<()> {
    if scale.is_finite() && scale >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidEpsilon(scale))
    }
}
