//! Camera noise applied to rendered photon histograms.

use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};

/// Noise model selection for the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NoiseModel {
    /// Shot noise plus background, rate given by the background level
    #[default]
    Poisson,
    /// Additive Gaussian read noise with mean at the background level
    Gaussian { sigma: f64 },
}

impl NoiseModel {
    /// Apply this model with the given background level.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        image: &Array2<f64>,
        background: f64,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        match *self {
            NoiseModel::Poisson => Ok(noisy_p(image, background, rng)),
            NoiseModel::Gaussian { sigma } => noisy(image, background, sigma, rng),
        }
    }
}

/// Add i.i.d. Gaussian noise `N(mu, sigma)` to every pixel, clamping at zero.
pub fn noisy<R: Rng + ?Sized>(
    image: &Array2<f64>,
    mu: f64,
    sigma: f64,
    rng: &mut R,
) -> Result<Array2<f64>> {
    let normal = Normal::new(mu, sigma).map_err(SimulationError::distribution)?;
    Ok(image.mapv(|value| (value + normal.sample(rng)).max(0.0)))
}

/// Add i.i.d. Poisson noise with rate `mu` to every pixel.
///
/// A nonpositive rate adds nothing, since the sampler rejects it.
pub fn noisy_p<R: Rng + ?Sized>(image: &Array2<f64>, mu: f64, rng: &mut R) -> Array2<f64> {
    match poisson_or_zero(mu) {
        Some(poisson) => image.mapv(|value| value + poisson.sample(rng)),
        None => image.clone(),
    }
}

/// Poisson distribution for `lambda`, or `None` where the draw is always zero.
pub(crate) fn poisson_or_zero(lambda: f64) -> Option<Poisson<f64>> {
    if lambda.is_finite() && lambda > 0.0 {
        Poisson::new(lambda).ok()
    } else {
        None
    }
}

/// Draw a Poisson count with a clamped rate.
pub(crate) fn poisson_draw<R: Rng + ?Sized>(lambda: f64, rng: &mut R) -> u64 {
    match poisson_or_zero(lambda) {
        Some(poisson) => poisson.sample(rng) as u64,
        None => 0,
    }
}
