//! Frame rendering: photon counts to noisy 16-bit camera frames.
//!
//! For one frame index every active site scatters its detected photons with
//! the PSF, the photon positions are binned into the pixel grid, and the
//! sensor noise model and 16-bit saturation are applied.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Result, SimulationError};
use crate::params::SimulationParams;
use crate::structure::StructureTable;

/// Largest value a 16-bit sensor can report.
pub const SENSOR_MAX: f64 = 65535.0;

/// Sample detected photon positions for frame `runner`.
///
/// Sites without photons in this frame contribute nothing.
pub fn photon_positions<R: Rng + ?Sized>(
    runner: usize,
    photons: &Array2<u32>,
    structures: &StructureTable,
    params: &SimulationParams,
    rng: &mut R,
) -> Result<Vec<(f64, f64)>> {
    if photons.nrows() != structures.len() {
        return Err(SimulationError::TableMismatch {
            table: photons.nrows(),
            sites: structures.len(),
        });
    }
    if runner >= photons.ncols() {
        return Err(SimulationError::FrameOutOfRange {
            runner,
            frames: photons.ncols(),
        });
    }

    let column = photons.column(runner);
    let total: usize = column.iter().map(|&count| count as usize).sum();
    let mut positions = Vec::with_capacity(total);
    for (site, &count) in structures.sites().iter().zip(column.iter()) {
        if count == 0 {
            continue;
        }
        let widths = params.psf_widths(site.z);
        for _ in 0..count {
            let dx: f64 = StandardNormal.sample(rng);
            let dy: f64 = StandardNormal.sample(rng);
            positions.push((site.x + widths.sigma_x * dx, site.y + widths.sigma_y * dy));
        }
    }
    Ok(positions)
}

/// Bin index of `value` on unit-width bins spanning `[0, pixels]`.
///
/// The right edge belongs to the last bin; values outside are dropped.
fn bin_index(value: f64, pixels: usize) -> Option<usize> {
    if (0.0..=pixels as f64).contains(&value) {
        Some((value.floor() as usize).min(pixels - 1))
    } else {
        None
    }
}

/// Histogram photon positions into a `pixels × pixels` grid.
///
/// Rows follow y and are flipped so that row 0 holds the largest y, matching
/// the orientation used by the localization software reading these movies.
pub fn histogram2d(positions: &[(f64, f64)], pixels: usize) -> Array2<f64> {
    let mut frame = Array2::<f64>::zeros((pixels, pixels));
    if pixels == 0 {
        return frame;
    }
    for &(x, y) in positions {
        if let (Some(col), Some(row)) = (bin_index(x, pixels), bin_index(y, pixels)) {
            frame[[pixels - 1 - row, col]] += 1.0;
        }
    }
    frame
}

/// Saturate at the sensor ceiling and round to integer counts.
pub fn quantize(frame: &Array2<f64>) -> Array2<u16> {
    frame.mapv(|value| value.clamp(0.0, SENSOR_MAX).round() as u16)
}

/// Render frame `runner` of the movie.
pub fn convert_movie<R: Rng + ?Sized>(
    runner: usize,
    photons: &Array2<u32>,
    structures: &StructureTable,
    params: &SimulationParams,
    rng: &mut R,
) -> Result<Array2<u16>> {
    let positions = photon_positions(runner, photons, structures, params, rng)?;
    let simframe = histogram2d(&positions, params.imagesize);
    let noisy = params.noise.apply(&simframe, params.background, rng)?;
    debug!(runner, photons = positions.len(), "rendered frame");
    Ok(quantize(&noisy))
}

/// Render every frame, one independent RNG stream per frame.
///
/// Frame `i` is seeded with `seed + i`; the photon table is only read.
pub fn render_movie(
    photons: &Array2<u32>,
    structures: &StructureTable,
    params: &SimulationParams,
    seed: u64,
) -> Result<Vec<Array2<u16>>> {
    let frames = (0..photons.ncols())
        .into_par_iter()
        .map(|runner| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(runner as u64));
            convert_movie(runner, photons, structures, params, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;
    info!(
        frames = frames.len(),
        pixels = params.imagesize,
        "movie rendered"
    );
    Ok(frames)
}
