//! Per-site photon distribution over the whole movie.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::Result;
use crate::kinetics::{paintgen, KineticsParams, SpotKinetics};
use crate::structure::StructureTable;

/// Photons detected from every site in every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonTable {
    /// Indexed `[site, frame]`
    pub counts: Array2<u32>,
    /// Blinking summary per site, same order as the rows of `counts`
    pub kinetics: Vec<SpotKinetics>,
}

impl PhotonTable {
    pub fn sites(&self) -> usize {
        self.counts.nrows()
    }

    pub fn frames(&self) -> usize {
        self.counts.ncols()
    }

    /// Total photons emitted by each site.
    pub fn site_totals(&self) -> Vec<u64> {
        self.counts
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|&p| u64::from(p)).sum())
            .collect()
    }
}

/// Photons per frame and blinking summary for a single binding site.
///
/// Mean dark and bright times are rounded to whole time units first.
pub fn distphotons<R: Rng + ?Sized>(
    params: &KineticsParams,
    rng: &mut R,
) -> Result<(Vec<u32>, SpotKinetics)> {
    params.validate()?;
    let trace = paintgen(&params.with_rounded_means()?, rng)?;
    Ok((trace.photons, trace.kinetics))
}

/// Build the full `[site, frame]` table, one independent RNG stream per site.
///
/// Site `i` is seeded with `seed + i`, so the table does not depend on how
/// rayon schedules the work.
pub fn distribute_photons(
    structures: &StructureTable,
    params: &KineticsParams,
    seed: u64,
) -> Result<PhotonTable> {
    params.validate()?;
    structures.validate()?;

    let rows: Vec<(Vec<u32>, SpotKinetics)> = (0..structures.len())
        .into_par_iter()
        .map(|site| -> Result<(Vec<u32>, SpotKinetics)> {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(site as u64));
            let (photons, kinetics) = distphotons(params, &mut rng)?;
            debug!(
                site,
                on_events = kinetics.on_events,
                localizations = kinetics.localizations,
                "distributed photons"
            );
            Ok((photons, kinetics))
        })
        .collect::<Result<_>>()?;

    let mut counts = Array2::<u32>::zeros((rows.len(), params.frames));
    let mut kinetics = Vec::with_capacity(rows.len());
    for (mut row, (photons, spot)) in counts.rows_mut().into_iter().zip(rows) {
        for (slot, photons) in row.iter_mut().zip(photons) {
            *slot = photons;
        }
        kinetics.push(spot);
    }

    info!(
        sites = structures.len(),
        frames = params.frames,
        "photon table complete"
    );
    Ok(PhotonTable { counts, kinetics })
}
