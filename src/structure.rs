//! Binding-site geometry.
//!
//! A structure template holds the binding-site offsets of one molecule (for
//! example a DNA origami). Templates are placed on a field of positions,
//! optionally rotated, thinned by an incorporation efficiency and relabelled,
//! producing the [`StructureTable`] consumed by the simulation.

use std::f64::consts::PI;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};

/// One binding site. `x`/`y` are in camera pixels, `z` in nanometres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BindingSite {
    pub x: f64,
    pub y: f64,
    /// Exchange round the site's docking strand belongs to
    pub exchange: u32,
    pub z: f64,
    /// Index of the structure instance the site was placed with
    pub label: Option<usize>,
}

impl BindingSite {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            exchange: 1,
            z: 0.0,
            label: None,
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Ordered, immutable set of binding sites for one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureTable {
    sites: Vec<BindingSite>,
}

impl From<Vec<BindingSite>> for StructureTable {
    fn from(sites: Vec<BindingSite>) -> Self {
        Self { sites }
    }
}

impl StructureTable {
    pub fn new(sites: Vec<BindingSite>) -> Self {
        Self { sites }
    }

    pub fn sites(&self) -> &[BindingSite] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Check that there is at least one site and all coordinates are finite.
    pub fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            return Err(SimulationError::EmptyStructure);
        }
        match self.sites.iter().position(|site| !site.is_finite()) {
            Some(index) => Err(SimulationError::NonFiniteCoordinate { index }),
            None => Ok(()),
        }
    }

    /// Sites imaged in one exchange round.
    pub fn with_exchange(&self, exchange: u32) -> StructureTable {
        self.sites
            .iter()
            .filter(|site| site.exchange == exchange)
            .copied()
            .collect::<Vec<_>>()
            .into()
    }

    /// Random labelling: permute the exchange ids over all sites.
    pub fn shuffle_exchange<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut exchanges: Vec<u32> = self.sites.iter().map(|site| site.exchange).collect();
        exchanges.shuffle(rng);
        for (site, exchange) in self.sites.iter_mut().zip(exchanges) {
            site.exchange = exchange;
        }
    }
}

/// Binding-site offsets of a single structure, centred on the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureTemplate {
    pub sites: Vec<BindingSite>,
}

impl StructureTemplate {
    /// Build a template from nanometre coordinates.
    ///
    /// The coordinates are shifted so the centre of mass is at the origin and
    /// converted to pixels with `pixelsize` (nm per pixel).
    pub fn define(
        xs: &[f64],
        ys: &[f64],
        exchange: &[u32],
        z: &[f64],
        pixelsize: f64,
    ) -> Result<Self> {
        crate::error::ensure_positive("pixelsize", pixelsize)?;
        for found in [ys.len(), exchange.len(), z.len()] {
            if found != xs.len() {
                return Err(SimulationError::MismatchedLengths {
                    expected: xs.len(),
                    found,
                });
            }
        }
        if xs.is_empty() {
            return Err(SimulationError::EmptyStructure);
        }

        let mean_x = xs.iter().sum::<f64>() / xs.len() as f64;
        let mean_y = ys.iter().sum::<f64>() / ys.len() as f64;
        let sites = (0..xs.len())
            .map(|i| BindingSite {
                x: (xs[i] - mean_x) / pixelsize,
                y: (ys[i] - mean_y) / pixelsize,
                exchange: exchange[i],
                z: z[i],
                label: None,
            })
            .collect();
        Ok(Self { sites })
    }

    /// Copy rotated by a uniformly random angle about the origin.
    pub fn rotated<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let angle = rng.random::<f64>() * 2.0 * PI;
        let (sin, cos) = angle.sin_cos();
        let sites = self
            .sites
            .iter()
            .map(|site| BindingSite {
                x: site.x * cos - site.y * sin,
                y: site.x * sin + site.y * cos,
                ..*site
            })
            .collect();
        Self { sites }
    }

    /// Copy keeping each site with probability `incorporation`.
    pub fn incorporated<R: Rng + ?Sized>(&self, incorporation: f64, rng: &mut R) -> Self {
        if incorporation >= 1.0 {
            return self.clone();
        }
        let sites = self
            .sites
            .iter()
            .filter(|_| rng.random::<f64>() < incorporation)
            .copied()
            .collect();
        Self { sites }
    }
}

/// How structures are laid out over the field of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arrangement {
    #[default]
    Grid,
    Random,
}

/// Positions (pixels) at which `number` structures are placed, keeping
/// `margin` pixels clear of the image border.
pub fn generate_positions<R: Rng + ?Sized>(
    number: usize,
    imagesize: f64,
    margin: f64,
    arrangement: Arrangement,
    rng: &mut R,
) -> Vec<(f64, f64)> {
    match arrangement {
        Arrangement::Grid => {
            let spacing = (number as f64).sqrt().ceil() as usize;
            let axis = linspace(margin, imagesize - margin, spacing);
            axis.iter()
                .flat_map(|&y| axis.iter().map(move |&x| (x, y)))
                .take(number)
                .collect()
        }
        Arrangement::Random => {
            let extent = imagesize - 2.0 * margin;
            (0..number)
                .map(|_| {
                    let x = extent * rng.random::<f64>() + margin;
                    let y = extent * rng.random::<f64>() + margin;
                    (x, y)
                })
                .collect()
        }
    }
}

fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Place a copy of `template` at every position.
///
/// Each placed site is labelled with the index of its position.
pub fn prepare_structures<R: Rng + ?Sized>(
    template: &StructureTemplate,
    positions: &[(f64, f64)],
    random_orientation: bool,
    incorporation: f64,
    random_exchange: bool,
    rng: &mut R,
) -> StructureTable {
    let mut sites = Vec::with_capacity(template.sites.len() * positions.len());
    for (index, &(px, py)) in positions.iter().enumerate() {
        let oriented = if random_orientation {
            template.rotated(rng)
        } else {
            template.clone()
        };
        let placed = oriented.incorporated(incorporation, rng);
        sites.extend(placed.sites.iter().map(|site| BindingSite {
            x: site.x + px,
            y: site.y + py,
            label: Some(index),
            ..*site
        }));
    }

    let mut table = StructureTable::new(sites);
    if random_exchange {
        table.shuffle_exchange(rng);
    }
    table
}
