//! End-to-end simulation run: kinetics for every site, then every frame.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::kinetics::SpotKinetics;
use crate::params::SimulationParams;
use crate::photons::{distribute_photons, PhotonTable};
use crate::render::render_movie;
use crate::structure::StructureTable;

/// Offset separating the per-frame RNG streams from the per-site ones.
const RENDER_STREAM_OFFSET: u64 = 0x9E37_79B9_7F4A_7C15;

/// Averages of the per-site blinking summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KineticsSummary {
    pub mean_on_events: f64,
    pub mean_localizations: f64,
    pub mean_dark: f64,
    pub mean_bright: f64,
}

impl KineticsSummary {
    pub fn from_sites(kinetics: &[SpotKinetics]) -> Self {
        if kinetics.is_empty() {
            return Self::default();
        }
        let n = kinetics.len() as f64;
        let mean_of = |f: fn(&SpotKinetics) -> f64| kinetics.iter().map(f).sum::<f64>() / n;
        Self {
            mean_on_events: mean_of(|k| k.on_events as f64),
            mean_localizations: mean_of(|k| k.localizations as f64),
            mean_dark: mean_of(|k| k.mean_dark),
            mean_bright: mean_of(|k| k.mean_bright),
        }
    }
}

/// Metadata written next to the raw frame stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInfo {
    #[serde(rename = "Byte Order")]
    pub byte_order: String,
    #[serde(rename = "Data Type")]
    pub data_type: String,
    #[serde(rename = "Frames")]
    pub frames: usize,
    #[serde(rename = "Height")]
    pub height: usize,
    #[serde(rename = "Width")]
    pub width: usize,
    #[serde(rename = "Generated by")]
    pub generated_by: String,
    #[serde(rename = "Binding Sites")]
    pub sites: usize,
    #[serde(rename = "Total Photons")]
    pub total_photons: u64,
    #[serde(rename = "Parameters")]
    pub params: SimulationParams,
    #[serde(rename = "Kinetics Summary")]
    pub summary: KineticsSummary,
    #[serde(rename = "Spot Kinetics")]
    pub kinetics: Vec<SpotKinetics>,
}

impl SimulationInfo {
    fn new(params: &SimulationParams, table: &PhotonTable) -> Self {
        Self {
            byte_order: "<".to_string(),
            data_type: "uint16".to_string(),
            frames: params.frames,
            height: params.imagesize,
            width: params.imagesize,
            generated_by: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            sites: table.sites(),
            total_photons: table.site_totals().iter().sum(),
            params: params.clone(),
            summary: KineticsSummary::from_sites(&table.kinetics),
            kinetics: table.kinetics.clone(),
        }
    }
}

/// Rendered frames together with the data they were rendered from.
#[derive(Debug, Clone)]
pub struct Movie {
    pub frames: Vec<Array2<u16>>,
    pub photons: PhotonTable,
    pub info: SimulationInfo,
}

/// A structure table and the parameters to image it with.
pub struct Simulation {
    pub params: SimulationParams,
    pub structures: StructureTable,
}

impl Simulation {
    pub fn new(params: SimulationParams, structures: StructureTable) -> Self {
        Self { params, structures }
    }

    /// Validate everything, build the photon table, then render all frames.
    pub fn run(&self) -> Result<Movie> {
        self.params.validate()?;
        self.structures.validate()?;

        info!(
            sites = self.structures.len(),
            frames = self.params.frames,
            pixels = self.params.imagesize,
            mode3d = self.params.mode3d,
            "starting simulation"
        );

        let photons = distribute_photons(
            &self.structures,
            &self.params.kinetics(),
            self.params.seed,
        )?;
        let frames = render_movie(
            &photons.counts,
            &self.structures,
            &self.params,
            self.params.seed.wrapping_add(RENDER_STREAM_OFFSET),
        )?;
        let info = SimulationInfo::new(&self.params, &photons);

        info!(
            total_photons = info.total_photons,
            mean_localizations = info.summary.mean_localizations,
            "simulation finished"
        );
        Ok(Movie {
            frames,
            photons,
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationError;
    use crate::structure::BindingSite;
    use approx::assert_relative_eq;

    fn small_params() -> SimulationParams {
        SimulationParams {
            frames: 40,
            time: 100.0,
            meandark: 800.0,
            meanbright: 300.0,
            photonrate: 2.0,
            photonratestd: 0.5,
            imagesize: 16,
            background: 2.0,
            seed: 17,
            ..Default::default()
        }
    }

    fn structures() -> StructureTable {
        StructureTable::new(vec![
            BindingSite::new(4.0, 4.0),
            BindingSite::new(11.0, 6.0),
            BindingSite::new(8.0, 12.0),
        ])
    }

    #[test]
    fn test_run_shapes() {
        let movie = Simulation::new(small_params(), structures()).run().unwrap();
        assert_eq!(movie.frames.len(), 40);
        assert!(movie.frames.iter().all(|f| f.dim() == (16, 16)));
        assert_eq!(movie.photons.counts.dim(), (3, 40));
        assert_eq!(movie.info.sites, 3);
        assert_eq!(movie.info.kinetics.len(), 3);
        assert_eq!(movie.info.frames, 40);
    }

    #[test]
    fn test_run_is_reproducible() {
        let a = Simulation::new(small_params(), structures()).run().unwrap();
        let b = Simulation::new(small_params(), structures()).run().unwrap();
        assert_eq!(a.frames, b.frames);
        assert_eq!(a.info, b.info);

        let other = SimulationParams {
            seed: 18,
            ..small_params()
        };
        let c = Simulation::new(other, structures()).run().unwrap();
        assert_ne!(a.frames, c.frames);
    }

    #[test]
    fn test_invalid_parameters_fail_before_sampling() {
        let params = SimulationParams {
            time: -1.0,
            ..small_params()
        };
        assert!(matches!(
            Simulation::new(params, structures()).run(),
            Err(SimulationError::InvalidParameter { name: "time", .. })
        ));
        assert!(matches!(
            Simulation::new(small_params(), StructureTable::default()).run(),
            Err(SimulationError::EmptyStructure)
        ));
    }

    #[test]
    fn test_run_with_seconds_units() {
        let seconds = SimulationParams {
            frames: 100,
            time: 0.1,
            meandark: 2.0,
            meanbright: 1.0,
            photonrate: 1000.0,
            photonratestd: 100.0,
            photonbudget: 20_000,
            ..small_params()
        };
        let movie = Simulation::new(seconds.clone(), structures()).run().unwrap();
        assert_eq!(movie.frames.len(), 100);
        assert!(movie.photons.site_totals().iter().all(|&t| t <= 20_000));

        // A mean bright time of 0.3 s rounds to zero and is refused up front.
        let short = SimulationParams {
            meandark: 1.0,
            meanbright: 0.3,
            ..seconds
        };
        assert!(matches!(
            Simulation::new(short, structures()).run(),
            Err(SimulationError::InvalidParameter {
                name: "meanbright",
                value,
                ..
            }) if value == 0.3
        ));
    }

    #[test]
    fn test_kinetics_summary() {
        let kinetics = [
            SpotKinetics {
                on_events: 2,
                localizations: 4,
                mean_dark: 10.0,
                mean_bright: 1.0,
            },
            SpotKinetics {
                on_events: 4,
                localizations: 8,
                mean_dark: 20.0,
                mean_bright: 3.0,
            },
        ];
        let summary = KineticsSummary::from_sites(&kinetics);
        assert_relative_eq!(summary.mean_on_events, 3.0);
        assert_relative_eq!(summary.mean_localizations, 6.0);
        assert_relative_eq!(summary.mean_dark, 15.0);
        assert_relative_eq!(summary.mean_bright, 2.0);
        assert_eq!(KineticsSummary::from_sites(&[]), KineticsSummary::default());
    }

    #[test]
    fn test_info_serializes_with_sidecar_keys() {
        let movie = Simulation::new(small_params(), structures()).run().unwrap();
        let json = serde_json::to_value(&movie.info).unwrap();
        assert_eq!(json["Data Type"], "uint16");
        assert_eq!(json["Width"], 16);
        assert_eq!(json["Parameters"]["frames"], 40);
    }
}
