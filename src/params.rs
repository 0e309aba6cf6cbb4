//! Simulation parameters and their TOML representation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, ensure_positive, Result};
use crate::kinetics::KineticsParams;
use crate::noise::NoiseModel;
use crate::psf::{PsfWidths, ZCalibration};

/// Every knob of a simulation run.
///
/// Durations share one time unit (milliseconds in the defaults), and
/// `photonrate` is photons per that unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Number of frames in the movie
    pub frames: usize,
    /// Exposure time per frame
    pub time: f64,
    /// Mean dark time between binding events
    pub meandark: f64,
    /// Mean bright time of a binding event
    pub meanbright: f64,
    /// Mean photon emission rate while bound
    pub photonrate: f64,
    /// Standard deviation of the emission rate between binding events
    pub photonratestd: f64,
    /// Photons a site can emit before bleaching
    pub photonbudget: u64,
    /// Independent dark times instead of blocked rebinding
    pub simple: bool,
    /// Gaussian PSF width in pixels (2D mode)
    pub psf: f64,
    /// Mean background photons per pixel per frame
    pub background: f64,
    pub noise: NoiseModel,
    /// Edge length of the square image in pixels
    pub imagesize: usize,
    /// Use the astigmatic z calibration for PSF widths
    pub mode3d: bool,
    pub calibration: ZCalibration,
    /// Base seed; sites and frames derive their own streams from it
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            frames: 3000,
            time: 300.0,
            meandark: 2000.0,
            meanbright: 500.0,
            photonrate: 15.0,
            photonratestd: 5.0,
            photonbudget: 1_500_000,
            simple: true,
            psf: 0.82,
            background: 15.0,
            noise: NoiseModel::Poisson,
            imagesize: 32,
            mode3d: false,
            calibration: ZCalibration::default(),
            seed: 0,
        }
    }
}

impl SimulationParams {
    /// Load parameters from a TOML file; missing keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject parameters the kinetics and renderer cannot work with.
    pub fn validate(&self) -> Result<()> {
        let kinetics = self.kinetics();
        kinetics.validate()?;
        // Per-site generation works on whole time units.
        kinetics.with_rounded_means()?;
        ensure_positive("imagesize", self.imagesize as f64)?;
        ensure_non_negative("background", self.background)?;
        if !self.mode3d {
            ensure_non_negative("psf", self.psf)?;
        }
        if let NoiseModel::Gaussian { sigma } = self.noise {
            ensure_non_negative("noise.sigma", sigma)?;
        }
        Ok(())
    }

    /// Kinetics parameters as passed to the per-site generator.
    pub fn kinetics(&self) -> KineticsParams {
        KineticsParams {
            meandark: self.meandark,
            meanbright: self.meanbright,
            frames: self.frames,
            time: self.time,
            photonrate: self.photonrate,
            photonratestd: self.photonratestd,
            photonbudget: self.photonbudget,
            simple: self.simple,
        }
    }

    /// PSF sampling widths for an emitter at depth `z`.
    pub fn psf_widths(&self, z: f64) -> PsfWidths {
        if self.mode3d {
            PsfWidths::at_depth(z, &self.calibration)
        } else {
            PsfWidths::isotropic(self.psf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationError;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SimulationParams::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let params = SimulationParams::from_toml_str(
            r#"
            frames = 50
            time = 100.0
            mode3d = true

            [noise]
            kind = "gaussian"
            sigma = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(params.frames, 50);
        assert_eq!(params.time, 100.0);
        assert!(params.mode3d);
        assert_eq!(params.noise, NoiseModel::Gaussian { sigma: 2.5 });
        assert_eq!(params.imagesize, SimulationParams::default().imagesize);
        assert_eq!(params.calibration, ZCalibration::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let params = SimulationParams {
            seed: 99,
            simple: false,
            ..Default::default()
        };
        let text = toml::to_string(&params).unwrap();
        assert_eq!(SimulationParams::from_toml_str(&text).unwrap(), params);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            SimulationParams::from_toml_str("frames = \"many\""),
            Err(SimulationError::Config(_))
        ));
    }

    #[test]
    fn test_validation_rejects_nonpositive_values() {
        let params = SimulationParams {
            imagesize: 0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SimulationError::InvalidParameter {
                name: "imagesize",
                ..
            })
        ));
        let params = SimulationParams {
            photonbudget: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_means_below_one_time_unit() {
        let params = SimulationParams {
            frames: 100,
            time: 0.1,
            meandark: 1.0,
            meanbright: 0.3,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SimulationError::InvalidParameter {
                name: "meanbright",
                value,
                ..
            }) if value == 0.3
        ));
    }

    #[test]
    fn test_psf_widths_follow_mode() {
        let params = SimulationParams::default();
        assert_eq!(params.psf_widths(300.0), PsfWidths::isotropic(0.82));
        let params = SimulationParams {
            mode3d: true,
            ..Default::default()
        };
        assert_eq!(
            params.psf_widths(0.0),
            PsfWidths {
                sigma_x: params.calibration.cx[6],
                sigma_y: params.calibration.cy[6]
            }
        );
    }
}
