//! Raw-frame simulation for DNA-PAINT single-molecule localization microscopy.
//!
//! Binding sites blink as labels transiently bind ([`kinetics`]), every
//! bright period is turned into per-frame photon counts ([`photons`]), and
//! each frame is rendered by scattering those photons with the PSF and
//! adding camera noise ([`render`]). [`simulation::Simulation`] runs the
//! whole pipeline and [`io`] persists the result.

pub mod error;
pub mod io;
pub mod kinetics;
pub mod noise;
pub mod params;
pub mod photons;
pub mod psf;
pub mod render;
pub mod simulation;
pub mod structure;

pub use error::{Result, SimulationError};
pub use kinetics::{paintgen, BlinkTrace, KineticsParams, SpotKinetics};
pub use noise::{noisy, noisy_p, NoiseModel};
pub use params::SimulationParams;
pub use photons::{distphotons, distribute_photons, PhotonTable};
pub use psf::{calculate_zpsf, ZCalibration};
pub use render::{convert_movie, render_movie};
pub use simulation::{Movie, Simulation, SimulationInfo};
pub use structure::{BindingSite, StructureTable, StructureTemplate};
