use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use paintsim::io::{save_movie, save_preview_png};
use paintsim::structure::{generate_positions, prepare_structures, Arrangement};
use paintsim::{NoiseModel, Simulation, SimulationParams, StructureTemplate};

/// Simulate a DNA-PAINT movie of origami-like grid structures
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// TOML parameter file; command-line flags override its values
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// Output path without extension (.raw, .json and .png are written)
    #[clap(short = 'o', long, default_value = "simulated")]
    output: PathBuf,

    /// Number of structures to place
    #[clap(short = 'n', long, default_value = "9")]
    structures: usize,

    /// Distance between neighbouring binding sites in nm
    #[clap(long, default_value = "10.0")]
    site_spacing_nm: f64,

    /// Camera pixel size in nm
    #[clap(long, default_value = "160.0")]
    pixelsize: f64,

    /// Place structures at random positions instead of a grid
    #[clap(long)]
    random_positions: bool,

    /// Rotate each structure by a random angle
    #[clap(long)]
    random_orientation: bool,

    /// Probability that a binding site is incorporated
    #[clap(long, default_value = "1.0")]
    incorporation: f64,

    #[clap(long)]
    frames: Option<usize>,

    /// Exposure time per frame (ms)
    #[clap(long)]
    time: Option<f64>,

    /// Mean dark time (ms)
    #[clap(long)]
    meandark: Option<f64>,

    /// Mean bright time (ms)
    #[clap(long)]
    meanbright: Option<f64>,

    /// Photons per ms while bound
    #[clap(long)]
    photonrate: Option<f64>,

    #[clap(long)]
    photonbudget: Option<u64>,

    /// Model blocked rebinding instead of independent dark times
    #[clap(long)]
    blocked: bool,

    /// PSF width in pixels
    #[clap(long)]
    psf: Option<f64>,

    /// Background photons per pixel per frame
    #[clap(long)]
    background: Option<f64>,

    /// Use Gaussian read noise with this standard deviation instead of Poisson
    #[clap(long)]
    gaussian_noise: Option<f64>,

    /// Image size in pixels
    #[clap(short = 'i', long)]
    imagesize: Option<usize>,

    /// Astigmatic 3D imaging
    #[clap(long)]
    mode3d: bool,

    #[clap(long)]
    seed: Option<u64>,
}

impl Args {
    fn params(&self) -> Result<SimulationParams> {
        let mut params = match &self.config {
            Some(path) => SimulationParams::from_toml_file(path)
                .with_context(|| format!("loading parameters from {}", path.display()))?,
            None => SimulationParams::default(),
        };

        if let Some(frames) = self.frames {
            params.frames = frames;
        }
        if let Some(time) = self.time {
            params.time = time;
        }
        if let Some(meandark) = self.meandark {
            params.meandark = meandark;
        }
        if let Some(meanbright) = self.meanbright {
            params.meanbright = meanbright;
        }
        if let Some(photonrate) = self.photonrate {
            params.photonrate = photonrate;
        }
        if let Some(photonbudget) = self.photonbudget {
            params.photonbudget = photonbudget;
        }
        if let Some(psf) = self.psf {
            params.psf = psf;
        }
        if let Some(background) = self.background {
            params.background = background;
        }
        if let Some(sigma) = self.gaussian_noise {
            params.noise = NoiseModel::Gaussian { sigma };
        }
        if let Some(imagesize) = self.imagesize {
            params.imagesize = imagesize;
        }
        if let Some(seed) = self.seed {
            params.seed = seed;
        }
        params.simple &= !self.blocked;
        params.mode3d |= self.mode3d;
        Ok(params)
    }

    /// 3x3 grid of sites, a stand-in for a DNA origami.
    fn template(&self) -> Result<StructureTemplate> {
        let mut xs = Vec::with_capacity(9);
        let mut ys = Vec::with_capacity(9);
        for row in 0..3 {
            for col in 0..3 {
                xs.push(col as f64 * self.site_spacing_nm);
                ys.push(row as f64 * self.site_spacing_nm);
            }
        }
        StructureTemplate::define(&xs, &ys, &[1; 9], &[0.0; 9], self.pixelsize)
            .context("building structure template")
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let params = args.params()?;
    params.validate().context("invalid simulation parameters")?;

    tracing::info!("Placing structures");
    let mut rng = StdRng::seed_from_u64(params.seed);
    let arrangement = if args.random_positions {
        Arrangement::Random
    } else {
        Arrangement::Grid
    };
    let positions = generate_positions(
        args.structures,
        params.imagesize as f64,
        (params.imagesize as f64 * 0.1).max(2.0),
        arrangement,
        &mut rng,
    );
    let structures = prepare_structures(
        &args.template()?,
        &positions,
        args.random_orientation,
        args.incorporation,
        false,
        &mut rng,
    );

    tracing::info!(sites = structures.len(), "Simulating movie");
    let movie = Simulation::new(params, structures)
        .run()
        .context("simulation failed")?;

    let (raw, info) = save_movie(&args.output, &movie).context("saving movie")?;
    let preview = args.output.with_extension("png");
    let brightest = movie
        .frames
        .iter()
        .max_by_key(|frame| frame.iter().map(|&v| u64::from(v)).sum::<u64>());
    if let Some(frame) = brightest {
        save_preview_png(&preview, frame).context("saving preview")?;
    }

    tracing::info!(
        raw = %raw.display(),
        info = %info.display(),
        preview = %preview.display(),
        "Done"
    );
    Ok(())
}
