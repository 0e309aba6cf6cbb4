use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use paintsim::structure::{generate_positions, prepare_structures, Arrangement};
use paintsim::{
    calculate_zpsf, convert_movie, distribute_photons, paintgen, BindingSite, KineticsParams,
    Simulation, SimulationParams, StructureTable, StructureTemplate, ZCalibration,
};

fn scenario() -> KineticsParams {
    KineticsParams {
        meandark: 1.0,
        meanbright: 0.3,
        frames: 100,
        time: 0.1,
        photonrate: 1000.0,
        photonratestd: 100.0,
        photonbudget: 20_000,
        simple: true,
    }
}

#[test]
fn single_site_at_origin_scenario() {
    let mut rng = StdRng::seed_from_u64(2024);
    let trace = paintgen(&scenario(), &mut rng).unwrap();
    assert_eq!(trace.photons.len(), 100);
    assert!(trace.total_photons() <= 20_000);

    // One site at the origin, 2D mode, psf = 1: the photon table feeds the renderer.
    let structures = StructureTable::new(vec![BindingSite::new(0.0, 0.0)]);
    let counts = Array2::from_shape_vec((1, 100), trace.photons.clone()).unwrap();
    let params = SimulationParams {
        frames: 100,
        imagesize: 8,
        psf: 1.0,
        background: 0.0,
        ..Default::default()
    };
    for runner in 0..100 {
        let frame = convert_movie(runner, &counts, &structures, &params, &mut rng).unwrap();
        let detected: u64 = frame.iter().map(|&v| u64::from(v)).sum();
        // Only photons landing in the first quadrant around the origin are inside the image.
        assert!(detected <= u64::from(trace.photons[runner]));
    }
}

#[test]
fn budget_of_one_photon_holds_for_whole_table() {
    let structures = StructureTable::new(vec![BindingSite::new(5.0, 5.0)]);
    for seed in 0..10 {
        let table = distribute_photons(
            &structures,
            &KineticsParams {
                meandark: 1000.0,
                meanbright: 300.0,
                time: 100.0,
                photonrate: 10.0,
                photonbudget: 1,
                ..scenario()
            },
            seed,
        )
        .unwrap();
        assert!(table.site_totals()[0] <= 1);
    }
}

#[test]
fn zpsf_at_focus_returns_constant_terms() {
    let calibration = ZCalibration::default();
    assert_eq!(
        calculate_zpsf(0.0, &calibration),
        (calibration.cx[6], calibration.cy[6])
    );
}

#[test]
fn full_pipeline_from_geometry_to_frames() {
    let template = StructureTemplate::define(
        &[0.0, 40.0, 0.0, 40.0],
        &[0.0, 0.0, 40.0, 40.0],
        &[1, 1, 1, 1],
        &[-100.0, 100.0, -50.0, 50.0],
        160.0,
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let positions = generate_positions(4, 24.0, 4.0, Arrangement::Grid, &mut rng);
    let structures = prepare_structures(&template, &positions, true, 1.0, false, &mut rng);
    assert_eq!(structures.len(), 16);

    let params = SimulationParams {
        frames: 60,
        time: 100.0,
        meandark: 1500.0,
        meanbright: 400.0,
        photonrate: 5.0,
        photonratestd: 1.0,
        photonbudget: 4_000,
        simple: false,
        imagesize: 24,
        background: 3.0,
        mode3d: true,
        seed: 99,
        ..Default::default()
    };
    let first = Simulation::new(params.clone(), structures.clone())
        .run()
        .unwrap();
    let second = Simulation::new(params, structures).run().unwrap();

    assert_eq!(first.frames.len(), 60);
    assert_eq!(first.frames, second.frames);
    assert!(first
        .photons
        .site_totals()
        .iter()
        .all(|&total| total <= 4_000));
    assert_eq!(first.info.kinetics.len(), 16);
}
