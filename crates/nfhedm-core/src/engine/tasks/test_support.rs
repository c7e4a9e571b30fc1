use crate::core::models::experiment::{Detector, Experiment, OmegaScan};
use crate::core::models::grain::GrainParams;
use crate::core::planedata::{CubicMaterial, LatticeCentering, PlaneDataProvider, ReflectionTable};
use nalgebra::{Matrix3, Vector3};
use std::f64::consts::TAU;

pub const GRAIN_EXP_MAP: [f64; 3] = [0.3, -0.2, 0.5];

pub fn small_detector() -> Detector {
    Detector {
        tilt_angles: [0.0; 3],
        tvec: [0.0, 0.0, -5.0],
        pixel_size: [0.02, 0.02],
        rows: 101,
        cols: 101,
    }
}

pub fn gold() -> CubicMaterial {
    CubicMaterial {
        name: "gold".to_string(),
        lattice_parameter: 4.0782,
        centering: LatticeCentering::FaceCentered,
        hkl_max: 20,
        beam_energy_kev: 52.0,
        two_theta_max: None,
    }
}

fn builder() -> crate::core::models::experiment::ExperimentBuilder {
    Experiment::builder()
        .detector(small_detector())
        .chi(0.0)
        .stage_translation([0.0; 3])
        .omega_scan(OmegaScan::full((0.0, TAU), 2f64.to_radians()))
        .dilation(1, 1)
}

/// Gold on a 2.02 mm panel with one general orientation as the only candidate.
pub fn gold_experiment() -> Experiment {
    let probe = builder()
        .grain_orientation(Vector3::from(GRAIN_EXP_MAP))
        .plane_data(&gold())
        .build()
        .unwrap();
    let material = gold().with_two_theta_max(probe.max_pixel_two_theta());
    builder()
        .grain_orientation(Vector3::from(GRAIN_EXP_MAP))
        .plane_data(&material)
        .build()
        .unwrap()
}

/// Identity grain diffracting only from (1 0 0): two spots on the horizontal
/// axis of the panel.
pub fn single_reflection_experiment() -> Experiment {
    let table = ReflectionTable {
        hkls: vec![Vector3::new(1.0, 0.0, 0.0)],
        b_matrix: Matrix3::identity() / 4.0782,
        wavelength: gold().reflection_table().wavelength,
    };
    builder()
        .grain_orientation(Vector3::zeros())
        .plane_data(&table)
        .build()
        .unwrap()
}

pub fn grain_at(experiment: &Experiment, centroid: Vector3<f64>) -> GrainParams {
    GrainParams::new(experiment.grains()[0].exp_map, centroid)
}
