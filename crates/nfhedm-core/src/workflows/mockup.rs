use crate::core::instrument::InstrumentConfig;
use crate::core::models::experiment::{ConfigError, Experiment, ExperimentBuilder, OmegaScan};
use crate::core::models::grain::GrainParams;
use crate::core::planedata::{CubicMaterial, LatticeCentering};
use itertools::iproduct;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use std::f64::consts::TAU;
use tracing::{info, instrument};

/// Recipe for a synthetic experiment: a few grains, each filling a small cube
/// of centroids, seen by the detector of an instrument file.
#[derive(Debug, Clone, PartialEq)]
pub struct MockupSpec {
    /// Unit quaternions `[w, x, y, z]`, one per grain.
    pub quaternions: Vec<[f64; 4]>,
    /// Centroid offset of every grain's cube (mm).
    pub offsets: Vec<[f64; 3]>,
    /// The cube holds `(2n + 1)^3` centroids.
    pub cube_half_width: usize,
    /// Distance between neighbouring centroids (mm).
    pub cube_spacing: f64,
    /// Material; its 2θ cutoff is replaced by the largest angle the detector sees.
    pub material: CubicMaterial,
    pub omega_period: (f64, f64),
    pub omega_step: f64,
    /// Largest voxel diameter (mm) the tolerance must cover.
    pub max_diameter: f64,
}

impl MockupSpec {
    /// Two gold grains offset by 0.1 mm in x and y.
    pub fn gold_cubes() -> Self {
        Self {
            quaternions: vec![
                [0.91836393, 0.33952917, 0.17216207, 0.10811041],
                [0.90869942, 0.1834835, 0.10095837, 0.36111851],
            ],
            offsets: vec![[0.0, 0.0, 0.0], [0.1, 0.1, 0.0]],
            cube_half_width: 25,
            cube_spacing: 1e-3,
            material: CubicMaterial {
                name: "gold".to_string(),
                lattice_parameter: 4.0782,
                centering: LatticeCentering::FaceCentered,
                hkl_max: 200,
                beam_energy_kev: 52.0,
                two_theta_max: None,
            },
            omega_period: (0.0, TAU),
            omega_step: 1f64.to_radians(),
            max_diameter: 3f64.sqrt() * 0.005,
        }
    }

    pub fn n_grains(&self) -> usize {
        self.quaternions.len()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.quaternions.is_empty() {
            return Err(ConfigError::MissingParameter("quaternions"));
        }
        if self.offsets.len() != self.quaternions.len() {
            return Err(ConfigError::InvalidParameter {
                name: "offsets",
                reason: format!(
                    "{} offsets for {} grains",
                    self.offsets.len(),
                    self.quaternions.len()
                ),
            });
        }
        let degenerate = self
            .quaternions
            .iter()
            .any(|q| !q.iter().all(|v| v.is_finite()) || q.iter().all(|&v| v == 0.0));
        if degenerate {
            return Err(ConfigError::InvalidParameter {
                name: "quaternions",
                reason: "quaternions must be finite and non-zero".to_string(),
            });
        }
        if !(self.cube_spacing.is_finite() && self.cube_spacing >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "cube_spacing",
                reason: "spacing must be a non-negative length".to_string(),
            });
        }
        if !(self.max_diameter.is_finite() && self.max_diameter >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "max_diameter",
                reason: "diameter must be a non-negative length".to_string(),
            });
        }
        Ok(())
    }
}

/// A synthetic experiment together with the grains that populate it.
#[derive(Debug, Clone)]
pub struct Mockup {
    pub grain_params: Vec<GrainParams>,
    pub experiment: Experiment,
}

/// Rotation angle times unit axis of the quaternion `[w, x, y, z]`.
pub fn exp_map_of_quaternion(q: [f64; 4]) -> Vector3<f64> {
    let [w, x, y, z] = q;
    UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)).scaled_axis()
}

/// `n` evenly spaced values from `min` to `max` inclusive.
pub fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            (0..n).map(|i| min + step * i as f64).collect()
        }
    }
}

/// Every combination of `axis` values, ordered with y slowest and z fastest.
fn grid_of(axis: &[f64]) -> Vec<Vector3<f64>> {
    iproduct!(axis.iter(), axis.iter(), axis.iter())
        .map(|(&y, &x, &z)| Vector3::new(x, y, z))
        .collect()
}

/// Cubic lattice of `(2n + 1)^3` centroids around `offset`.
pub fn centroid_cube(half_width: usize, spacing: f64, offset: [f64; 3]) -> Vec<Vector3<f64>> {
    let n = half_width as i64;
    let axis: Vec<f64> = (-n..=n).map(|i| i as f64 * spacing).collect();
    let offset = Vector3::from(offset);
    grid_of(&axis).into_iter().map(|c| c + offset).collect()
}

/// Search voxels of a cube spanning `[min, max]` on every axis with `n` points per axis.
pub fn search_grid(min: f64, max: f64, n: usize) -> Vec<Vector3<f64>> {
    grid_of(&linspace(min, max, n))
}

/// Pixels needed to cover half of `max_diameter`.
pub fn dilation_radius(max_diameter: f64, pixel_pitch: f64) -> usize {
    (0.5 * max_diameter / pixel_pitch).ceil().max(0.0) as usize
}

fn experiment_builder(
    spec: &MockupSpec,
    instrument: &InstrumentConfig,
    exp_maps: &[Vector3<f64>],
) -> ExperimentBuilder {
    let detector = instrument.detector();
    let [row_ps, col_ps] = detector.pixel_size;
    Experiment::builder()
        .detector(detector)
        .chi(instrument.chi())
        .stage_translation(instrument.stage_translation())
        .omega_scan(OmegaScan::full(spec.omega_period, spec.omega_step))
        .grain_orientations(exp_maps.iter().copied())
        .dilation(
            dilation_radius(spec.max_diameter, row_ps),
            dilation_radius(spec.max_diameter, col_ps),
        )
}

/// Assembles the synthetic experiment described by `spec`.
///
/// The material only keeps reflections the detector can see, i.e. with a
/// Bragg angle no larger than that of the outermost pixel edge.
#[instrument(skip_all, name = "mockup_experiment")]
pub fn build(spec: &MockupSpec, instrument: &InstrumentConfig) -> Result<Mockup, ConfigError> {
    spec.validate()?;
    let exp_maps: Vec<Vector3<f64>> = spec
        .quaternions
        .iter()
        .map(|&q| exp_map_of_quaternion(q))
        .collect();

    let probe = experiment_builder(spec, instrument, &exp_maps)
        .plane_data(&spec.material)
        .build()?;
    let material = spec
        .material
        .clone()
        .with_two_theta_max(probe.max_pixel_two_theta());
    let experiment = experiment_builder(spec, instrument, &exp_maps)
        .plane_data(&material)
        .build()?;

    let grain_params: Vec<GrainParams> = exp_maps
        .iter()
        .zip(&spec.offsets)
        .flat_map(|(&exp_map, &offset)| {
            centroid_cube(spec.cube_half_width, spec.cube_spacing, offset)
                .into_iter()
                .map(move |centroid| GrainParams::new(exp_map, centroid))
        })
        .collect();

    info!(
        grains = experiment.n_grains(),
        grain_params = grain_params.len(),
        reflections = experiment.reflections().len(),
        frames = experiment.n_frames(),
        dilation = ?experiment.dilation(),
        "Mock experiment ready."
    );
    Ok(Mockup {
        grain_params,
        experiment,
    })
}
