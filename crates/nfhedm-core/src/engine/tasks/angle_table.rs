use crate::core::geometry::angles::{
    ReflectionAngles, filter_by_ranges, map_angle, oscillation_angles_of_hkls,
};
use crate::core::geometry::projection::project_reflection;
use crate::core::models::experiment::{CandidateGrain, Experiment};
use crate::engine::controller::Controller;
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, instrument};

/// Margin (mm) added around the panel when deciding which reflections a grain
/// can ever place on the detector.
pub const PANEL_MARGIN: f64 = 10.0;

/// Predicted reflection angles of one candidate grain, reused for every voxel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AngleTable {
    pub rows: Vec<ReflectionAngles>,
}

impl AngleTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reflection angles of a grain at `rmat_c` with stretch `vinv`, restricted to
/// the experiment's eta and omega ranges, with omega mapped into the scan period.
pub fn reflection_angles(
    experiment: &Experiment,
    rmat_c: &Matrix3<f64>,
    vinv: &Matrix3<f64>,
) -> Vec<ReflectionAngles> {
    let geometry = experiment.geometry();
    let reflections = experiment.reflections();
    let scan = experiment.scan();

    let solutions = oscillation_angles_of_hkls(
        &reflections.hkls,
        geometry.chi,
        rmat_c,
        &reflections.b_matrix,
        reflections.wavelength,
        vinv,
        &geometry.beam,
    );
    let mut angles = filter_by_ranges(
        solutions.into_iter().flatten(),
        experiment.eta_ranges(),
        &scan.ranges,
    );
    for a in &mut angles {
        a.omega = map_angle(a.omega, scan.period);
    }
    angles
}

fn table_for_grain(experiment: &Experiment, grain: &CandidateGrain) -> AngleTable {
    let ((x_min, y_min), (x_max, y_max)) = experiment.detector().panel_dims();
    let (x_lo, x_hi) = (x_min - PANEL_MARGIN, x_max + PANEL_MARGIN);
    let (y_lo, y_hi) = (y_min - PANEL_MARGIN, y_max + PANEL_MARGIN);
    let origin = Vector3::zeros();

    let rows = reflection_angles(experiment, &grain.rmat, &Matrix3::identity())
        .into_iter()
        .filter(|a| {
            project_reflection(a, experiment.geometry(), &grain.rmat, &origin, None).is_some_and(
                |([x, y], _)| (x_lo..=x_hi).contains(&x) && (y_lo..=y_hi).contains(&y),
            )
        })
        .collect();
    AngleTable { rows }
}

/// Angle tables for every candidate grain, in grain order.
#[instrument(skip_all, name = "evaluate_diffraction_angles")]
pub fn evaluate_diffraction_angles(
    experiment: &Experiment,
    controller: &dyn Controller,
) -> Vec<AngleTable> {
    const PHASE: &str = "evaluate diffraction angles";
    controller.start(PHASE, experiment.n_grains());

    let tables: Vec<AngleTable> = experiment
        .grains()
        .iter()
        .enumerate()
        .map(|(i, grain)| {
            let table = table_for_grain(experiment, grain);
            debug!(grain = i, reflections = table.len(), "Angle table ready.");
            controller.update(i + 1);
            table
        })
        .collect();

    controller.finish(PHASE);
    tables
}
