use super::config::ToleranceStrategy;
use super::tasks::angle_table::AngleTable;
use super::tasks::dilate::has_lit_neighbour;
use crate::core::geometry::projection::project_reflection;
use crate::core::models::experiment::Experiment;
use crate::core::models::volume::ImageVolume;
use nalgebra::{Matrix3, Vector3};

/// Outcome of testing one grain orientation at one voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// `hits` of the `total` predicted spots that landed on the sensor were lit.
    Evaluated { hits: usize, total: usize },
    /// No predicted spot landed on the sensor.
    NoValidReflections,
}

impl Score {
    pub fn confidence(&self) -> f64 {
        match *self {
            Self::Evaluated { hits, total } if total > 0 => hits as f64 / total as f64,
            _ => 0.0,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self, Self::Evaluated { .. })
    }
}

/// Scores the grain described by `table`/`rmat_c` placed at `coord`.
///
/// With [`ToleranceStrategy::DilatedVolume`] `volume` must already be dilated
/// by the experiment's radii; with [`ToleranceStrategy::Neighbourhood`] it is
/// the raw image stack.
pub fn score(
    table: &AngleTable,
    rmat_c: &Matrix3<f64>,
    coord: &Vector3<f64>,
    experiment: &Experiment,
    volume: &ImageVolume,
    strategy: ToleranceStrategy,
) -> Score {
    let geometry = experiment.geometry();
    let quantizer = experiment.quantizer();
    let (row_radius, col_radius) = experiment.dilation();

    let mut hits = 0usize;
    let mut total = 0usize;
    for angles in &table.rows {
        let Some((xy, _)) =
            project_reflection(angles, geometry, rmat_c, coord, experiment.distortion())
        else {
            continue;
        };
        let Some(idx) = quantizer.quantize_point(xy, angles.omega) else {
            continue;
        };
        total += 1;
        let lit = match strategy {
            ToleranceStrategy::DilatedVolume => volume.get(idx),
            ToleranceStrategy::Neighbourhood => {
                has_lit_neighbour(volume, idx, row_radius, col_radius)
            }
        };
        if lit {
            hits += 1;
        }
    }

    if total == 0 {
        Score::NoValidReflections
    } else {
        Score::Evaluated { hits, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::controller::NullController;
    use crate::engine::tasks::angle_table::evaluate_diffraction_angles;
    use crate::engine::tasks::dilate::dilate;
    use crate::engine::tasks::simulate::simulate;
    use crate::engine::tasks::test_support::{
        gold_experiment, grain_at, single_reflection_experiment,
    };

    struct Fixture {
        experiment: Experiment,
        tables: Vec<AngleTable>,
        raw: ImageVolume,
        dilated: ImageVolume,
    }

    fn fixture(experiment: Experiment) -> Fixture {
        let grain = grain_at(&experiment, Vector3::zeros());
        let raw = simulate(&[grain], &experiment, &NullController);
        let (r, c) = experiment.dilation();
        let dilated = dilate(&raw, r, c, &NullController);
        let tables = evaluate_diffraction_angles(&experiment, &NullController);
        Fixture {
            experiment,
            tables,
            raw,
            dilated,
        }
    }

    impl Fixture {
        fn score_at(&self, coord: Vector3<f64>, strategy: ToleranceStrategy) -> Score {
            let volume = match strategy {
                ToleranceStrategy::DilatedVolume => &self.dilated,
                ToleranceStrategy::Neighbourhood => &self.raw,
            };
            score(
                &self.tables[0],
                &self.experiment.grains()[0].rmat,
                &coord,
                &self.experiment,
                volume,
                strategy,
            )
        }
    }

    #[test]
    fn true_centroid_scores_one() {
        let f = fixture(gold_experiment());
        let s = f.score_at(Vector3::zeros(), ToleranceStrategy::DilatedVolume);
        assert!(matches!(s, Score::Evaluated { total, .. } if total > 0));
        assert_eq!(s.confidence(), 1.0);
    }

    #[test]
    fn distant_centroid_scores_zero() {
        let f = fixture(single_reflection_experiment());
        let s = f.score_at(Vector3::new(0.0, 0.5, 0.0), ToleranceStrategy::DilatedVolume);
        assert_eq!(s, Score::Evaluated { hits: 0, total: 2 });
        assert_eq!(s.confidence(), 0.0);
    }

    #[test]
    fn voxel_with_no_spot_on_the_sensor_is_not_evaluated() {
        let f = fixture(single_reflection_experiment());
        let s = f.score_at(Vector3::new(0.0, 50.0, 0.0), ToleranceStrategy::DilatedVolume);
        assert_eq!(s, Score::NoValidReflections);
        assert_eq!(s.confidence(), 0.0);
        assert!(!s.is_evaluated());
    }

    #[test]
    fn confidence_stays_within_bounds() {
        let f = fixture(gold_experiment());
        for step in -5..=5 {
            let coord = Vector3::new(0.01 * step as f64, -0.007 * step as f64, 0.0);
            let c = f.score_at(coord, ToleranceStrategy::DilatedVolume).confidence();
            assert!((0.0..=1.0).contains(&c), "confidence {} at step {}", c, step);
        }
    }

    #[test]
    fn both_strategies_agree() {
        let f = fixture(gold_experiment());
        for step in -4..=4 {
            let coord = Vector3::new(0.013 * step as f64, 0.009 * step as f64, -0.005 * step as f64);
            assert_eq!(
                f.score_at(coord, ToleranceStrategy::DilatedVolume),
                f.score_at(coord, ToleranceStrategy::Neighbourhood),
            );
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let f = fixture(gold_experiment());
        let coord = Vector3::new(0.02, -0.01, 0.03);
        let first = f.score_at(coord, ToleranceStrategy::DilatedVolume);
        for _ in 0..3 {
            assert_eq!(f.score_at(coord, ToleranceStrategy::DilatedVolume), first);
        }
    }
}
