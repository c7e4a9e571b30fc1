use super::rotations::{BeamFrame, make_oscill_rmat};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

const FULL_CIRCLE_TOL: f64 = 1e-9;

/// Diffraction angles of one reflection: Bragg angle `2θ`, azimuth `η` and
/// oscillation angle `ω`, all in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReflectionAngles {
    pub two_theta: f64,
    pub eta: f64,
    pub omega: f64,
}

impl ReflectionAngles {
    pub const NAN: Self = Self {
        two_theta: f64::NAN,
        eta: f64::NAN,
        omega: f64::NAN,
    };

    pub fn new(two_theta: f64, eta: f64, omega: f64) -> Self {
        Self {
            two_theta,
            eta,
            omega,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.two_theta.is_finite() && self.eta.is_finite() && self.omega.is_finite()
    }
}

/// Maps `angle` into the half-open period `[lo, hi)`.
#[inline]
pub fn map_angle(angle: f64, period: (f64, f64)) -> f64 {
    let (lo, hi) = period;
    lo + (angle - lo).rem_euclid(hi - lo)
}

/// Whether `angle` lies on the counter-clockwise arc from `start` to `stop`.
///
/// A range spanning a full turn accepts every finite angle; NaN is never accepted.
pub fn angle_in_range(angle: f64, start: f64, stop: f64) -> bool {
    if !angle.is_finite() {
        return false;
    }
    if (stop - start).abs() >= TAU - FULL_CIRCLE_TOL {
        return true;
    }
    let offset = (angle - start).rem_euclid(TAU);
    let span = (stop - start).rem_euclid(TAU);
    offset <= span
}

/// Keeps the reflections whose eta falls in any of `eta_ranges` and whose
/// omega falls in any of `omega_ranges`; non-diffracting (NaN) rows are dropped.
pub fn filter_by_ranges(
    angles: impl IntoIterator<Item = ReflectionAngles>,
    eta_ranges: &[(f64, f64)],
    omega_ranges: &[(f64, f64)],
) -> Vec<ReflectionAngles> {
    angles
        .into_iter()
        .filter(|a| {
            eta_ranges
                .iter()
                .any(|&(lo, hi)| angle_in_range(a.eta, lo, hi))
                && omega_ranges
                    .iter()
                    .any(|&(lo, hi)| angle_in_range(a.omega, lo, hi))
        })
        .collect()
}

/// Solves the Bragg condition on the oscillation axis for each reciprocal
/// lattice vector `hkl`.
///
/// Every hkl has two candidate omega solutions; the result holds both, as
/// `[first, second]`. A vector that cannot reach the diffraction condition
/// yields [`ReflectionAngles::NAN`] for both entries instead of an error so the
/// caller can filter in a single pass.
pub fn oscillation_angles_of_hkls(
    hkls: &[Vector3<f64>],
    chi: f64,
    rmat_c: &Matrix3<f64>,
    b_matrix: &Matrix3<f64>,
    wavelength: f64,
    vinv: &Matrix3<f64>,
    beam: &BeamFrame,
) -> Vec<[ReflectionAngles; 2]> {
    let (schi, cchi) = chi.sin_cos();
    let b = beam.beam_hat;
    let to_beam = beam.rmat.transpose();

    hkls.iter()
        .map(|hkl| {
            let gvec_s = vinv * (rmat_c * (b_matrix * hkl));
            let gnorm = gvec_s.norm();
            let ghat_s = gvec_s / gnorm;

            let sin_theta = 0.5 * wavelength * gnorm;
            let two_theta = 2.0 * sin_theta.asin();

            let a = ghat_s[2] * b[0] + schi * ghat_s[0] * b[1] - cchi * ghat_s[0] * b[2];
            let bb = ghat_s[0] * b[0] - schi * ghat_s[2] * b[1] + cchi * ghat_s[2] * b[2];
            let c = -sin_theta - cchi * ghat_s[1] * b[1] - schi * ghat_s[1] * b[2];

            let ab_mag = (a * a + bb * bb).sqrt();
            let phase = bb.atan2(a);
            let rhs = c / ab_mag;
            if !(rhs.abs() <= 1.0) || !two_theta.is_finite() {
                return [ReflectionAngles::NAN; 2];
            }
            let rhs_angle = rhs.asin();

            let omegas = [rhs_angle - phase, PI - rhs_angle - phase];
            omegas.map(|omega| {
                let gvec_l = make_oscill_rmat(chi, omega) * ghat_s;
                let gvec_e = to_beam * gvec_l;
                ReflectionAngles {
                    two_theta,
                    eta: map_angle(gvec_e[1].atan2(gvec_e[0]), (-PI, PI)),
                    omega: map_angle(omega, (-PI, PI)),
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    #[test]
    fn map_angle_wraps_into_half_open_period() {
        assert!(f64_approx_equal(map_angle(-FRAC_PI_2, (0.0, TAU)), 1.5 * PI));
        assert!(f64_approx_equal(map_angle(TAU + 0.25, (0.0, TAU)), 0.25));
        assert!(f64_approx_equal(map_angle(PI, (-PI, PI)), -PI));
        assert!(f64_approx_equal(map_angle(0.3, (-PI, PI)), 0.3));
    }

    #[test]
    fn full_circle_range_accepts_every_finite_angle() {
        assert!(angle_in_range(-3.0, -PI, PI));
        assert!(angle_in_range(100.0, 0.0, TAU));
        assert!(!angle_in_range(f64::NAN, 0.0, TAU));
    }

    #[test]
    fn partial_range_respects_counter_clockwise_arc() {
        assert!(angle_in_range(0.5, 0.0, 1.0));
        assert!(angle_in_range(0.5 + TAU, 0.0, 1.0));
        assert!(!angle_in_range(1.5, 0.0, 1.0));
        assert!(angle_in_range(-0.1, -0.2, 0.2));
        assert!(!angle_in_range(PI, -0.2, 0.2));
    }

    #[test]
    fn filter_by_ranges_drops_nan_and_out_of_range_rows() {
        let rows = vec![
            ReflectionAngles::new(0.1, 0.0, 0.5),
            ReflectionAngles::NAN,
            ReflectionAngles::new(0.1, 0.0, 2.0),
        ];
        let kept = filter_by_ranges(rows, &[(-PI, PI)], &[(0.0, 1.0)]);
        assert_eq!(kept.len(), 1);
        assert!(f64_approx_equal(kept[0].omega, 0.5));
    }

    #[test]
    fn identity_grain_diffracts_100_on_the_horizontal_axis() {
        let a = 4.0;
        let wavelength = 0.25;
        let b_matrix = Matrix3::identity() / a;
        let solutions = oscillation_angles_of_hkls(
            &[Vector3::new(1.0, 0.0, 0.0)],
            0.0,
            &Matrix3::identity(),
            &b_matrix,
            wavelength,
            &Matrix3::identity(),
            &BeamFrame::default(),
        );

        let theta = (0.5 * wavelength / a).asin();
        let [first, second] = solutions[0];
        assert!(f64_approx_equal(first.two_theta, 2.0 * theta));
        assert!(f64_approx_equal(first.omega, -theta));
        assert!(f64_approx_equal(first.eta, 0.0));
        assert!(f64_approx_equal(second.omega, map_angle(PI + theta, (-PI, PI))));
        assert!(f64_approx_equal(second.eta.abs(), PI));
    }

    #[test]
    fn solutions_satisfy_the_bragg_condition() {
        let b_matrix = Matrix3::identity() / 4.0782;
        let rmat_c = super::super::rotations::rmat_of_exp_map(&Vector3::new(0.3, -0.2, 0.7));
        let hkls = [
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(-2.0, 2.0, 0.0),
            Vector3::new(3.0, -1.0, 1.0),
        ];
        let wavelength = 0.2384;
        let chi = 0.01;
        let beam = BeamFrame::default();

        for (hkl, pair) in hkls.iter().zip(oscillation_angles_of_hkls(
            &hkls,
            chi,
            &rmat_c,
            &b_matrix,
            wavelength,
            &Matrix3::identity(),
            &beam,
        )) {
            let ghat_s = (rmat_c * (b_matrix * hkl)).normalize();
            for angles in pair.iter().filter(|a| a.is_finite()) {
                let ghat_l = make_oscill_rmat(chi, angles.omega) * ghat_s;
                let sin_theta = (0.5 * angles.two_theta).sin();
                assert!(f64_approx_equal(ghat_l.dot(&beam.beam_hat), -sin_theta));
            }
        }
    }

    #[test]
    fn unreachable_reflection_yields_nan_sentinels() {
        let solutions = oscillation_angles_of_hkls(
            &[Vector3::new(1.0, 0.0, 0.0)],
            0.0,
            &Matrix3::identity(),
            &Matrix3::identity(),
            3.0,
            &Matrix3::identity(),
            &BeamFrame::default(),
        );
        assert!(solutions[0].iter().all(|a| !a.is_finite()));
    }
}
