use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

/// Magnitude below which a vector is treated as zero when building frames.
pub const SQRT_EPSF: f64 = 1.4901161193847656e-8;

/// Default incident beam direction in the lab frame.
pub const BEAM_VEC: [f64; 3] = [0.0, 0.0, -1.0];

/// Default azimuthal reference direction in the lab frame.
pub const ETA_VEC: [f64; 3] = [1.0, 0.0, 0.0];

/// Detector rotation from tilt angles `[tx, ty, tz]` in radians, composed as `Rz·Ry·Rx`.
pub fn make_detector_rmat(tilt_angles: &[f64; 3]) -> Matrix3<f64> {
    Rotation3::from_euler_angles(tilt_angles[0], tilt_angles[1], tilt_angles[2]).into_inner()
}

/// Oscillation stage rotation `Rx(chi)·Ry(omega)`.
///
/// Written out in closed form because it sits in the innermost loop of the projection.
#[inline]
pub fn make_oscill_rmat(chi: f64, omega: f64) -> Matrix3<f64> {
    let (sx, cx) = chi.sin_cos();
    let (sw, cw) = omega.sin_cos();
    Matrix3::new(
        cw,
        0.0,
        sw,
        sx * sw,
        cx,
        -sx * cw,
        -cx * sw,
        sx,
        cx * cw,
    )
}

/// Rotation matrix of an exponential map (angle times unit axis).
pub fn rmat_of_exp_map(exp_map: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::from_scaled_axis(*exp_map).into_inner()
}

/// Symmetric matrix of an inverse stretch tensor given in Mandel-Voigt notation.
pub fn vinv_to_matrix(vinv: &[f64; 6]) -> Matrix3<f64> {
    let s4 = vinv[3] / SQRT_2;
    let s5 = vinv[4] / SQRT_2;
    let s6 = vinv[5] / SQRT_2;
    Matrix3::new(vinv[0], s6, s5, s6, vinv[1], s4, s5, s4, vinv[2])
}

/// The beam coordinate frame: beam direction plus the azimuthal (eta) reference.
///
/// Columns of `rmat` are the frame axes expressed in the lab frame; the frame's
/// Z axis points against the beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamFrame {
    pub beam_hat: Vector3<f64>,
    pub rmat: Matrix3<f64>,
}

impl BeamFrame {
    /// Builds the frame, returning `None` for a zero-magnitude beam or a beam
    /// colinear with the eta reference.
    pub fn new(beam_vec: &Vector3<f64>, eta_vec: &Vector3<f64>) -> Option<Self> {
        let beam_mag = beam_vec.norm();
        if beam_mag < SQRT_EPSF {
            return None;
        }
        let z_axis = -beam_vec / beam_mag;

        let y_axis = z_axis.cross(eta_vec);
        let y_mag = y_axis.norm();
        if y_mag < SQRT_EPSF {
            return None;
        }
        let y_axis = y_axis / y_mag;
        let x_axis = y_axis.cross(&z_axis);

        Some(Self {
            beam_hat: beam_vec / beam_mag,
            rmat: Matrix3::from_columns(&[x_axis, y_axis, z_axis]),
        })
    }
}

impl Default for BeamFrame {
    fn default() -> Self {
        Self {
            beam_hat: Vector3::from(BEAM_VEC),
            rmat: Matrix3::identity(),
        }
    }
}
