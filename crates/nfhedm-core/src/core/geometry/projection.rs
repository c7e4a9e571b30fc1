use super::angles::ReflectionAngles;
use super::rotations::{BeamFrame, make_oscill_rmat};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

const ZTOL: f64 = f64::EPSILON;

/// Maps ideal detector coordinates onto distorted (measured) ones.
///
/// Only the capability is defined here; concrete correction models live with
/// whoever calibrates the detector.
pub trait Distortion: Send + Sync + Debug {
    fn distort(&self, xy: [f64; 2]) -> [f64; 2];
}

/// Fixed detector and stage geometry shared by every projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentGeometry {
    pub rmat_d: Matrix3<f64>,
    pub tvec_d: Vector3<f64>,
    pub chi: f64,
    pub tvec_s: Vector3<f64>,
    pub beam: BeamFrame,
}

/// Reflections that reached the detector plane.
///
/// The three vectors are aligned: entry `i` of each describes the same reflection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub xy: Vec<[f64; 2]>,
    pub rmat_s: Vec<Matrix3<f64>>,
    pub omega: Vec<f64>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.xy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xy.is_empty()
    }
}

/// Unit reciprocal lattice vector in the crystal frame for a set of diffraction angles.
pub fn angles_to_gvec(
    angles: &ReflectionAngles,
    chi: f64,
    rmat_c: &Matrix3<f64>,
    beam: &BeamFrame,
) -> Vector3<f64> {
    let (sin_theta, cos_theta) = (0.5 * angles.two_theta).sin_cos();
    let (sin_eta, cos_eta) = angles.eta.sin_cos();
    let gvec_b = Vector3::new(cos_theta * cos_eta, cos_theta * sin_eta, sin_theta);
    let gvec_l = beam.rmat * gvec_b;
    let gvec_s = make_oscill_rmat(chi, angles.omega).transpose() * gvec_l;
    rmat_c.transpose() * gvec_s
}

/// Intersects the diffracted ray of `gvec_c` with the detector plane.
///
/// Returns `[NaN, NaN]` when the vector does not satisfy a diffraction
/// geometry or the ray misses the plane.
pub fn gvec_to_detector_xy(
    gvec_c: &Vector3<f64>,
    geometry: &InstrumentGeometry,
    rmat_s: &Matrix3<f64>,
    rmat_c: &Matrix3<f64>,
    tvec_c: &Vector3<f64>,
) -> [f64; 2] {
    const MISS: [f64; 2] = [f64::NAN, f64::NAN];

    let beam_hat = geometry.beam.beam_hat;
    let normal = geometry.rmat_d.column(2).into_owned();
    let origin = geometry.tvec_s + rmat_s * tvec_c;
    let gvec_l = rmat_s * (rmat_c * gvec_c);

    let b_dot = -beam_hat.dot(&gvec_l);
    if !(ZTOL..=1.0 - ZTOL).contains(&b_dot) {
        return MISS;
    }

    let dvec_l = beam_hat - 2.0 * beam_hat.dot(&gvec_l) * gvec_l;
    let denom = normal.dot(&dvec_l);
    if denom >= -ZTOL {
        return MISS;
    }

    let u = normal.dot(&(geometry.tvec_d - origin)) / denom;
    if u <= 0.0 {
        return MISS;
    }

    let hit_l = origin + u * dvec_l;
    let hit_d = geometry.rmat_d.transpose() * (hit_l - geometry.tvec_d);
    [hit_d[0], hit_d[1]]
}

/// Bragg angle and azimuth of the ray from the sample point to detector position `xy`.
pub fn detector_xy_to_angles(
    xy: [f64; 2],
    geometry: &InstrumentGeometry,
    rmat_s: &Matrix3<f64>,
    tvec_c: &Vector3<f64>,
) -> (f64, f64) {
    let on_panel = geometry.rmat_d * Vector3::new(xy[0], xy[1], 0.0) + geometry.tvec_d;
    let dvec = on_panel - geometry.tvec_s - rmat_s * tvec_c;
    let dhat = dvec.normalize();

    let two_theta = geometry.beam.beam_hat.dot(&dhat).clamp(-1.0, 1.0).acos();
    let dvec_e = geometry.beam.rmat.transpose() * dhat;
    (two_theta, dvec_e[1].atan2(dvec_e[0]))
}

/// Projects a single reflection; `None` if it misses the detector.
#[inline]
pub fn project_reflection(
    angles: &ReflectionAngles,
    geometry: &InstrumentGeometry,
    rmat_c: &Matrix3<f64>,
    tvec_c: &Vector3<f64>,
    distortion: Option<&dyn Distortion>,
) -> Option<([f64; 2], Matrix3<f64>)> {
    let gvec_c = angles_to_gvec(angles, geometry.chi, rmat_c, &geometry.beam);
    let rmat_s = make_oscill_rmat(geometry.chi, angles.omega);
    let xy = gvec_to_detector_xy(&gvec_c, geometry, &rmat_s, rmat_c, tvec_c);
    if xy[0].is_nan() || xy[1].is_nan() {
        return None;
    }
    let xy = match distortion {
        Some(model) => model.distort(xy),
        None => xy,
    };
    Some((xy, rmat_s))
}

/// Projects reflection angles onto the detector plane for a crystal at `tvec_c`.
///
/// Reflections whose rays miss the detector are dropped together with their
/// omega, so the returned arrays stay aligned.
pub fn project(
    angles: &[ReflectionAngles],
    geometry: &InstrumentGeometry,
    rmat_c: &Matrix3<f64>,
    tvec_c: &Vector3<f64>,
    distortion: Option<&dyn Distortion>,
) -> Projection {
    let mut projection = Projection {
        xy: Vec::with_capacity(angles.len()),
        rmat_s: Vec::with_capacity(angles.len()),
        omega: Vec::with_capacity(angles.len()),
    };
    for reflection in angles {
        if let Some((xy, rmat_s)) =
            project_reflection(reflection, geometry, rmat_c, tvec_c, distortion)
        {
            projection.xy.push(xy);
            projection.rmat_s.push(rmat_s);
            projection.omega.push(reflection.omega);
        }
    }
    projection
}
