use crate::core::geometry::rotations::{rmat_of_exp_map, vinv_to_matrix};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Inverse stretch of an unstrained grain, in Mandel-Voigt notation.
pub const VINV_REF: [f64; 6] = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0];

/// Per-grain simulation parameters.
///
/// Flattened, the layout is `[exp_map(3), centroid(3), vinv(6)]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrainParams {
    /// Orientation as an exponential map (angle times unit axis).
    pub exp_map: Vector3<f64>,
    /// Centroid position in the sample frame.
    pub centroid: Vector3<f64>,
    /// Inverse stretch tensor in Mandel-Voigt notation.
    pub vinv: [f64; 6],
}

impl GrainParams {
    pub fn new(exp_map: Vector3<f64>, centroid: Vector3<f64>) -> Self {
        Self {
            exp_map,
            centroid,
            vinv: VINV_REF,
        }
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        rmat_of_exp_map(&self.exp_map)
    }

    pub fn stretch(&self) -> Matrix3<f64> {
        vinv_to_matrix(&self.vinv)
    }

    pub fn to_array(&self) -> [f64; 12] {
        let mut out = [0.0; 12];
        out[0..3].copy_from_slice(self.exp_map.as_slice());
        out[3..6].copy_from_slice(self.centroid.as_slice());
        out[6..12].copy_from_slice(&self.vinv);
        out
    }
}

impl From<[f64; 12]> for GrainParams {
    fn from(p: [f64; 12]) -> Self {
        Self {
            exp_map: Vector3::new(p[0], p[1], p[2]),
            centroid: Vector3::new(p[3], p[4], p[5]),
            vinv: [p[6], p[7], p[8], p[9], p[10], p[11]],
        }
    }
}

impl From<GrainParams> for [f64; 12] {
    fn from(params: GrainParams) -> Self {
        params.to_array()
    }
}
