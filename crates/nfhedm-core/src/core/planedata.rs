use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// `h·c` in keV·Å, used to convert beam energy to wavelength.
pub const KEV_ANGSTROM: f64 = 12.398419843320026;

/// Reflections a material can produce, with the data needed to solve for their angles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionTable {
    pub hkls: Vec<Vector3<f64>>,
    pub b_matrix: Matrix3<f64>,
    /// Radiation wavelength in Å.
    pub wavelength: f64,
}

impl ReflectionTable {
    pub fn len(&self) -> usize {
        self.hkls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hkls.is_empty()
    }
}

/// Source of crystallographic plane data.
pub trait PlaneDataProvider {
    fn reflection_table(&self) -> ReflectionTable;
}

impl PlaneDataProvider for ReflectionTable {
    fn reflection_table(&self) -> ReflectionTable {
        self.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LatticeCentering {
    Primitive,
    BodyCentered,
    FaceCentered,
}

impl LatticeCentering {
    /// Whether the centering's systematic absences allow this reflection.
    pub fn allows(&self, h: i32, k: i32, l: i32) -> bool {
        match self {
            Self::Primitive => true,
            Self::BodyCentered => (h + k + l).rem_euclid(2) == 0,
            Self::FaceCentered => {
                let parity = [h, k, l].map(|i| i.rem_euclid(2));
                parity.iter().all(|&p| p == parity[0])
            }
        }
    }
}

/// Cubic crystal with a single lattice parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubicMaterial {
    pub name: String,
    /// Lattice parameter in Å.
    pub lattice_parameter: f64,
    pub centering: LatticeCentering,
    /// Upper bound on `h² + k² + l²`.
    pub hkl_max: u32,
    pub beam_energy_kev: f64,
    /// Reflections with a larger Bragg angle (radians) are excluded.
    pub two_theta_max: Option<f64>,
}

impl CubicMaterial {
    pub fn wavelength(&self) -> f64 {
        KEV_ANGSTROM / self.beam_energy_kev
    }

    pub fn b_matrix(&self) -> Matrix3<f64> {
        Matrix3::identity() / self.lattice_parameter
    }

    pub fn with_two_theta_max(mut self, two_theta_max: f64) -> Self {
        self.two_theta_max = Some(two_theta_max);
        self
    }

    fn two_theta_of(&self, hkl: &Vector3<f64>) -> f64 {
        let sin_theta = 0.5 * self.wavelength() * (self.b_matrix() * hkl).norm();
        2.0 * sin_theta.asin()
    }
}

impl PlaneDataProvider for CubicMaterial {
    fn reflection_table(&self) -> ReflectionTable {
        let bound = (self.hkl_max as f64).sqrt().floor() as i32;
        let mut hkls = Vec::new();
        for h in -bound..=bound {
            for k in -bound..=bound {
                for l in -bound..=bound {
                    let norm_sq = (h * h + k * k + l * l) as u32;
                    if norm_sq == 0 || norm_sq > self.hkl_max {
                        continue;
                    }
                    if !self.centering.allows(h, k, l) {
                        continue;
                    }
                    let hkl = Vector3::new(h as f64, k as f64, l as f64);
                    match self.two_theta_max {
                        Some(limit) if !(self.two_theta_of(&hkl) <= limit) => continue,
                        _ => hkls.push(hkl),
                    }
                }
            }
        }
        ReflectionTable {
            hkls,
            b_matrix: self.b_matrix(),
            wavelength: self.wavelength(),
        }
    }
}
