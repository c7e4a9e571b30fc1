use crate::core::geometry::projection::{Distortion, InstrumentGeometry, detector_xy_to_angles};
use crate::core::geometry::rotations::{
    BEAM_VEC, BeamFrame, ETA_VEC, make_detector_rmat, make_oscill_rmat, rmat_of_exp_map,
};
use crate::core::planedata::{PlaneDataProvider, ReflectionTable};
use crate::core::quantize::Quantizer;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Beam direction has zero magnitude or is colinear with the eta reference")]
    DegenerateBeam,
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn require_finite(name: &'static str, values: &[f64]) -> Result<(), ConfigError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(invalid(name, "values must be finite"))
    }
}

/// Flat area detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    /// Tilt angles `[tx, ty, tz]` in radians.
    pub tilt_angles: [f64; 3],
    /// Panel centre in the lab frame (mm).
    pub tvec: [f64; 3],
    /// Pixel pitch `[row, col]` in mm.
    pub pixel_size: [f64; 2],
    pub rows: usize,
    pub cols: usize,
}

impl Detector {
    pub fn rotation(&self) -> Matrix3<f64> {
        make_detector_rmat(&self.tilt_angles)
    }

    /// Panel extent as `((x_min, y_min), (x_max, y_max))`, centred on the origin.
    pub fn panel_dims(&self) -> ((f64, f64), (f64, f64)) {
        let half_x = 0.5 * self.cols as f64 * self.pixel_size[1];
        let half_y = 0.5 * self.rows as f64 * self.pixel_size[0];
        ((-half_x, -half_y), (half_x, half_y))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_finite("detector.tilt_angles", &self.tilt_angles)?;
        require_finite("detector.tvec", &self.tvec)?;
        if !self.pixel_size.iter().all(|&p| p.is_finite() && p > 0.0) {
            return Err(invalid("detector.pixel_size", "pixel pitch must be positive"));
        }
        if self.rows == 0 || self.cols == 0 {
            return Err(invalid("detector.rows", "detector must have at least one pixel"));
        }
        Ok(())
    }
}

const OMEGA_TOL: f64 = 1e-9;

/// Rotation scan: angular ranges, the period angles are reported in, and the frame step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmegaScan {
    pub ranges: Vec<(f64, f64)>,
    pub period: (f64, f64),
    pub step: f64,
}

impl OmegaScan {
    /// A single contiguous scan over `period`.
    pub fn full(period: (f64, f64), step: f64) -> Self {
        Self {
            ranges: vec![period],
            period,
            step,
        }
    }

    pub fn n_frames(&self) -> usize {
        self.ranges
            .iter()
            .map(|&(lo, hi)| ((hi - lo) / self.step).floor().max(0.0) as usize)
            .sum()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(invalid("omega.step", "step must be positive"));
        }
        if self.ranges.is_empty() {
            return Err(ConfigError::MissingParameter("omega.ranges"));
        }
        require_finite("omega.period", &[self.period.0, self.period.1])?;
        if self.period.1 <= self.period.0 {
            return Err(invalid("omega.period", "period must be increasing"));
        }
        for &(lo, hi) in &self.ranges {
            require_finite("omega.ranges", &[lo, hi])?;
            if hi <= lo {
                return Err(invalid("omega.ranges", "ranges must be increasing"));
            }
            if lo < self.period.0 - OMEGA_TOL || hi > self.period.1 + OMEGA_TOL {
                return Err(invalid("omega.ranges", "ranges must lie within the period"));
            }
        }
        // Frames are laid out on one linear axis starting at the first range.
        for pair in self.ranges.windows(2) {
            let ((lo, hi), (next_lo, _)) = (pair[0], pair[1]);
            if (next_lo - hi).abs() > OMEGA_TOL {
                return Err(invalid("omega.ranges", "ranges must be contiguous"));
            }
            let steps = (hi - lo) / self.step;
            if (steps - steps.round()).abs() > OMEGA_TOL * steps.max(1.0) {
                return Err(invalid(
                    "omega.ranges",
                    "every range but the last must span a whole number of steps",
                ));
            }
        }
        if self.n_frames() == 0 {
            return Err(invalid("omega.ranges", "scan yields no frames"));
        }
        Ok(())
    }
}

/// A candidate crystal orientation with its cached rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateGrain {
    pub exp_map: Vector3<f64>,
    pub rmat: Matrix3<f64>,
}

impl CandidateGrain {
    pub fn new(exp_map: Vector3<f64>) -> Self {
        Self {
            exp_map,
            rmat: rmat_of_exp_map(&exp_map),
        }
    }
}

/// Immutable snapshot of the acquisition geometry and candidate grains.
///
/// Built once through [`ExperimentBuilder`]; every downstream component only
/// ever borrows it.
#[derive(Debug, Clone)]
pub struct Experiment {
    detector: Detector,
    geometry: InstrumentGeometry,
    scan: OmegaScan,
    eta_ranges: Vec<(f64, f64)>,
    grains: Vec<CandidateGrain>,
    reflections: ReflectionTable,
    quantizer: Quantizer,
    row_dilation: usize,
    col_dilation: usize,
    distortion: Option<Arc<dyn Distortion>>,
}

impl Experiment {
    pub fn builder() -> ExperimentBuilder {
        ExperimentBuilder::new()
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn geometry(&self) -> &InstrumentGeometry {
        &self.geometry
    }

    pub fn scan(&self) -> &OmegaScan {
        &self.scan
    }

    pub fn eta_ranges(&self) -> &[(f64, f64)] {
        &self.eta_ranges
    }

    pub fn grains(&self) -> &[CandidateGrain] {
        &self.grains
    }

    pub fn n_grains(&self) -> usize {
        self.grains.len()
    }

    pub fn reflections(&self) -> &ReflectionTable {
        &self.reflections
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    pub fn n_frames(&self) -> usize {
        self.quantizer.n_frames
    }

    pub fn n_rows(&self) -> usize {
        self.detector.rows
    }

    pub fn n_cols(&self) -> usize {
        self.detector.cols
    }

    /// Tolerance radii `(rows, cols)` in pixels.
    pub fn dilation(&self) -> (usize, usize) {
        (self.row_dilation, self.col_dilation)
    }

    pub fn distortion(&self) -> Option<&dyn Distortion> {
        self.distortion.as_deref()
    }

    /// Largest Bragg angle seen by any pixel edge on the panel border, for a
    /// sample at the stage origin with omega at zero.
    pub fn max_pixel_two_theta(&self) -> f64 {
        max_pixel_two_theta(&self.detector, &self.geometry)
    }

    /// Serializable view of this experiment, without the distortion model.
    pub fn record(&self) -> ExperimentRecord {
        ExperimentRecord {
            detector: self.detector,
            chi: self.geometry.chi,
            stage_translation: self.geometry.tvec_s.into(),
            beam: self.geometry.beam,
            scan: self.scan.clone(),
            eta_ranges: self.eta_ranges.clone(),
            exp_maps: self.grains.iter().map(|g| g.exp_map).collect(),
            reflections: self.reflections.clone(),
            quantizer: self.quantizer,
            dilation: [self.row_dilation, self.col_dilation],
            has_distortion: self.distortion.is_some(),
        }
    }
}

fn max_pixel_two_theta(detector: &Detector, geometry: &InstrumentGeometry) -> f64 {
    let rmat_s = make_oscill_rmat(geometry.chi, 0.0);
    let origin = Vector3::zeros();
    let ((x_min, y_min), _) = detector.panel_dims();
    let [row_ps, col_ps] = detector.pixel_size;

    let xs = (0..=detector.cols).map(|i| x_min + i as f64 * col_ps);
    let ys = (0..=detector.rows).map(|j| y_min + j as f64 * row_ps);
    let x_max = x_min + detector.cols as f64 * col_ps;
    let y_max = y_min + detector.rows as f64 * row_ps;

    let border = xs
        .flat_map(|x| [[x, y_min], [x, y_max]])
        .chain(ys.flat_map(|y| [[x_min, y], [x_max, y]]));

    border
        .map(|xy| detector_xy_to_angles(xy, geometry, &rmat_s, &origin).0)
        .fold(0.0, f64::max)
}

/// Persistable snapshot of an [`Experiment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub detector: Detector,
    pub chi: f64,
    pub stage_translation: [f64; 3],
    pub beam: BeamFrame,
    pub scan: OmegaScan,
    pub eta_ranges: Vec<(f64, f64)>,
    pub exp_maps: Vec<Vector3<f64>>,
    pub reflections: ReflectionTable,
    pub quantizer: Quantizer,
    pub dilation: [usize; 2],
    pub has_distortion: bool,
}

/// Validating builder for [`Experiment`].
pub struct ExperimentBuilder {
    detector: Option<Detector>,
    chi: Option<f64>,
    stage_translation: Option<[f64; 3]>,
    beam_vec: [f64; 3],
    eta_vec: [f64; 3],
    scan: Option<OmegaScan>,
    eta_ranges: Vec<(f64, f64)>,
    exp_maps: Vec<Vector3<f64>>,
    reflections: Option<ReflectionTable>,
    dilation: Option<(usize, usize)>,
    distortion: Option<Arc<dyn Distortion>>,
}

impl Default for ExperimentBuilder {
    fn default() -> Self {
        Self {
            detector: None,
            chi: None,
            stage_translation: None,
            beam_vec: BEAM_VEC,
            eta_vec: ETA_VEC,
            scan: None,
            eta_ranges: vec![(-PI, PI)],
            exp_maps: Vec::new(),
            reflections: None,
            dilation: None,
            distortion: None,
        }
    }
}

impl ExperimentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detector(mut self, detector: Detector) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn chi(mut self, chi: f64) -> Self {
        self.chi = Some(chi);
        self
    }

    pub fn stage_translation(mut self, tvec_s: [f64; 3]) -> Self {
        self.stage_translation = Some(tvec_s);
        self
    }

    /// Overrides the beam direction and the eta reference.
    pub fn beam(mut self, beam_vec: [f64; 3], eta_vec: [f64; 3]) -> Self {
        self.beam_vec = beam_vec;
        self.eta_vec = eta_vec;
        self
    }

    pub fn omega_scan(mut self, scan: OmegaScan) -> Self {
        self.scan = Some(scan);
        self
    }

    pub fn eta_ranges(mut self, ranges: Vec<(f64, f64)>) -> Self {
        self.eta_ranges = ranges;
        self
    }

    pub fn grain_orientation(mut self, exp_map: Vector3<f64>) -> Self {
        self.exp_maps.push(exp_map);
        self
    }

    pub fn grain_orientations(mut self, exp_maps: impl IntoIterator<Item = Vector3<f64>>) -> Self {
        self.exp_maps.extend(exp_maps);
        self
    }

    pub fn plane_data(mut self, provider: &impl PlaneDataProvider) -> Self {
        self.reflections = Some(provider.reflection_table());
        self
    }

    pub fn dilation(mut self, row_dilation: usize, col_dilation: usize) -> Self {
        self.dilation = Some((row_dilation, col_dilation));
        self
    }

    pub fn distortion(mut self, distortion: Arc<dyn Distortion>) -> Self {
        self.distortion = Some(distortion);
        self
    }

    /// Validates every field and derives the quantizer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for any missing, non-finite or degenerate
    /// parameter. Nothing is simulated until this succeeds.
    pub fn build(self) -> Result<Experiment, ConfigError> {
        let detector = self
            .detector
            .ok_or(ConfigError::MissingParameter("detector"))?;
        detector.validate()?;

        let chi = self.chi.ok_or(ConfigError::MissingParameter("chi"))?;
        require_finite("chi", &[chi])?;
        let tvec_s = self
            .stage_translation
            .ok_or(ConfigError::MissingParameter("stage_translation"))?;
        require_finite("stage_translation", &tvec_s)?;

        require_finite("beam", &self.beam_vec)?;
        require_finite("eta_reference", &self.eta_vec)?;
        let beam = BeamFrame::new(&Vector3::from(self.beam_vec), &Vector3::from(self.eta_vec))
            .ok_or(ConfigError::DegenerateBeam)?;

        let scan = self.scan.ok_or(ConfigError::MissingParameter("omega_scan"))?;
        scan.validate()?;

        if self.eta_ranges.is_empty() {
            return Err(ConfigError::MissingParameter("eta_ranges"));
        }
        for &(lo, hi) in &self.eta_ranges {
            require_finite("eta_ranges", &[lo, hi])?;
        }

        if self.exp_maps.is_empty() {
            return Err(ConfigError::MissingParameter("grain_orientations"));
        }
        for exp_map in &self.exp_maps {
            require_finite("grain_orientations", exp_map.as_slice())?;
        }

        let reflections = self
            .reflections
            .ok_or(ConfigError::MissingParameter("plane_data"))?;
        if reflections.is_empty() {
            return Err(invalid("plane_data", "reflection table is empty"));
        }
        if !(reflections.wavelength.is_finite() && reflections.wavelength > 0.0) {
            return Err(invalid("plane_data", "wavelength must be positive"));
        }

        let (row_dilation, col_dilation) = self
            .dilation
            .ok_or(ConfigError::MissingParameter("dilation"))?;

        let [row_ps, col_ps] = detector.pixel_size;
        let quantizer = Quantizer::new(
            [
                -0.5 * detector.cols as f64 * col_ps,
                0.5 * detector.rows as f64 * row_ps,
                scan.ranges[0].0,
            ],
            [col_ps, -row_ps, scan.step],
            [detector.cols, detector.rows],
            scan.n_frames(),
        );

        let geometry = InstrumentGeometry {
            rmat_d: detector.rotation(),
            tvec_d: Vector3::from(detector.tvec),
            chi,
            tvec_s: Vector3::from(tvec_s),
            beam,
        };

        Ok(Experiment {
            detector,
            geometry,
            scan,
            eta_ranges: self.eta_ranges,
            grains: self.exp_maps.into_iter().map(CandidateGrain::new).collect(),
            reflections,
            quantizer,
            row_dilation,
            col_dilation,
            distortion: self.distortion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::planedata::{CubicMaterial, LatticeCentering};
    use std::f64::consts::TAU;

    fn detector() -> Detector {
        Detector {
            tilt_angles: [0.0; 3],
            tvec: [0.0, 0.0, -5.0],
            pixel_size: [0.02, 0.02],
            rows: 100,
            cols: 100,
        }
    }

    fn gold() -> CubicMaterial {
        CubicMaterial {
            name: "gold".to_string(),
            lattice_parameter: 4.0782,
            centering: LatticeCentering::FaceCentered,
            hkl_max: 12,
            beam_energy_kev: 52.0,
            two_theta_max: None,
        }
    }

    fn complete_builder() -> ExperimentBuilder {
        Experiment::builder()
            .detector(detector())
            .chi(0.0)
            .stage_translation([0.0; 3])
            .omega_scan(OmegaScan::full((0.0, TAU), 2f64.to_radians()))
            .grain_orientation(Vector3::zeros())
            .plane_data(&gold())
            .dilation(1, 1)
    }

    #[test]
    fn build_derives_quantizer_from_detector_and_scan() {
        let experiment = complete_builder().build().unwrap();
        let q = experiment.quantizer();
        assert_eq!(q.base, [-1.0, 1.0, 0.0]);
        assert_eq!(q.clip, [100, 100]);
        assert_eq!(q.n_frames, 180);
        assert!((q.inv_delta[0] - 50.0).abs() < 1e-9);
        assert!((q.inv_delta[1] + 50.0).abs() < 1e-9);
        assert_eq!(experiment.n_frames(), 180);
    }

    #[test]
    fn missing_detector_is_reported() {
        let err = Experiment::builder().chi(0.0).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("detector"));
    }

    #[test]
    fn missing_grains_are_reported() {
        let builder = ExperimentBuilder {
            exp_maps: Vec::new(),
            ..complete_builder()
        };
        assert_eq!(
            builder.build().unwrap_err(),
            ConfigError::MissingParameter("grain_orientations")
        );
    }

    #[test]
    fn zero_beam_is_a_configuration_error() {
        let err = complete_builder()
            .beam([0.0; 3], ETA_VEC)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DegenerateBeam);
    }

    #[test]
    fn non_positive_pixel_pitch_is_rejected() {
        let mut bad = detector();
        bad.pixel_size = [0.0, 0.02];
        let err = complete_builder().detector(bad).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter { name: "detector.pixel_size", .. }
        ));
    }

    #[test]
    fn scan_without_frames_is_rejected() {
        let scan = OmegaScan::full((0.0, 0.01), 0.1);
        let err = complete_builder().omega_scan(scan).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "omega.ranges", .. }));
    }

    #[test]
    fn frame_count_sums_floor_of_every_range() {
        let scan = OmegaScan {
            ranges: vec![(0.0, 1.0), (1.0, 2.55)],
            period: (0.0, TAU),
            step: 0.1,
        };
        assert_eq!(scan.n_frames(), 10 + 15);
    }

    #[test]
    fn split_scan_quantizes_onto_consecutive_frames() {
        let scan = OmegaScan {
            ranges: vec![(0.0, 1.0), (1.0, 2.55)],
            period: (0.0, TAU),
            step: 0.1,
        };
        let experiment = complete_builder().omega_scan(scan).build().unwrap();
        let q = experiment.quantizer();
        let frame = |omega: f64| q.quantize_point([0.0, 0.0], omega).unwrap().frame;
        assert_eq!(frame(0.05), 0);
        assert_eq!(frame(0.95), 9);
        assert_eq!(frame(1.05), 10);
        assert_eq!(frame(2.45), 24);
        assert_eq!(q.n_frames, 25);
    }

    #[test]
    fn scan_with_gap_between_ranges_is_rejected() {
        let scan = OmegaScan {
            ranges: vec![(0.0, 1.0), (2.0, 3.0)],
            period: (0.0, TAU),
            step: 0.1,
        };
        let err = complete_builder().omega_scan(scan).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "omega.ranges", .. }));
    }

    #[test]
    fn inner_range_with_partial_frame_is_rejected() {
        let scan = OmegaScan {
            ranges: vec![(0.0, 1.05), (1.05, 2.0)],
            period: (0.0, TAU),
            step: 0.1,
        };
        let err = complete_builder().omega_scan(scan).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "omega.ranges", .. }));
    }

    #[test]
    fn range_outside_period_is_rejected() {
        let scan = OmegaScan {
            ranges: vec![(-1.0, 1.0)],
            period: (0.0, TAU),
            step: 0.1,
        };
        let err = complete_builder().omega_scan(scan).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "omega.ranges", .. }));
    }

    #[test]
    fn max_two_theta_is_reached_at_panel_corner() {
        let experiment = complete_builder().build().unwrap();
        let expected = (2f64.sqrt() / 5.0).atan();
        assert!((experiment.max_pixel_two_theta() - expected).abs() < 1e-12);
    }

    #[test]
    fn record_captures_grains_and_quantizer() {
        let experiment = complete_builder()
            .grain_orientation(Vector3::new(0.1, 0.0, 0.0))
            .build()
            .unwrap();
        let record = experiment.record();
        assert_eq!(record.exp_maps.len(), 2);
        assert_eq!(record.quantizer, *experiment.quantizer());
        assert!(!record.has_distortion);
    }
}
