use super::models::experiment::Detector;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PixelLayout {
    pub rows: usize,
    pub columns: usize,
    /// Pixel pitch `[row, col]` in mm.
    pub size: [f64; 2],
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct DetectorTransform {
    pub tilt_angles: [f64; 3],
    pub t_vec_d: [f64; 3],
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DetectorSection {
    pub pixels: PixelLayout,
    pub transform: DetectorTransform,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct OscillationStage {
    pub chi: f64,
    pub t_vec_s: [f64; 3],
}

/// Instrument description file: detector pixels and placement plus the
/// oscillation stage.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct InstrumentConfig {
    pub detector: DetectorSection,
    pub oscillation_stage: OscillationStage,
}

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

impl InstrumentConfig {
    pub fn load(path: &Path) -> Result<Self, InstrumentError> {
        let content = std::fs::read_to_string(path).map_err(|e| InstrumentError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| InstrumentError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn detector(&self) -> Detector {
        Detector {
            tilt_angles: self.detector.transform.tilt_angles,
            tvec: self.detector.transform.t_vec_d,
            pixel_size: self.detector.pixels.size,
            rows: self.detector.pixels.rows,
            cols: self.detector.pixels.columns,
        }
    }

    pub fn chi(&self) -> f64 {
        self.oscillation_stage.chi
    }

    pub fn stage_translation(&self) -> [f64; 3] {
        self.oscillation_stage.t_vec_s
    }
}
