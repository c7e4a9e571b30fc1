//! # Core Models Module
//!
//! Data structures describing an indexing run.
//!
//! - [`experiment`] - Acquisition geometry, omega scan, candidate grains and the
//!   derived quantizer, built and validated once by `ExperimentBuilder`
//! - [`grain`] - Per-grain simulation parameters (orientation, centroid, stretch)
//! - [`volume`] - Boolean image stack indexed `[frame, row, col]`
//! - [`confidence`] - Scores for every `(grain, voxel)` pair
//!
//! ```ignore
//! use nfhedm::core::models::experiment::{Detector, Experiment, OmegaScan};
//!
//! let experiment = Experiment::builder()
//!     .detector(detector)
//!     .chi(0.0)
//!     .stage_translation([0.0; 3])
//!     .omega_scan(OmegaScan::full((0.0, TAU), 1f64.to_radians()))
//!     .grain_orientations(exp_maps)
//!     .plane_data(&gold)
//!     .dilation(2, 2)
//!     .build()?;
//! ```

pub mod confidence;
pub mod experiment;
pub mod grain;
pub mod volume;
