//! # Core Module
//!
//! Stateless building blocks of near-field orientation indexing.
//!
//! ## Architecture
//!
//! - **Geometry Kernel** ([`geometry`]) - Rotations, Bragg angle solutions and
//!   projection of reflections onto the detector plane
//! - **Quantization** ([`quantize`]) - Continuous detector coordinates and omega to
//!   image volume cells
//! - **Plane Data** ([`planedata`]) - Reflection tables and the cubic reference material
//! - **Data Model** ([`models`]) - Experiment, grain parameters, image volume and
//!   confidence matrix
//! - **Instrument Files** ([`instrument`]) - TOML instrument descriptions
//! - **Persistence** ([`io`]) - Compressed artifact archives and reference checks
//!
//! Nothing in this module holds mutable shared state; the [`crate::engine`] layer
//! borrows these types to drive simulation and scoring.

pub mod geometry;
pub mod instrument;
pub mod io;
pub mod models;
pub mod planedata;
pub mod quantize;
