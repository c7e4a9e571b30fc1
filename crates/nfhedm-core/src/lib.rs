//! # nfhedm Core Library
//!
//! A high-performance library for near-field high-energy diffraction microscopy
//! (nf-HEDM) orientation indexing: given a stack of binary diffraction images
//! indexed by rotation angle, detector row and detector column, it measures how
//! well each candidate crystal orientation explains the images at each spatial
//! voxel.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Experiment`,
//!   `GrainParams`, `ImageVolume`, `ConfidenceMatrix`), the geometry kernel that
//!   solves Bragg conditions and projects reflections onto the detector, the
//!   quantizer, plane data and artifact persistence.
//!
//! - **[`engine`]: The Logic Core.** The phases of an indexing run: forward
//!   simulation, angle tables, tolerance dilation and the parallel grand loop,
//!   driven through a `Controller` that handles progress, results and limits.
//!
//! - **[`workflows`]: The Public API.** End-to-end indexing and the synthetic
//!   experiment used for benchmarking and regression checks.

pub mod core;
pub mod engine;
pub mod workflows;
