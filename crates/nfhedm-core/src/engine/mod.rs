//! # Engine Module
//!
//! This module implements the stateful part of an indexing run: the phases that
//! turn an [`Experiment`](crate::core::models::experiment::Experiment) and a set
//! of grains into an image stack and a confidence matrix.
//!
//! ## Overview
//!
//! Work flows through a fixed pipeline. Reflection angles are predicted once per
//! candidate grain, the image stack is simulated (or loaded from a cache), dilated
//! to tolerate small projection errors, and finally scored voxel by voxel in the
//! grand loop. Every phase reports to a [`controller::Controller`], which owns
//! progress reporting, phase timing, result persistence and work limits.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Worker count, chunk size and tolerance strategy
//! - **Controller** ([`controller`]) - Phase hooks, artifact hand-off and limits
//! - **Results** ([`results`]) - Forgetful, saving and checking result handlers
//! - **Scheduling** ([`scheduler`]) - Chunk partitioning and per-chunk state tracking
//! - **Scoring** ([`evaluator`]) - Confidence of one grain at one voxel
//! - **Progress Monitoring** ([`progress`]) - Progress events for front ends
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! ## Key Capabilities
//!
//! - **Parallel scoring** over disjoint column views of the confidence matrix
//! - **Deterministic results** independent of worker count and chunk size
//! - **Reference checking** of produced arrays against a previous run

pub mod config;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod progress;
pub mod results;
pub mod scheduler;
pub mod tasks;
