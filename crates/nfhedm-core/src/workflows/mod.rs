//! # Workflows Module
//!
//! High-level entry points that tie [`crate::core`] and [`crate::engine`]
//! together into complete indexing runs.
//!
//! - **Indexing Workflow** ([`index`]) - Image stack (simulated or cached),
//!   angle tables, tolerance dilation and the grand loop, with every artifact
//!   handed to the caller's controller.
//! - **Mock Experiment** ([`mockup`]) - Synthetic experiments built from grain
//!   quaternions and an instrument file, plus the matching search grids.

pub mod index;
pub mod mockup;
