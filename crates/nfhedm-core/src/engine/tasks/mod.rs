//! Computational steps of an indexing run.
//!
//! Each submodule implements one phase: predicting reflection angles per
//! candidate grain, forward-simulating the image stack, dilating it, and the
//! grand loop that scores every grain at every search voxel. Phases report to a
//! [`Controller`](super::controller::Controller) and hold no state between calls.

pub mod angle_table;
pub mod dilate;
pub mod grand_loop;
pub mod simulate;

#[cfg(test)]
pub(crate) mod test_support;
