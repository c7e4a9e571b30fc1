//! Diffraction geometry kernel.
//!
//! Pure functions mapping a crystal orientation plus detector and stage
//! parameters to diffraction angles, and those angles to detector plane
//! coordinates. Nothing here holds state, so every function is safe to call
//! from any number of worker threads. Degenerate inputs inside the kernel
//! produce NaN sentinels that callers filter out; they never become errors.

pub mod angles;
pub mod projection;
pub mod rotations;
