//! Persistence of run artifacts.
//!
//! Artifacts are stored as gzip-compressed bincode, either one value per file
//! (the image stack cache) or as a keyed [`archive::ArtifactArchive`] holding
//! every artifact of a run. [`check`] compares a run against a stored archive.

pub mod archive;
pub mod check;

pub use archive::{ArtifactArchive, PersistenceError, StoredArtifact};
pub use check::CheckOutcome;
