use super::controller::Artifact;
use crate::core::io::check::{CheckOutcome, compare};
use crate::core::io::{ArtifactArchive, PersistenceError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a result handler did over a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerReport {
    pub saved_to: Option<PathBuf>,
    pub checks: Vec<(String, CheckOutcome)>,
}

impl HandlerReport {
    pub fn failed_checks(&self) -> usize {
        self.checks
            .iter()
            .filter(|(_, outcome)| !outcome.is_pass())
            .count()
    }
}

/// Receives every artifact a run produces.
pub trait ResultHandler: Send {
    fn handle_result(&mut self, artifact: &Artifact<'_>);

    /// Called once at the end of a run.
    fn close(&mut self) -> Result<HandlerReport, PersistenceError> {
        Ok(HandlerReport::default())
    }
}

/// Discards every artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForgetfulResultHandler;

impl ResultHandler for ForgetfulResultHandler {
    fn handle_result(&mut self, _artifact: &Artifact<'_>) {}
}

/// Collects artifacts and writes them as a single archive.
///
/// The archive is written only by [`ResultHandler::close`]. A handler dropped
/// without closing discards what it collected, so a failed run leaves no
/// archive behind.
#[derive(Debug)]
pub struct SavingResultHandler {
    path: PathBuf,
    archive: ArtifactArchive,
    dirty: bool,
}

impl SavingResultHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            archive: ArtifactArchive::new(),
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        debug!(path = %self.path.display(), "Writing arrays.");
        self.archive.save(&self.path)?;
        self.dirty = false;
        Ok(())
    }
}

impl ResultHandler for SavingResultHandler {
    fn handle_result(&mut self, artifact: &Artifact<'_>) {
        self.archive.insert(artifact.key(), artifact.to_stored());
        self.dirty = true;
    }

    fn close(&mut self) -> Result<HandlerReport, PersistenceError> {
        if self.dirty {
            self.flush()?;
        }
        Ok(HandlerReport {
            saved_to: Some(self.path.clone()),
            checks: Vec::new(),
        })
    }
}

impl Drop for SavingResultHandler {
    fn drop(&mut self) {
        if self.dirty {
            warn!(
                path = %self.path.display(),
                artifacts = self.archive.len(),
                "Run did not complete; discarding unsaved arrays."
            );
        }
    }
}

/// Compares artifacts against a reference archive from a previous run.
///
/// `experiment` and `image_stack` are not checked.
#[derive(Debug)]
pub struct CheckingResultHandler {
    reference: ArtifactArchive,
    outcomes: Vec<(String, CheckOutcome)>,
}

impl CheckingResultHandler {
    const IGNORED_KEYS: [&'static str; 2] = ["experiment", "image_stack"];

    pub fn new(reference: ArtifactArchive) -> Self {
        Self {
            reference,
            outcomes: Vec::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, PersistenceError> {
        Ok(Self::new(ArtifactArchive::load(path)?))
    }

    pub fn outcomes(&self) -> &[(String, CheckOutcome)] {
        &self.outcomes
    }
}

impl ResultHandler for CheckingResultHandler {
    fn handle_result(&mut self, artifact: &Artifact<'_>) {
        let key = artifact.key();
        if Self::IGNORED_KEYS.contains(&key) {
            return;
        }

        let outcome = match self.reference.get(key) {
            Some(reference) => compare(&artifact.to_stored(), reference),
            None => CheckOutcome::Missing,
        };
        match &outcome {
            CheckOutcome::FullPass => info!("'{}': {}", key, outcome),
            CheckOutcome::Missing => warn!("'{}': No reference result.", key),
            _ => warn!("'{}': {}", key, outcome),
        }
        self.outcomes.push((key.to_string(), outcome));
    }

    fn close(&mut self) -> Result<HandlerReport, PersistenceError> {
        Ok(HandlerReport {
            saved_to: None,
            checks: std::mem::take(&mut self.outcomes),
        })
    }
}
