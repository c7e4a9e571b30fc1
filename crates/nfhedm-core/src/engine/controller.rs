use super::progress::{Progress, ProgressReporter};
use super::results::{HandlerReport, ResultHandler};
use crate::core::io::{PersistenceError, StoredArtifact};
use crate::core::models::confidence::ConfidenceMatrix;
use crate::core::models::experiment::Experiment;
use crate::core::models::grain::GrainParams;
use crate::core::models::volume::ImageVolume;
use ndarray::Array2;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Quantities a caller may clamp before work is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKey {
    /// Number of search voxels fed to the grand loop.
    Coords,
}

impl LimitKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coords => "coords",
        }
    }
}

/// A result produced during a run, borrowed for the duration of the hand-off.
#[derive(Debug, Clone, Copy)]
pub enum Artifact<'a> {
    Experiment(&'a Experiment),
    GrainParams(&'a [GrainParams]),
    ImageStack(&'a ImageVolume),
    Confidence(&'a ConfidenceMatrix),
}

impl Artifact<'_> {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Experiment(_) => "experiment",
            Self::GrainParams(_) => "grain_params",
            Self::ImageStack(_) => "image_stack",
            Self::Confidence(_) => "confidence",
        }
    }

    /// Owned, persistable copy of the artifact.
    pub fn to_stored(&self) -> StoredArtifact {
        match self {
            Self::Experiment(experiment) => {
                StoredArtifact::Experiment(Box::new(experiment.record()))
            }
            Self::GrainParams(params) => {
                let mut table = Array2::zeros((params.len(), 12));
                for (mut row, p) in table.rows_mut().into_iter().zip(params.iter()) {
                    row.assign(&ndarray::ArrayView1::from(&p.to_array()));
                }
                StoredArtifact::Float(table.into_dyn())
            }
            Self::ImageStack(volume) => StoredArtifact::Bool(volume.data().clone().into_dyn()),
            Self::Confidence(matrix) => StoredArtifact::Float(matrix.scores.clone().into_dyn()),
        }
    }
}

/// Hooks the engine calls at phase boundaries and for every produced artifact.
pub trait Controller {
    fn start(&self, phase: &'static str, total: usize);
    fn update(&self, completed: usize);
    fn finish(&self, phase: &'static str);
    fn handle_result(&self, artifact: Artifact<'_>);
    /// Returns `value`, possibly clamped by a registered limit.
    fn limit(&self, key: LimitKey, value: usize) -> usize;
}

/// Controller that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullController;

impl Controller for NullController {
    fn start(&self, _phase: &'static str, _total: usize) {}
    fn update(&self, _completed: usize) {}
    fn finish(&self, _phase: &'static str) {}
    fn handle_result(&self, _artifact: Artifact<'_>) {}
    fn limit(&self, _key: LimitKey, value: usize) -> usize {
        value
    }
}

pub type LimitFn = Box<dyn Fn(usize) -> usize + Send + Sync>;

struct PhaseTiming {
    name: &'static str,
    total: usize,
    started: Instant,
}

/// Controller forwarding progress to a [`ProgressReporter`], artifacts to a
/// [`ResultHandler`], and logging how long each phase took.
pub struct ProcessController<'a> {
    reporter: ProgressReporter<'a>,
    result_handler: Mutex<Box<dyn ResultHandler + 'a>>,
    limits: HashMap<LimitKey, LimitFn>,
    timing: Mutex<Vec<PhaseTiming>>,
}

impl<'a> ProcessController<'a> {
    pub fn new(reporter: ProgressReporter<'a>, result_handler: Box<dyn ResultHandler + 'a>) -> Self {
        Self {
            reporter,
            result_handler: Mutex::new(result_handler),
            limits: HashMap::new(),
            timing: Mutex::new(Vec::new()),
        }
    }

    pub fn set_limit(&mut self, key: LimitKey, limit: LimitFn) {
        if self.limits.insert(key, limit).is_some() {
            warn!("Overwriting limit function for '{}'.", key.as_str());
        }
    }

    /// Lets the result handler persist whatever it still buffers.
    pub fn close(self) -> Result<HandlerReport, PersistenceError> {
        let mut handler = self
            .result_handler
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        handler.close()
    }
}

impl Controller for ProcessController<'_> {
    fn start(&self, phase: &'static str, total: usize) {
        self.reporter.report(Progress::PhaseStart {
            name: phase,
            total_steps: total as u64,
        });
        self.timing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PhaseTiming {
                name: phase,
                total,
                started: Instant::now(),
            });
    }

    fn update(&self, completed: usize) {
        self.reporter.report(Progress::TaskProgress {
            completed: completed as u64,
        });
    }

    fn finish(&self, phase: &'static str) {
        self.reporter.report(Progress::PhaseFinish { name: phase });
        let entry = self
            .timing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match entry {
            Some(entry) => {
                if entry.name != phase {
                    warn!(expected = entry.name, got = phase, "Phase finished out of order.");
                }
                let total = entry.started.elapsed().as_secs_f64();
                let per_item = total / entry.total.max(1) as f64;
                info!("{} took {:8.3}s ({:8.6}s per item).", entry.name, total, per_item);
            }
            None => warn!(phase, "Phase finished without being started."),
        }
    }

    fn handle_result(&self, artifact: Artifact<'_>) {
        debug!(key = artifact.key(), "Handling result.");
        self.result_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle_result(&artifact);
    }

    fn limit(&self, key: LimitKey, value: usize) -> usize {
        match self.limits.get(&key) {
            Some(limit) => limit(value),
            None => value,
        }
    }
}
