use super::angle_table::AngleTable;
use crate::core::models::confidence::ConfidenceMatrix;
use crate::core::models::experiment::Experiment;
use crate::core::models::volume::ImageVolume;
use crate::engine::config::{IndexingConfig, ToleranceStrategy};
use crate::engine::controller::{Controller, LimitKey};
use crate::engine::error::EngineError;
use crate::engine::evaluator::score;
use crate::engine::scheduler::{ChunkPlan, GrandLoopScheduler};
use itertools::iproduct;
use nalgebra::Vector3;
use ndarray::{ArrayViewMut2, Axis};
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use crate::engine::scheduler::ChunkEvent;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use std::sync::mpsc;

/// Read-only state shared by every worker for the duration of the loop.
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext<'a> {
    pub experiment: &'a Experiment,
    /// Dilated stack for [`ToleranceStrategy::DilatedVolume`], raw otherwise.
    pub volume: &'a ImageVolume,
    pub angle_tables: &'a [AngleTable],
    pub coords: &'a [Vector3<f64>],
    pub strategy: ToleranceStrategy,
}

impl WorkerContext<'_> {
    /// Scores every grain at every voxel of `range`, writing into the column
    /// views of the chunk. Returns how many cells had no valid reflection.
    fn score_chunk(
        &self,
        range: Range<usize>,
        mut scores: ArrayViewMut2<'_, f64>,
        mut evaluated: ArrayViewMut2<'_, bool>,
    ) -> usize {
        let grains = self.experiment.grains();
        let mut unevaluated = 0;
        for (icrd, igrn) in iproduct!(range.clone(), 0..grains.len()) {
            let local = icrd - range.start;
            let s = score(
                &self.angle_tables[igrn],
                &grains[igrn].rmat,
                &self.coords[icrd],
                self.experiment,
                self.volume,
                self.strategy,
            );
            scores[[igrn, local]] = s.confidence();
            evaluated[[igrn, local]] = s.is_evaluated();
            if !s.is_evaluated() {
                unevaluated += 1;
            }
        }
        unevaluated
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn run_guarded<F>(
    process: &F,
    range: Range<usize>,
    scores: ArrayViewMut2<'_, f64>,
    evaluated: ArrayViewMut2<'_, bool>,
) -> Result<usize, String>
where
    F: Fn(Range<usize>, ArrayViewMut2<'_, f64>, ArrayViewMut2<'_, bool>) -> usize,
{
    panic::catch_unwind(AssertUnwindSafe(|| process(range, scores, evaluated)))
        .map_err(panic_message)
}

fn log_chunk(chunk: usize, unevaluated: usize) {
    if unevaluated > 0 {
        debug!(chunk, unevaluated, "Cells without valid reflections.");
    }
}

fn drive_serial<F>(
    plan: &ChunkPlan,
    matrix: &mut ConfidenceMatrix,
    process: &F,
    controller: &dyn Controller,
) -> Result<(), EngineError>
where
    F: Fn(Range<usize>, ArrayViewMut2<'_, f64>, ArrayViewMut2<'_, bool>) -> usize,
{
    let mut scheduler = GrandLoopScheduler::new(plan.clone());
    let chunk_size = plan.chunk_size();
    let ConfidenceMatrix { scores, evaluated } = matrix;
    let chunks = scores
        .axis_chunks_iter_mut(Axis(1), chunk_size)
        .zip(evaluated.axis_chunks_iter_mut(Axis(1), chunk_size));

    for (chunk, (scores, evaluated)) in chunks.enumerate() {
        let range = scheduler.dispatch(chunk)?;
        let unevaluated = run_guarded(process, range, scores, evaluated)
            .map_err(|message| EngineError::WorkerFailed { chunk, message })?;
        log_chunk(chunk, unevaluated);
        controller.update(scheduler.complete(chunk)?);
    }
    scheduler.ensure_finished()?;
    Ok(())
}

#[cfg(feature = "parallel")]
fn drive_parallel<F>(
    plan: &ChunkPlan,
    matrix: &mut ConfidenceMatrix,
    process: &F,
    workers: usize,
    controller: &dyn Controller,
) -> Result<(), EngineError>
where
    F: Fn(Range<usize>, ArrayViewMut2<'_, f64>, ArrayViewMut2<'_, bool>) -> usize + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("grand-loop-{}", i))
        .build()
        .map_err(|e| EngineError::WorkerPool(e.to_string()))?;

    let mut scheduler = GrandLoopScheduler::new(plan.clone());
    let chunk_size = plan.chunk_size();
    let ConfidenceMatrix { scores, evaluated } = matrix;
    let (tx, rx) = mpsc::channel::<ChunkEvent>();
    let mut failure: Option<(usize, String)> = None;

    std::thread::scope(|s| -> Result<(), EngineError> {
        s.spawn(move || {
            pool.install(|| {
                scores
                    .axis_chunks_iter_mut(Axis(1), chunk_size)
                    .into_par_iter()
                    .zip(evaluated.axis_chunks_iter_mut(Axis(1), chunk_size))
                    .enumerate()
                    .for_each_with(tx, |tx, (chunk, (scores, evaluated))| {
                        let start = chunk * chunk_size;
                        let range = start..start + scores.ncols();
                        let _ = tx.send(ChunkEvent::Started { chunk });
                        let event = match run_guarded(process, range, scores, evaluated) {
                            Ok(unevaluated) => ChunkEvent::Completed { chunk, unevaluated },
                            Err(message) => ChunkEvent::Failed { chunk, message },
                        };
                        let _ = tx.send(event);
                    });
            });
        });

        for event in rx {
            match event {
                ChunkEvent::Started { chunk } => {
                    scheduler.dispatch(chunk)?;
                }
                ChunkEvent::Completed { chunk, unevaluated } => {
                    log_chunk(chunk, unevaluated);
                    controller.update(scheduler.complete(chunk)?);
                }
                ChunkEvent::Failed { chunk, message } => {
                    debug!(chunk, %message, "Chunk failed.");
                    failure.get_or_insert((chunk, message));
                }
            }
        }
        Ok(())
    })?;

    if let Some((chunk, message)) = failure {
        return Err(EngineError::WorkerFailed { chunk, message });
    }
    scheduler.ensure_finished()?;
    Ok(())
}

/// Runs `process` over every chunk of `plan`, in parallel when `workers > 1`.
fn drive<F>(
    plan: &ChunkPlan,
    matrix: &mut ConfidenceMatrix,
    process: F,
    workers: usize,
    controller: &dyn Controller,
) -> Result<(), EngineError>
where
    F: Fn(Range<usize>, ArrayViewMut2<'_, f64>, ArrayViewMut2<'_, bool>) -> usize + Sync,
{
    #[cfg(feature = "parallel")]
    {
        if workers > 1 {
            return drive_parallel(plan, matrix, &process, workers, controller);
        }
    }
    #[cfg(not(feature = "parallel"))]
    if workers > 1 {
        debug!(workers, "Built without parallel support; scoring serially.");
    }
    drive_serial(plan, matrix, &process, controller)
}

/// Scores every candidate grain at every search voxel.
///
/// The number of voxels may be reduced by the controller's `coords` limit.
/// Cells are written exactly once, so the result does not depend on the
/// order in which chunks finish. A panicking chunk fails the whole loop.
#[instrument(skip_all, name = "grand_loop")]
pub fn run(
    ctx: &WorkerContext<'_>,
    config: &IndexingConfig,
    controller: &dyn Controller,
) -> Result<ConfidenceMatrix, EngineError> {
    const PHASE: &str = "grand_loop";
    let n_grains = ctx.experiment.n_grains();
    if ctx.angle_tables.len() != n_grains {
        return Err(EngineError::Internal(format!(
            "{} angle tables for {} grains",
            ctx.angle_tables.len(),
            n_grains
        )));
    }

    let n_coords = controller
        .limit(LimitKey::Coords, ctx.coords.len())
        .min(ctx.coords.len());
    let plan = ChunkPlan::new(n_coords, config.chunk_size);
    info!(
        grains = n_grains,
        coords = n_coords,
        chunks = plan.len(),
        workers = config.workers,
        "Starting grand loop."
    );

    let mut matrix = ConfidenceMatrix::new(n_grains, n_coords);
    controller.start(PHASE, plan.len());
    drive(
        &plan,
        &mut matrix,
        |range, scores, evaluated| ctx.score_chunk(range, scores, evaluated),
        config.workers,
        controller,
    )?;
    controller.finish(PHASE);

    let unevaluated = matrix.unevaluated_count();
    if unevaluated > 0 {
        info!(cells = unevaluated, "Cells without valid reflections.");
    }
    Ok(matrix)
}
