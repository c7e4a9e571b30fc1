use crate::core::models::confidence::ConfidenceMatrix;
use crate::core::models::experiment::Experiment;
use crate::core::models::grain::GrainParams;
use crate::core::models::volume::ImageVolume;
use crate::engine::config::{IndexingConfig, ToleranceStrategy};
use crate::engine::controller::{Artifact, Controller};
use crate::engine::error::EngineError;
use crate::engine::tasks::{angle_table, dilate, grand_loop, simulate};
use nalgebra::Vector3;
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct IndexingResult {
    /// Undilated image stack the search was run against.
    pub image_stack: ImageVolume,
    pub confidence: ConfidenceMatrix,
}

/// Simulates (or loads) the image stack produced by `grain_params`, then scores
/// every candidate orientation of `experiment` at every voxel of `coords`.
///
/// The controller receives the `experiment`, `grain_params`, `image_stack` and
/// `confidence` artifacts in that order.
#[instrument(skip_all, name = "indexing_workflow")]
pub fn run(
    grain_params: &[GrainParams],
    experiment: &Experiment,
    coords: &[Vector3<f64>],
    config: &IndexingConfig,
    cache: Option<&Path>,
    controller: &dyn Controller,
) -> Result<IndexingResult, EngineError> {
    info!(
        grains = experiment.n_grains(),
        grain_params = grain_params.len(),
        coords = coords.len(),
        "Starting indexing workflow."
    );
    controller.handle_result(Artifact::Experiment(experiment));
    controller.handle_result(Artifact::GrainParams(grain_params));

    // === Phase 1: Image stack ===
    let image_stack = simulate::load_or_simulate(cache, grain_params, experiment, controller);
    controller.handle_result(Artifact::ImageStack(&image_stack));

    // === Phase 2: Angle tables ===
    let angle_tables = angle_table::evaluate_diffraction_angles(experiment, controller);

    // === Phase 3: Tolerance ===
    let dilated;
    let volume = match config.strategy {
        ToleranceStrategy::DilatedVolume => {
            let (rows, cols) = experiment.dilation();
            dilated = dilate::dilate(&image_stack, rows, cols, controller);
            &dilated
        }
        ToleranceStrategy::Neighbourhood => &image_stack,
    };

    // === Phase 4: Grand loop ===
    let ctx = grand_loop::WorkerContext {
        experiment,
        volume,
        angle_tables: &angle_tables,
        coords,
        strategy: config.strategy,
    };
    let confidence = grand_loop::run(&ctx, config, controller)?;
    controller.handle_result(Artifact::Confidence(&confidence));

    info!(
        "Workflow complete. Scored {} grain(s) at {} voxel(s).",
        confidence.n_grains(),
        confidence.n_coords()
    );
    Ok(IndexingResult {
        image_stack,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::{ArtifactArchive, StoredArtifact};
    use crate::engine::config::IndexingConfigBuilder;
    use crate::engine::controller::ProcessController;
    use crate::engine::progress::{Progress, ProgressReporter};
    use crate::engine::results::{CheckingResultHandler, ResultHandler, SavingResultHandler};
    use crate::workflows::mockup::tests::{small_instrument, small_spec};
    use crate::workflows::mockup::{Mockup, build};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    struct KeyRecorder(Arc<Mutex<Vec<&'static str>>>);

    impl ResultHandler for KeyRecorder {
        fn handle_result(&mut self, artifact: &Artifact<'_>) {
            self.0.lock().unwrap().push(artifact.key());
        }
    }

    fn mockup() -> Mockup {
        build(&small_spec(), &small_instrument()).unwrap()
    }

    fn coords() -> Vec<Vector3<f64>> {
        vec![
            Vector3::zeros(),
            Vector3::new(0.01, 0.0, 0.0),
            Vector3::new(0.0, 0.5, 0.0),
            Vector3::new(0.0, 50.0, 0.0),
        ]
    }

    fn config(strategy: ToleranceStrategy) -> IndexingConfig {
        IndexingConfigBuilder::new()
            .workers(2)
            .chunk_size(3)
            .strategy(strategy)
            .build()
            .unwrap()
    }

    #[test]
    fn grains_are_found_at_their_centroids() {
        let Mockup {
            grain_params,
            experiment,
        } = mockup();
        let result = run(
            &grain_params,
            &experiment,
            &coords(),
            &config(ToleranceStrategy::DilatedVolume),
            None,
            &crate::engine::controller::NullController,
        )
        .unwrap();

        let confidence = &result.confidence;
        assert_eq!(confidence.n_coords(), 4);
        assert_eq!(confidence.scores[[0, 0]], 1.0);
        assert_eq!(confidence.scores[[0, 1]], 1.0);
        assert!(confidence.scores[[0, 2]] < 0.5);
        assert!(!confidence.evaluated[[0, 3]]);
        assert!(result.image_stack.count_lit() > 0);
    }

    #[test]
    fn strategies_produce_identical_matrices() {
        let Mockup {
            grain_params,
            experiment,
        } = mockup();
        let controller = crate::engine::controller::NullController;
        let dilated = run(
            &grain_params,
            &experiment,
            &coords(),
            &config(ToleranceStrategy::DilatedVolume),
            None,
            &controller,
        )
        .unwrap();
        let neighbourhood = run(
            &grain_params,
            &experiment,
            &coords(),
            &config(ToleranceStrategy::Neighbourhood),
            None,
            &controller,
        )
        .unwrap();
        assert_eq!(dilated.confidence, neighbourhood.confidence);
    }

    #[test]
    fn artifacts_and_phases_reach_the_controller_in_order() {
        let Mockup {
            grain_params,
            experiment,
        } = mockup();
        let keys = Arc::new(Mutex::new(Vec::new()));
        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|e| {
            if let Progress::PhaseStart { name, .. } = e {
                phases.lock().unwrap().push(name);
            }
        }));
        let controller = ProcessController::new(reporter, Box::new(KeyRecorder(keys.clone())));

        run(
            &grain_params,
            &experiment,
            &coords(),
            &config(ToleranceStrategy::DilatedVolume),
            None,
            &controller,
        )
        .unwrap();
        drop(controller);

        assert_eq!(
            *keys.lock().unwrap(),
            vec!["experiment", "grain_params", "image_stack", "confidence"]
        );
        assert_eq!(
            phases.into_inner().unwrap(),
            vec![
                "simulate diffractions",
                "evaluate diffraction angles",
                "dilate image_stack",
                "grand_loop"
            ]
        );
    }

    #[test]
    fn generated_reference_checks_as_full_pass() {
        let dir = tempdir().unwrap();
        let reference = dir.path().join("reference.nfa");
        let Mockup {
            grain_params,
            experiment,
        } = mockup();
        let cfg = config(ToleranceStrategy::DilatedVolume);

        let saving = ProcessController::new(
            ProgressReporter::new(),
            Box::new(SavingResultHandler::new(&reference)),
        );
        run(&grain_params, &experiment, &coords(), &cfg, None, &saving).unwrap();
        let report = saving.close().unwrap();
        assert_eq!(report.saved_to.as_deref(), Some(reference.as_path()));

        let archive = ArtifactArchive::load(&reference).unwrap();
        assert!(matches!(archive.get("experiment"), Some(StoredArtifact::Experiment(_))));

        let checking = ProcessController::new(
            ProgressReporter::new(),
            Box::new(CheckingResultHandler::from_file(&reference).unwrap()),
        );
        run(&grain_params, &experiment, &coords(), &cfg, None, &checking).unwrap();
        let report = checking.close().unwrap();
        assert_eq!(report.checks.len(), 2);
        assert_eq!(report.failed_checks(), 0);
    }

    #[test]
    fn image_stack_cache_is_reused_between_runs() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("image_stack.bin.gz");
        let Mockup {
            grain_params,
            experiment,
        } = mockup();
        let cfg = config(ToleranceStrategy::DilatedVolume);
        let controller = crate::engine::controller::NullController;

        let first = run(
            &grain_params,
            &experiment,
            &coords(),
            &cfg,
            Some(cache.as_path()),
            &controller,
        )
        .unwrap();
        assert!(cache.exists());
        let second = run(&[], &experiment, &coords(), &cfg, Some(cache.as_path()), &controller)
            .unwrap();
        assert_eq!(first.image_stack, second.image_stack);
        assert_eq!(first.confidence, second.confidence);
    }
}
