use crate::cli::RunArgs;
use crate::config::PartialRunConfig;
use crate::config::models::{AppConfig, ResultMode};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use nfhedm::core::instrument::InstrumentConfig;
use nfhedm::core::models::confidence::ConfidenceMatrix;
use nfhedm::engine::controller::{LimitKey, ProcessController};
use nfhedm::engine::error::EngineError;
use nfhedm::engine::progress::ProgressReporter;
use nfhedm::engine::results::{
    CheckingResultHandler, ForgetfulResultHandler, HandlerReport, ResultHandler,
    SavingResultHandler,
};
use nfhedm::workflows::{self, mockup};
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    let partial_config = PartialRunConfig::load(&args)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    let report = execute(&config, CliProgressHandler::new())?;
    summarize_report(&report)
}

fn result_handler(mode: &ResultMode) -> Result<Box<dyn ResultHandler>> {
    Ok(match mode {
        ResultMode::Forget => Box::new(ForgetfulResultHandler),
        ResultMode::Generate(path) => {
            info!("Reference archive will be written to {:?}", path);
            Box::new(SavingResultHandler::new(path))
        }
        ResultMode::Check(path) => {
            info!("Checking results against {:?}", path);
            Box::new(CheckingResultHandler::from_file(path)?)
        }
    })
}

fn execute(config: &AppConfig, progress: CliProgressHandler) -> Result<HandlerReport> {
    info!("Loading instrument description from {:?}", &config.instrument_path);
    let instrument = InstrumentConfig::load(&config.instrument_path)?;
    let mockup::Mockup {
        grain_params,
        experiment,
    } = mockup::build(&config.mockup, &instrument).map_err(EngineError::from)?;
    let coords = mockup::search_grid(config.grid.min, config.grid.max, config.grid.points);

    let reporter = ProgressReporter::with_callback(progress.get_callback());
    let mut controller = ProcessController::new(reporter, result_handler(&config.result_mode)?);
    if let Some(limit) = config.limit {
        controller.set_limit(LimitKey::Coords, Box::new(move |n| n.min(limit)));
    }

    println!(
        "Indexing {} grain(s) over {} search voxel(s)...",
        experiment.n_grains(),
        coords.len()
    );
    let result = workflows::index::run(
        &grain_params,
        &experiment,
        &coords,
        &config.indexing,
        config.cache.as_deref(),
        &controller,
    )?;
    print_confidence_summary(&result.confidence);

    Ok(controller.close()?)
}

fn print_confidence_summary(confidence: &ConfidenceMatrix) {
    let best = confidence.best_grain_per_coord();
    let assigned = best.iter().flatten().count();
    println!(
        "Scored {} voxel(s); {} with at least one evaluated grain, {} unevaluated score(s).",
        confidence.n_coords(),
        assigned,
        confidence.unevaluated_count()
    );
    for grain in 0..confidence.n_grains() {
        let top = best
            .iter()
            .flatten()
            .filter(|(g, _)| *g == grain)
            .map(|(_, score)| *score)
            .fold(f64::NEG_INFINITY, f64::max);
        if top.is_finite() {
            println!("  Grain {}: best confidence {:.4}", grain, top);
        } else {
            println!("  Grain {}: never the best match", grain);
        }
    }
}

fn summarize_report(report: &HandlerReport) -> Result<()> {
    if let Some(path) = &report.saved_to {
        println!("✓ Reference archive written to: {}", path.display());
    }
    if report.checks.is_empty() {
        return Ok(());
    }

    for (key, outcome) in &report.checks {
        println!("  {:<16} {}", key, outcome);
    }
    let failed = report.failed_checks();
    if failed > 0 {
        warn!("{} of {} check(s) failed.", failed, report.checks.len());
        return Err(CliError::CheckFailed {
            failed,
            total: report.checks.len(),
        });
    }
    println!("✓ All {} check(s) passed.", report.checks.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfhedm::core::io::check::CheckOutcome;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn write_instrument(dir: &Path) -> PathBuf {
        let path = dir.join("small.toml");
        fs::write(
            &path,
            r#"
            [detector.pixels]
            rows = 101
            columns = 101
            size = [0.02, 0.02]

            [detector.transform]
            tilt-angles = [0.0, 0.0, 0.0]
            t-vec-d = [0.0, 0.0, -5.0]

            [oscillation-stage]
            chi = 0.0
            t-vec-s = [0.0, 0.0, 0.0]
            "#,
        )
        .unwrap();
        path
    }

    fn write_run_config(dir: &Path) -> PathBuf {
        let path = dir.join("run.toml");
        fs::write(
            &path,
            r#"
            [engine]
            workers = 2
            chunk-size = 4

            [scan]
            omega-step-degrees = 2.0

            [grid]
            min = -0.1
            max = 0.1
            points = 3

            [mockup]
            cube-half-width = 1
            hkl-max = 20
            "#,
        )
        .unwrap();
        path
    }

    fn args(dir: &Path) -> RunArgs {
        RunArgs {
            instrument: write_instrument(dir),
            config: Some(write_run_config(dir)),
            ..Default::default()
        }
    }

    fn app_config(args: &RunArgs) -> AppConfig {
        PartialRunConfig::load(args)
            .unwrap()
            .merge_with_cli(args)
            .unwrap()
    }

    #[test]
    fn forgetful_run_reports_nothing() {
        let dir = tempdir().unwrap();
        let config = app_config(&args(dir.path()));
        let report = execute(&config, CliProgressHandler::new()).unwrap();
        assert_eq!(report, HandlerReport::default());
        assert!(summarize_report(&report).is_ok());
    }

    #[test]
    fn generated_archive_passes_its_own_check() {
        let dir = tempdir().unwrap();
        let reference = dir.path().join("reference.nfa");

        let generate = RunArgs {
            generate: Some(reference.clone()),
            ..args(dir.path())
        };
        let report = execute(&app_config(&generate), CliProgressHandler::new()).unwrap();
        assert_eq!(report.saved_to.as_deref(), Some(reference.as_path()));

        let check = RunArgs {
            check: Some(reference.clone()),
            ..args(dir.path())
        };
        let report = execute(&app_config(&check), CliProgressHandler::new()).unwrap();
        assert_eq!(report.checks.len(), 2);
        assert!(summarize_report(&report).is_ok());
    }

    #[test]
    fn missing_instrument_is_reported() {
        let dir = tempdir().unwrap();
        let mut run_args = args(dir.path());
        run_args.instrument = dir.path().join("absent.toml");
        let result = execute(&app_config(&run_args), CliProgressHandler::new());
        assert!(matches!(result, Err(CliError::Instrument(_))));
    }

    #[test]
    fn failed_checks_become_an_error() {
        let report = HandlerReport {
            saved_to: None,
            checks: vec![
                ("experiment".to_string(), CheckOutcome::FullPass),
                (
                    "confidence".to_string(),
                    CheckOutcome::Fail {
                        reason: "scores differ".to_string(),
                    },
                ),
            ],
        };
        let err = summarize_report(&report).unwrap_err();
        assert!(matches!(err, CliError::CheckFailed { failed: 1, total: 2 }));
    }
}
