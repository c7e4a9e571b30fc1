pub mod defaults;
pub mod models;

use crate::cli::{RunArgs, StrategyArg};
use crate::error::{CliError, Result};
use defaults::DefaultsConfig;
use models::{AppConfig, ResultMode, SearchGrid};
use nfhedm::engine::config::{IndexingConfigBuilder, ToleranceStrategy};
use nfhedm::workflows::mockup::MockupSpec;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialStrategy {
    DilatedVolume,
    Neighbourhood,
}

impl From<PartialStrategy> for ToleranceStrategy {
    fn from(p: PartialStrategy) -> Self {
        match p {
            PartialStrategy::DilatedVolume => ToleranceStrategy::DilatedVolume,
            PartialStrategy::Neighbourhood => ToleranceStrategy::Neighbourhood,
        }
    }
}

impl From<StrategyArg> for ToleranceStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Dilated => ToleranceStrategy::DilatedVolume,
            StrategyArg::Neighbourhood => ToleranceStrategy::Neighbourhood,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialEngineConfig {
    workers: Option<usize>,
    #[serde(rename = "chunk-size")]
    chunk_size: Option<usize>,
    strategy: Option<PartialStrategy>,
    limit: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialScanConfig {
    #[serde(rename = "omega-step-degrees")]
    omega_step_degrees: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialGridConfig {
    min: Option<f64>,
    max: Option<f64>,
    points: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialMockupConfig {
    #[serde(rename = "max-diameter")]
    max_diameter: Option<f64>,
    #[serde(rename = "cube-half-width")]
    cube_half_width: Option<usize>,
    #[serde(rename = "cube-spacing")]
    cube_spacing: Option<f64>,
    #[serde(rename = "hkl-max")]
    hkl_max: Option<u32>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialOutputConfig {
    cache: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    engine: Option<PartialEngineConfig>,
    scan: Option<PartialScanConfig>,
    grid: Option<PartialGridConfig>,
    mockup: Option<PartialMockupConfig>,
    output: Option<PartialOutputConfig>,
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads the run configuration named by `args`, or starts from an empty one.
    pub fn load(args: &RunArgs) -> Result<Self> {
        match &args.config {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn merge_with_cli(mut self, args: &RunArgs) -> Result<AppConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let engine = self.engine.take().unwrap_or_default();
        let scan = self.scan.take().unwrap_or_default();
        let grid = self.grid.take().unwrap_or_default();
        let mockup = self.mockup.take().unwrap_or_default();
        let output = self.output.take().unwrap_or_default();

        let strategy = args
            .strategy
            .map(ToleranceStrategy::from)
            .or(engine.strategy.map(ToleranceStrategy::from))
            .unwrap_or(defaults.strategy);
        let indexing = IndexingConfigBuilder::new()
            .workers(args.workers.or(engine.workers).unwrap_or(defaults.workers))
            .chunk_size(
                args.chunk_size
                    .or(engine.chunk_size)
                    .unwrap_or(defaults.chunk_size),
            )
            .strategy(strategy)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let omega_step_degrees = scan
            .omega_step_degrees
            .unwrap_or(defaults.omega_step_degrees);
        if !(omega_step_degrees.is_finite() && omega_step_degrees > 0.0) {
            return Err(CliError::Config(
                "`scan.omega-step-degrees` must be positive.".to_string(),
            ));
        }

        let grid = SearchGrid {
            min: grid.min.unwrap_or(defaults.grid_min),
            max: grid.max.unwrap_or(defaults.grid_max),
            points: grid.points.unwrap_or(defaults.grid_points),
        };
        if !(grid.min <= grid.max) {
            return Err(CliError::Config(format!(
                "`grid.min` ({}) must not exceed `grid.max` ({}).",
                grid.min, grid.max
            )));
        }

        let base = MockupSpec::gold_cubes();
        let mut material = base.material.clone();
        if let Some(hkl_max) = mockup.hkl_max {
            material.hkl_max = hkl_max;
        }
        let mockup_spec = MockupSpec {
            cube_half_width: mockup.cube_half_width.unwrap_or(base.cube_half_width),
            cube_spacing: mockup.cube_spacing.unwrap_or(base.cube_spacing),
            max_diameter: mockup.max_diameter.unwrap_or(base.max_diameter),
            omega_step: omega_step_degrees.to_radians(),
            material,
            ..base
        };

        Ok(AppConfig {
            instrument_path: args.instrument.clone(),
            indexing,
            mockup: mockup_spec,
            grid,
            limit: args.limit.or(engine.limit),
            cache: args.cache.clone().or(output.cache),
            result_mode: Self::merge_result_mode(args),
        })
    }

    fn merge_result_mode(args: &RunArgs) -> ResultMode {
        match (&args.check, &args.generate) {
            (Some(check), Some(_)) => {
                warn!("Both --check and --generate given; checking only.");
                ResultMode::Check(check.clone())
            }
            (Some(check), None) => ResultMode::Check(check.clone()),
            (None, Some(generate)) => ResultMode::Generate(generate.clone()),
            (None, None) => ResultMode::Forget,
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "engine.workers" => {
                    self.engine.get_or_insert_with(Default::default).workers =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "engine.chunk-size" => {
                    self.engine.get_or_insert_with(Default::default).chunk_size =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "engine.strategy" => {
                    let strategy = match value_str {
                        "dilated-volume" => PartialStrategy::DilatedVolume,
                        "neighbourhood" => PartialStrategy::Neighbourhood,
                        _ => {
                            return Err(CliError::Config(format!(
                                "Invalid strategy value for {}: {}",
                                key, value_str
                            )));
                        }
                    };
                    self.engine.get_or_insert_with(Default::default).strategy = Some(strategy);
                }
                "engine.limit" => {
                    self.engine.get_or_insert_with(Default::default).limit =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "scan.omega-step-degrees" => {
                    self.scan
                        .get_or_insert_with(Default::default)
                        .omega_step_degrees = Some(parse_value(key, value_str, "float")?);
                }
                "grid.min" => {
                    self.grid.get_or_insert_with(Default::default).min =
                        Some(parse_value(key, value_str, "float")?);
                }
                "grid.max" => {
                    self.grid.get_or_insert_with(Default::default).max =
                        Some(parse_value(key, value_str, "float")?);
                }
                "grid.points" => {
                    self.grid.get_or_insert_with(Default::default).points =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "mockup.cube-half-width" => {
                    self.mockup
                        .get_or_insert_with(Default::default)
                        .cube_half_width = Some(parse_value(key, value_str, "integer")?);
                }
                "mockup.cube-spacing" => {
                    self.mockup
                        .get_or_insert_with(Default::default)
                        .cube_spacing = Some(parse_value(key, value_str, "float")?);
                }
                "mockup.hkl-max" => {
                    self.mockup.get_or_insert_with(Default::default).hkl_max =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "output.cache" => {
                    self.output.get_or_insert_with(Default::default).cache =
                        Some(PathBuf::from(value_str));
                }
                "mockup.max-diameter" => {
                    self.mockup
                        .get_or_insert_with(Default::default)
                        .max_diameter = Some(parse_value(key, value_str, "float")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
