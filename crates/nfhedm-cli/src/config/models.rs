use nfhedm::engine::config::IndexingConfig;
use nfhedm::workflows::mockup::MockupSpec;
use std::path::PathBuf;

/// What happens to the arrays a run produces.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultMode {
    Forget,
    Generate(PathBuf),
    Check(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchGrid {
    pub min: f64,
    pub max: f64,
    pub points: usize,
}

pub struct AppConfig {
    pub instrument_path: PathBuf,
    pub indexing: IndexingConfig,
    pub mockup: MockupSpec,
    pub grid: SearchGrid,
    pub limit: Option<usize>,
    pub cache: Option<PathBuf>,
    pub result_mode: ResultMode,
}
