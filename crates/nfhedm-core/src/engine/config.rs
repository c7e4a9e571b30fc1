use crate::core::models::experiment::ConfigError;

/// How the grand loop tolerates small projection errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToleranceStrategy {
    /// Dilate the image stack once, then look up single voxels.
    #[default]
    DilatedVolume,
    /// Search the raw image stack around every predicted voxel.
    Neighbourhood,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexingConfig {
    pub workers: usize,
    pub chunk_size: usize,
    pub strategy: ToleranceStrategy,
}

#[derive(Default)]
pub struct IndexingConfigBuilder {
    workers: Option<usize>,
    chunk_size: Option<usize>,
    strategy: Option<ToleranceStrategy>,
}

impl IndexingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }
    pub fn strategy(mut self, strategy: ToleranceStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn build(self) -> Result<IndexingConfig, ConfigError> {
        let workers = self
            .workers
            .ok_or(ConfigError::MissingParameter("workers"))?;
        if workers == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "workers",
                reason: "at least one worker is required".to_string(),
            });
        }
        let chunk_size = self
            .chunk_size
            .ok_or(ConfigError::MissingParameter("chunk_size"))?;
        if chunk_size == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "chunk_size",
                reason: "chunks must hold at least one voxel".to_string(),
            });
        }
        Ok(IndexingConfig {
            workers,
            chunk_size,
            strategy: self.strategy.unwrap_or_default(),
        })
    }
}
