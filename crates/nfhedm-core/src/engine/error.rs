use thiserror::Error;

use super::scheduler::SchedulingError;
use crate::core::instrument::InstrumentError;
use crate::core::io::PersistenceError;
use crate::core::models::experiment::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to load instrument description: {source}")]
    Instrument {
        #[from]
        source: InstrumentError,
    },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("Worker failed while scoring chunk {chunk}: {message}")]
    WorkerFailed { chunk: usize, message: String },

    #[error("Scheduling error: {source}")]
    Scheduling {
        #[from]
        source: SchedulingError,
    },

    #[error("Persistence error: {source}")]
    Persistence {
        #[from]
        source: PersistenceError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
