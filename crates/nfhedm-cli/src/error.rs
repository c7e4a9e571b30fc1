use nfhedm::core::instrument::InstrumentError;
use nfhedm::core::io::PersistenceError;
use nfhedm::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    NfhedmCore(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("{failed} of {total} reference check(s) did not pass")]
    CheckFailed { failed: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
