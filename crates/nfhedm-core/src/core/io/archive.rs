use crate::core::models::experiment::ExperimentRecord;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use ndarray::ArrayD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to encode '{path}': {source}")]
    Encode {
        path: String,
        source: bincode::Error,
    },
    #[error("Failed to decode '{path}': {source}")]
    Decode {
        path: String,
        source: bincode::Error,
    },
    #[error("Key '{0}' not found in archive")]
    MissingKey(String),
}

/// Writes `value` as gzip-compressed bincode.
pub fn write_compressed<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let display = || path.to_string_lossy().to_string();
    let file = File::create(path).map_err(|e| PersistenceError::Io {
        path: display(),
        source: e,
    })?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    bincode::serialize_into(&mut encoder, value).map_err(|e| PersistenceError::Encode {
        path: display(),
        source: e,
    })?;
    encoder
        .finish()
        .and_then(|mut inner| inner.flush())
        .map_err(|e| PersistenceError::Io {
            path: display(),
            source: e,
        })
}

/// Reads a value written by [`write_compressed`].
pub fn read_compressed<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let display = || path.to_string_lossy().to_string();
    let file = File::open(path).map_err(|e| PersistenceError::Io {
        path: display(),
        source: e,
    })?;
    bincode::deserialize_from(GzDecoder::new(BufReader::new(file))).map_err(|e| {
        PersistenceError::Decode {
            path: display(),
            source: e,
        }
    })
}

/// One persisted run artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredArtifact {
    Float(ArrayD<f64>),
    Bool(ArrayD<bool>),
    Experiment(Box<ExperimentRecord>),
}

impl StoredArtifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Float(_) => "float array",
            Self::Bool(_) => "bool array",
            Self::Experiment(_) => "experiment",
        }
    }

    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            Self::Float(a) => Some(a.shape()),
            Self::Bool(a) => Some(a.shape()),
            Self::Experiment(_) => None,
        }
    }
}

/// Named artifacts of one run, keyed by artifact name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactArchive {
    entries: BTreeMap<String, StoredArtifact>,
}

impl ArtifactArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an artifact, replacing any previous one under the same key.
    pub fn insert(&mut self, key: impl Into<String>, artifact: StoredArtifact) {
        self.entries.insert(key.into(), artifact);
    }

    pub fn get(&self, key: &str) -> Option<&StoredArtifact> {
        self.entries.get(key)
    }

    pub fn require(&self, key: &str) -> Result<&StoredArtifact, PersistenceError> {
        self.get(key)
            .ok_or_else(|| PersistenceError::MissingKey(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        write_compressed(path, self)
    }

    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        read_compressed(path)
    }
}
