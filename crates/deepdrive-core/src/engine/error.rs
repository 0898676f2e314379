use super::config::ConfigError;
use super::outlier::search::SearchError;
use super::registry::RegistryError;
use crate::core::io::pdb::PdbError;
use crate::core::io::tables::TableError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dependency graph error: {0}")]
    Registry(#[from] RegistryError),

    /// A simulate manager found no seed structures. The controller treats this as the normal end
    /// of a run rather than a failure.
    #[error("No seed structures available for round {round} in {dir:?}")]
    NoSeedsAvailable { round: usize, dir: PathBuf },

    #[error("Outlier search failed: {0}")]
    Search(#[from] SearchError),

    #[error("Stage '{stage}' of round {round} failed: {reason}")]
    Execution {
        stage: String,
        round: usize,
        reason: String,
    },

    #[error("I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Structure file error for '{path}': {source}", path = path.display())]
    Structure {
        path: PathBuf,
        #[source]
        source: PdbError,
    },

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Required artifact missing: {0}")]
    MissingArtifact(String),

    #[error("Trajectory '{path}' has {found} frames, expected {expected}", path = path.display())]
    RaggedTrajectories {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    #[error("Embedding has {rows} rows but trajectories hold {expected} frames")]
    EmbeddingMismatch { rows: usize, expected: usize },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
