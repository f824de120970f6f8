use crate::infrastructure::model::ModelError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a conversation cycle.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("completion failed: {0}")]
    Model(#[from] ModelError),
    #[error("no final reply after {limit} completion rounds")]
    MaxRoundsExceeded { limit: usize },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid agent record: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
