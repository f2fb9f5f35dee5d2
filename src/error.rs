//! Error kinds surfaced across extraction, storage and search

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GennieError {
    /// An agent has no storage for the requested workspace. The orchestrator
    /// treats it as an empty contribution.
    #[error("{agent} storage not found at {}", path.display())]
    SourceUnavailable { agent: String, path: PathBuf },

    /// One record, session or file could not be decoded.
    #[error("malformed record in {context}: {reason}")]
    MalformedRecord { context: String, reason: String },

    #[error("{index} index not initialized. Run `{remedy}`.")]
    IndexNotBuilt { index: &'static str, remedy: &'static str },

    #[error("storage failure during {step}: {source}")]
    StorageFailure {
        step: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid request: {0}")]
    Validation(String),

    /// The embedding function failed on a query or batch.
    #[error("embedding with {model} failed: {reason}")]
    Embedding { model: String, reason: String },
}

impl GennieError {
    pub fn storage(step: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| GennieError::StorageFailure { step, source }
    }

    pub fn keyword_index_missing() -> Self {
        GennieError::IndexNotBuilt {
            index: "keyword",
            remedy: "gennie reindex",
        }
    }

    pub fn semantic_index_missing() -> Self {
        GennieError::IndexNotBuilt {
            index: "semantic",
            remedy: "gennie backfill",
        }
    }
}

pub type GennieResult<T> = std::result::Result<T, GennieError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_error_names_rebuild_command() {
        let msg = GennieError::keyword_index_missing().to_string();
        assert!(msg.contains("gennie reindex"));
    }

    #[test]
    fn test_storage_error_carries_step() {
        let err = GennieError::storage("delete turns")(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("delete turns"));
    }
}
