use std::path::PathBuf;

use packforge_core::error::CoreError;
use packforge_core::hashing::StoreError;
use packforge_core::types::DbId;
use packforge_db::DbError;

use crate::converter::ConverterError;

/// Errors surfaced to callers of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Domain error: validation, not found, conflict.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Repository failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// I/O failure while writing, moving or reading stored files.
    #[error("Storage failure: {0}")]
    Storage(#[source] std::io::Error),

    /// The uploading client went away mid-stream. No record was created.
    #[error("Client disconnected during upload")]
    ClientDisconnected,
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ClientDisconnected(_) => Self::ClientDisconnected,
            StoreError::Io(e) => Self::Storage(e),
        }
    }
}

/// Why a conversion job failed. Rendered into the job's `error_message`,
/// never returned to the caller that triggered the job.
#[derive(Debug, thiserror::Error)]
pub enum ConversionFailure {
    #[error("Source pack {0} no longer exists")]
    SourceMissing(DbId),

    #[error("Failed to load source pack {id}: {source}")]
    SourceLookup {
        id: DbId,
        #[source]
        source: DbError,
    },

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter failed: {0}")]
    Converter(#[from] ConverterError),

    #[error("Converted file not found in {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Hashing failed: {0}")]
    Hashing(#[source] StoreError),

    #[error("Failed to record converted pack: {0}")]
    Record(#[from] DbError),
}

impl ConversionFailure {
    /// Wrap an I/O error with a short description of the failed step.
    pub fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Io { context, source }
    }
}
