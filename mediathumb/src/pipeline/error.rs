//! Error types for the generation pipeline.
//!
//! Errors are categorized by pipeline stage. They never escape a generation
//! call: each one is turned into a diagnostic record and a `false` result.
//! Only the on-demand read path surfaces an error to the caller.

use thiserror::Error;

use crate::derivative::{AssetId, DerivativeKind};
use crate::encoder::EncodeError;
use crate::metadata::MetadataError;
use crate::source::LoadError;
use crate::store::{KvError, StoreError};

use super::stage::Stage;

/// Errors that end a generation run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No strategy of the load ladder produced pixels
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Encoding a derivative failed
    #[error("{kind} compression failed: {source}")]
    CompressionFailure {
        kind: DerivativeKind,
        #[source]
        source: EncodeError,
    },

    /// Writing a derivative to its store failed
    #[error("{kind} persist failed: {reason}")]
    PersistFailure { kind: DerivativeKind, reason: String },

    /// Writing derivative bookkeeping failed
    #[error("metadata update failed: {0}")]
    MetadataUpdateFailure(#[from] MetadataError),

    /// A run tried to move its stage tracker backwards
    #[error("illegal stage transition {from} -> {to}")]
    IllegalTransition { from: Stage, to: Stage },
}

impl PipelineError {
    /// Numeric code recorded in diagnostics.
    pub fn code(&self) -> i32 {
        match self {
            PipelineError::SourceUnavailable(_) => 1001,
            PipelineError::CompressionFailure { .. } => 1002,
            PipelineError::PersistFailure { .. } => 1003,
            PipelineError::MetadataUpdateFailure(_) => 1004,
            PipelineError::IllegalTransition { .. } => 1099,
        }
    }

    pub(crate) fn persist(kind: DerivativeKind, err: impl std::fmt::Display) -> Self {
        PipelineError::PersistFailure {
            kind,
            reason: err.to_string(),
        }
    }
}

impl From<LoadError> for PipelineError {
    fn from(err: LoadError) -> Self {
        PipelineError::SourceUnavailable(err.to_string())
    }
}

/// Errors returned by the on-demand read path.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Generation ran and reported failure
    #[error("{kind} for asset {asset_id} could not be generated")]
    GenerationFailed {
        asset_id: AssetId,
        kind: DerivativeKind,
    },

    /// Generation reported success but the derivative is still absent
    #[error("{kind} for asset {asset_id} is missing after generation")]
    Missing {
        asset_id: AssetId,
        kind: DerivativeKind,
    },

    /// Tiny kinds were requested but no key-value store is configured
    #[error("{0} needs a key-value store, none is configured")]
    KvUnavailable(DerivativeKind),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Kv(#[from] KvError),
}
