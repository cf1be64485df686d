//! Error types for the cardwright content store and generation pipeline.

use crate::ordering::ReorderPhase;
use crate::types::{ChildId, ContainerRef, DraftId};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Child not found: {0}")]
    ChildNotFound(ChildId),

    #[error("Container not found: {0}")]
    ContainerNotFound(ContainerRef),

    /// Uniqueness violation on `(container, position)`.
    #[error("Position {position} is already taken in {container}")]
    PositionConflict {
        container: ContainerRef,
        position: i64,
    },

    #[error("Draft already exists: {0}")]
    DraftExists(DraftId),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    /// True when the store rejected a write because of the position uniqueness constraint.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::PositionConflict { .. })
    }
}

/// API-level errors surfaced to callers of the library and the CLI.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Reorder of {container} failed during {phase} (original order restored: {restored}): {source}")]
    ReorderFailed {
        container: ContainerRef,
        phase: ReorderPhase,
        restored: bool,
        #[source]
        source: StorageError,
    },

    #[error("Draft not found: {0}")]
    DraftNotFound(DraftId),

    #[error("Commit of draft {draft_id} failed; draft retained: {source}")]
    CommitFailed {
        draft_id: DraftId,
        #[source]
        source: StorageError,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
