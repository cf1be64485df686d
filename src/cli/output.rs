//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output, with a hint where the user
/// can act on the failure.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ReorderFailed {
            restored: false, ..
        } => format!(
            "Error: {}\nSome rows were left in the staging range; rerun the reorder to repair the order.",
            e
        ),
        ApiError::CommitFailed { draft_id, .. } => format!(
            "Error: {}\nRetry with 'cardwright draft commit {}'.",
            e, draft_id
        ),
        ApiError::ProviderNotConfigured(_) => format!(
            "Error: {}\nAdd a [provider] section to config/config.toml or set generation.mode = \"mock\".",
            e
        ),
        _ => format!("Error: {}", e),
    }
}
