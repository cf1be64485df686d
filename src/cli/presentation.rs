//! CLI presentation: text and json formatters per command family.

mod course;
mod generation;

use crate::error::ApiError;

pub use course::{format_children, format_courses, format_created};
pub use generation::{format_draft, format_drafts, format_outcome};

/// Output format selected by a command's `--format` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Result<Self, ApiError> {
        match value {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ApiError::Validation(format!(
                "Invalid format: {}. Must be 'text' or 'json'",
                other
            ))),
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::Validation(format!("Failed to encode output: {}", e)))
}
