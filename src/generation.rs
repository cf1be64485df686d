//! Card generation: planning, bounded concurrent generation with retries, and the
//! draft/commit pipeline that lands generated cards in a lesson.

pub mod backoff;
pub mod generator;
pub mod pipeline;
pub mod plan;
pub mod pool;

pub use backoff::{backoff_delay, RetryPolicy};
pub use generator::{CardGenerator, MockCardGenerator, ProviderCardGenerator};
pub use pipeline::{CommitSummary, DraftCommitPipeline, GenerationOutcome, GenerationRequest};
pub use plan::{
    GenerationPlan, GenerationPlanner, GenerationSpec, LessonPlanner, MockLessonPlanner,
    PlanRequest, ProviderLessonPlanner, MAX_CARDS_PER_PLAN,
};
pub use pool::{resolve_concurrency, BoundedWorkerPool, DEFAULT_CONCURRENCY};

use crate::config::GenerationMode;
use crate::error::ApiError;
use crate::provider::ProviderConfig;
use std::sync::Arc;
use tracing::info;

/// Planner and card generator pair used by a pipeline.
#[derive(Clone)]
pub struct GenerationBackends {
    pub planner: Arc<dyn LessonPlanner>,
    pub generator: Arc<dyn CardGenerator>,
}

impl GenerationBackends {
    pub fn mock() -> Self {
        Self {
            planner: Arc::new(MockLessonPlanner),
            generator: Arc::new(MockCardGenerator),
        }
    }

    /// Select backends for `mode`. Live mode needs a provider section.
    pub fn for_mode(mode: GenerationMode, provider: Option<&ProviderConfig>) -> Result<Self, ApiError> {
        match mode {
            GenerationMode::Mock => Ok(Self::mock()),
            GenerationMode::Live => {
                let provider = provider.ok_or_else(|| {
                    ApiError::ProviderNotConfigured(
                        "generation.mode is 'live' but no [provider] section is configured"
                            .to_string(),
                    )
                })?;
                let client = provider.create_client()?;
                let options = provider.completion_options();
                info!(
                    provider = client.provider_name(),
                    model = client.model_name(),
                    "Using live generation backends"
                );
                Ok(Self {
                    planner: Arc::new(ProviderLessonPlanner::new(client.clone(), options.clone())),
                    generator: Arc::new(ProviderCardGenerator::new(client, options)),
                })
            }
        }
    }
}

/// Extract the JSON payload from model output that may be wrapped in a code fence.
pub(crate) fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}
