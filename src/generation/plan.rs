//! Lesson planning: turns "N cards for lesson X" into an ordered list of independent
//! generation specs.

use crate::error::ApiError;
use crate::generation::extract_json;
use crate::progress::UpdateSink;
use crate::provider::{ChatMessage, CompletionOptions, ModelProviderClient};
use crate::types::CardType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on cards requested in one plan.
pub const MAX_CARDS_PER_PLAN: usize = 50;

/// One unit of generation work, addressed by its index in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSpec {
    pub card_type: CardType,
    pub brief: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub lesson_title: String,
    pub desired_count: usize,
    #[serde(default)]
    pub context: Option<String>,
}

impl PlanRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.lesson_title.trim().is_empty() {
            return Err(ApiError::Validation("Lesson title cannot be empty".to_string()));
        }
        if self.desired_count == 0 || self.desired_count > MAX_CARDS_PER_PLAN {
            return Err(ApiError::Validation(format!(
                "Card count must be between 1 and {}, got {}",
                MAX_CARDS_PER_PLAN, self.desired_count
            )));
        }
        Ok(())
    }
}

/// Planner output. `declared_count` is what the planner claimed; `cards` is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationPlan {
    pub declared_count: usize,
    pub cards: Vec<GenerationSpec>,
    pub shared_prefix: Option<String>,
}

/// Single planning call against a mock or live backend.
#[async_trait]
pub trait LessonPlanner: Send + Sync {
    async fn plan(&self, request: &PlanRequest) -> Result<GenerationPlan, ApiError>;
}

/// Deterministic planner cycling through card types.
pub struct MockLessonPlanner;

#[async_trait]
impl LessonPlanner for MockLessonPlanner {
    async fn plan(&self, request: &PlanRequest) -> Result<GenerationPlan, ApiError> {
        let cards = (0..request.desired_count)
            .map(|i| {
                let card_type = CardType::ALL[i % CardType::ALL.len()];
                GenerationSpec {
                    card_type,
                    brief: format!(
                        "{} {} of {} for \"{}\"",
                        card_type,
                        i + 1,
                        request.desired_count,
                        request.lesson_title
                    ),
                    title: Some(format!("{} {}", request.lesson_title, i + 1)),
                }
            })
            .collect();

        let mut prefix = format!("Lesson: {}", request.lesson_title);
        if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
            prefix.push_str("\nContext: ");
            prefix.push_str(context.trim());
        }

        Ok(GenerationPlan {
            declared_count: request.desired_count,
            cards,
            shared_prefix: Some(prefix),
        })
    }
}

const PLANNER_SYSTEM_PROMPT: &str = "You plan learning cards for a lesson. Reply with JSON only: \
{\"count\": <number of cards>, \"shared_prefix\": <style and terminology notes reused for every card>, \
\"cards\": [{\"type\": \"explanation|flashcard|quiz|exercise\", \"brief\": <what the card covers>, \"title\": <short title>}]}";

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    shared_prefix: Option<String>,
    cards: Vec<RawSpec>,
}

#[derive(Deserialize)]
struct RawSpec {
    #[serde(rename = "type", alias = "card_type", default)]
    kind: String,
    brief: String,
    #[serde(default)]
    title: Option<String>,
}

/// Planner backed by a model provider.
pub struct ProviderLessonPlanner {
    client: Arc<dyn ModelProviderClient>,
    options: CompletionOptions,
}

impl ProviderLessonPlanner {
    pub fn new(client: Arc<dyn ModelProviderClient>, options: CompletionOptions) -> Self {
        Self { client, options }
    }

    fn parse(content: &str) -> Result<GenerationPlan, ApiError> {
        let raw: RawPlan = serde_json::from_str(extract_json(content))
            .map_err(|e| ApiError::PlanningFailed(format!("Planner returned invalid JSON: {}", e)))?;
        if raw.cards.is_empty() {
            return Err(ApiError::PlanningFailed("Planner returned no cards".to_string()));
        }

        let cards: Vec<GenerationSpec> = raw
            .cards
            .into_iter()
            .map(|spec| {
                let card_type = CardType::parse(&spec.kind).unwrap_or_else(|| {
                    debug!(kind = %spec.kind, "Unknown card type from planner, using explanation");
                    CardType::Explanation
                });
                GenerationSpec {
                    card_type,
                    brief: spec.brief,
                    title: spec.title.filter(|t| !t.trim().is_empty()),
                }
            })
            .collect();

        Ok(GenerationPlan {
            declared_count: raw.count.unwrap_or(cards.len()),
            cards,
            shared_prefix: raw.shared_prefix.filter(|p| !p.trim().is_empty()),
        })
    }
}

#[async_trait]
impl LessonPlanner for ProviderLessonPlanner {
    async fn plan(&self, request: &PlanRequest) -> Result<GenerationPlan, ApiError> {
        let mut prompt = format!(
            "Plan {} cards for the lesson \"{}\".",
            request.desired_count, request.lesson_title
        );
        if let Some(context) = &request.context {
            prompt.push_str("\nContext:\n");
            prompt.push_str(context);
        }

        let response = self
            .client
            .complete(
                vec![ChatMessage::system(PLANNER_SYSTEM_PROMPT), ChatMessage::user(prompt)],
                self.options.clone(),
            )
            .await?;
        debug!(
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Planner response received"
        );
        Self::parse(&response.content)
    }
}

/// Runs the planner and records progress. A disagreement between the declared and the
/// returned card count is noted and the returned list is used.
pub struct GenerationPlanner {
    planner: Arc<dyn LessonPlanner>,
}

impl GenerationPlanner {
    pub fn new(planner: Arc<dyn LessonPlanner>) -> Self {
        Self { planner }
    }

    pub async fn plan(
        &self,
        request: &PlanRequest,
        sink: &dyn UpdateSink,
    ) -> Result<GenerationPlan, ApiError> {
        request.validate()?;
        sink.note(&format!(
            "Planning started: {} cards for \"{}\"",
            request.desired_count, request.lesson_title
        ));

        let mut plan = self.planner.plan(request).await?;
        let actual = plan.cards.len();
        if plan.declared_count != actual {
            warn!(
                declared = plan.declared_count,
                actual,
                lesson = %request.lesson_title,
                "Planner card count mismatch"
            );
            sink.note(&format!(
                "Planner declared {} cards but returned {}; using {}",
                plan.declared_count, actual, actual
            ));
            plan.declared_count = actual;
        }

        info!(cards = actual, lesson = %request.lesson_title, "Plan ready");
        sink.note(&format!("Plan ready: {} cards", actual));
        Ok(plan)
    }
}
