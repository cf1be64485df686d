//! Per-card content generators.

use crate::error::ApiError;
use crate::generation::extract_json;
use crate::generation::plan::GenerationSpec;
use crate::provider::{ChatMessage, CompletionOptions, ModelProviderClient};
use crate::types::{CardContent, CardType};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Produces the content of one card. Stateless; the pool supplies ordering.
#[async_trait]
pub trait CardGenerator: Send + Sync {
    async fn generate_one(
        &self,
        spec: &GenerationSpec,
        shared_prefix: Option<&str>,
    ) -> Result<CardContent, ApiError>;
}

fn fallback_title(spec: &GenerationSpec) -> String {
    spec.title
        .clone()
        .unwrap_or_else(|| format!("{} card", spec.card_type))
}

/// Offline generator that builds card text from the brief.
pub struct MockCardGenerator;

#[async_trait]
impl CardGenerator for MockCardGenerator {
    async fn generate_one(
        &self,
        spec: &GenerationSpec,
        shared_prefix: Option<&str>,
    ) -> Result<CardContent, ApiError> {
        let body = match shared_prefix {
            Some(prefix) => format!("{}\n\n{}", prefix, spec.brief),
            None => spec.brief.clone(),
        };
        Ok(CardContent::new(spec.card_type, fallback_title(spec), body))
    }
}

fn instructions(card_type: CardType) -> &'static str {
    match card_type {
        CardType::Explanation => "Explain the concept clearly in a few short paragraphs.",
        CardType::Flashcard => "Write a question on the first line and its answer below it.",
        CardType::Quiz => "Write a multiple-choice question with four options and mark the correct one.",
        CardType::Exercise => "Write a hands-on exercise with a short expected solution.",
    }
}

#[derive(Deserialize)]
struct RawCard {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: String,
}

/// Generator backed by a model provider. The model must answer with `{title, body}` JSON;
/// anything else is an error so the pool retries it.
pub struct ProviderCardGenerator {
    client: Arc<dyn ModelProviderClient>,
    options: CompletionOptions,
}

impl ProviderCardGenerator {
    pub fn new(client: Arc<dyn ModelProviderClient>, options: CompletionOptions) -> Self {
        Self { client, options }
    }

    fn parse(spec: &GenerationSpec, content: &str) -> Result<CardContent, ApiError> {
        let raw: RawCard = serde_json::from_str(extract_json(content)).map_err(|e| {
            ApiError::GenerationFailed(format!("Card response is not valid JSON: {}", e))
        })?;
        if raw.body.trim().is_empty() {
            return Err(ApiError::GenerationFailed("Card body is empty".to_string()));
        }
        let title = raw
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| fallback_title(spec));
        Ok(CardContent::new(spec.card_type, title, raw.body))
    }
}

#[async_trait]
impl CardGenerator for ProviderCardGenerator {
    async fn generate_one(
        &self,
        spec: &GenerationSpec,
        shared_prefix: Option<&str>,
    ) -> Result<CardContent, ApiError> {
        let mut system = format!(
            "You write one {} card. {} Reply with JSON only: {{\"title\": string, \"body\": string}}.",
            spec.card_type,
            instructions(spec.card_type)
        );
        if let Some(prefix) = shared_prefix {
            system.push_str("\n\n");
            system.push_str(prefix);
        }
        let mut user = spec.brief.clone();
        if let Some(title) = &spec.title {
            user = format!("Title: {}\n{}", title, user);
        }

        let response = self
            .client
            .complete(
                vec![ChatMessage::system(system), ChatMessage::user(user)],
                self.options.clone(),
            )
            .await?;
        debug!(
            card_type = %spec.card_type,
            total_tokens = response.usage.total_tokens,
            "Card response received"
        );
        Self::parse(spec, &response.content)
    }
}
