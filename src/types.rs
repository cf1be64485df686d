//! Core identifiers and content types shared across the store, ordering and
//! generation layers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a stored child row (a lesson or a card).
pub type ChildId = u64;

/// Identifier of a persisted generation draft.
pub type DraftId = String;

/// Kind of entity that owns an ordered set of children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerKind {
    /// A course; its children are lessons.
    Course,
    /// A lesson; its children are cards.
    Lesson,
}

impl ContainerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerKind::Course => "course",
            ContainerKind::Lesson => "lesson",
        }
    }

    fn tag(self) -> u8 {
        match self {
            ContainerKind::Course => b'c',
            ContainerKind::Lesson => b'l',
        }
    }
}

/// Address of an ordered container.
///
/// A lesson's child row id in its course doubles as the lesson's container id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerRef {
    pub kind: ContainerKind,
    pub id: u64,
}

impl ContainerRef {
    pub fn course(id: u64) -> Self {
        Self {
            kind: ContainerKind::Course,
            id,
        }
    }

    pub fn lesson(id: ChildId) -> Self {
        Self {
            kind: ContainerKind::Lesson,
            id,
        }
    }

    /// Byte prefix used for per-container key ranges: kind tag followed by big-endian id.
    pub fn key_prefix(&self) -> [u8; 9] {
        let mut key = [0u8; 9];
        key[0] = self.kind.tag();
        key[1..].copy_from_slice(&self.id.to_be_bytes());
        key
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Kind of learning card a generation spec asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Explanation,
    Flashcard,
    Quiz,
    Exercise,
}

impl CardType {
    pub const ALL: [CardType; 4] = [
        CardType::Explanation,
        CardType::Flashcard,
        CardType::Quiz,
        CardType::Exercise,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CardType::Explanation => "explanation",
            CardType::Flashcard => "flashcard",
            CardType::Quiz => "quiz",
            CardType::Exercise => "exercise",
        }
    }

    /// Lenient parse used for planner output; unknown names map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "explanation" | "concept" | "text" => Some(CardType::Explanation),
            "flashcard" | "flash_card" | "flash-card" => Some(CardType::Flashcard),
            "quiz" | "question" | "mcq" => Some(CardType::Quiz),
            "exercise" | "practice" => Some(CardType::Exercise),
            _ => None,
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of a single card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContent {
    pub card_type: CardType,
    pub title: String,
    pub body: String,
    /// Set when generation permanently failed and this card is a placeholder.
    pub generation_error: Option<String>,
}

impl CardContent {
    pub fn new(card_type: CardType, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            card_type,
            title: title.into(),
            body: body.into(),
            generation_error: None,
        }
    }

    /// Minimal valid card standing in for one that could not be generated.
    pub fn placeholder(card_type: CardType, title: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            card_type,
            title: title.into(),
            body: format!("Generation failed: {}", error),
            generation_error: Some(error),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.generation_error.is_some()
    }
}

/// Content of a lesson row inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    pub title: String,
}

static DRAFT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique draft id.
pub fn new_draft_id() -> DraftId {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let pid = std::process::id();
    let seq = DRAFT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("draft-{ts}-{pid}-{seq}")
}
