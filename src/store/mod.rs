//! Course Content Store
//!
//! Persistence contracts for ordered children (lessons in courses, cards in lessons)
//! and for generation drafts. The store enforces uniqueness of `(container, position)`
//! and reports violations as [`StorageError::PositionConflict`].

pub mod memory;
pub mod persistence;

pub use memory::MemoryCourseStore;
pub use persistence::SledCourseStore;

use crate::error::StorageError;
use crate::types::{CardContent, ChildId, ContainerKind, ContainerRef, DraftId, LessonContent};
use serde::{Deserialize, Serialize};

/// Payload stored in a child row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildPayload {
    Lesson(LessonContent),
    Card(CardContent),
}

impl ChildPayload {
    /// Container kind this payload may be stored under.
    pub fn parent_kind(&self) -> ContainerKind {
        match self {
            ChildPayload::Lesson(_) => ContainerKind::Course,
            ChildPayload::Card(_) => ContainerKind::Lesson,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ChildPayload::Lesson(lesson) => &lesson.title,
            ChildPayload::Card(card) => &card.title,
        }
    }
}

/// A stored child with its position among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRow {
    pub id: ChildId,
    pub container: ContainerRef,
    pub position: i64,
    pub payload: ChildPayload,
}

/// A child to insert at an explicit position.
#[derive(Debug, Clone)]
pub struct NewChild {
    pub position: i64,
    pub payload: ChildPayload,
}

/// A course record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: u64,
    pub title: String,
}

/// Draft discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftKind {
    CardBatch,
}

/// A generated, not yet committed batch of cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub draft_id: DraftId,
    pub owner: String,
    pub kind: DraftKind,
    pub target: ContainerRef,
    pub lesson_title: String,
    pub items: Vec<CardContent>,
    pub created_at: String,
}

/// Ordered child store interface
pub trait OrderedChildStore: Send + Sync {
    /// All children of a container, ordered by position.
    fn select_children(&self, container: &ContainerRef) -> Result<Vec<ChildRow>, StorageError>;

    fn get_child(&self, id: ChildId) -> Result<Option<ChildRow>, StorageError>;

    /// Move one child to a new position.
    ///
    /// Fails with `PositionConflict` if a sibling holds `position`, and with
    /// `ChildNotFound` if the child does not belong to `container`.
    fn update_position(
        &self,
        container: &ContainerRef,
        id: ChildId,
        position: i64,
    ) -> Result<(), StorageError>;

    /// Insert all children or none of them.
    fn insert_children(
        &self,
        container: &ContainerRef,
        children: Vec<NewChild>,
    ) -> Result<Vec<ChildId>, StorageError>;

    fn container_exists(&self, container: &ContainerRef) -> Result<bool, StorageError>;
}

/// Course records. Courses are the roots of the hierarchy and are not ordered.
pub trait CourseCatalog: Send + Sync {
    fn create_course(&self, title: &str) -> Result<ContainerRef, StorageError>;

    fn list_courses(&self) -> Result<Vec<CourseRecord>, StorageError>;
}

/// Draft store interface
pub trait DraftStore: Send + Sync {
    /// Persist a new draft. Drafts are write-once: an existing id is rejected.
    fn put_draft(&self, draft: &Draft) -> Result<(), StorageError>;

    fn get_draft(&self, draft_id: &str) -> Result<Option<Draft>, StorageError>;

    /// Remove a draft; returns whether it existed.
    fn delete_draft(&self, draft_id: &str) -> Result<bool, StorageError>;

    fn list_drafts(&self, owner: &str) -> Result<Vec<Draft>, StorageError>;
}

/// Highest position currently used in a container, if any.
pub fn max_position(
    store: &dyn OrderedChildStore,
    container: &ContainerRef,
) -> Result<Option<i64>, StorageError> {
    Ok(store
        .select_children(container)?
        .iter()
        .map(|row| row.position)
        .max())
}
