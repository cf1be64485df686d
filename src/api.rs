//! Course Content API
//!
//! In-process facade over the store, ordering and generation layers. Callers address
//! courses and lessons by id; the facade validates kinds and existence before any
//! write reaches the store.

use crate::concurrency::ContainerLockManager;
use crate::error::{ApiError, StorageError};
use crate::generation::{DraftCommitPipeline, GenerationBackends, RetryPolicy};
use crate::ordering::{AppendInsertion, OrderedSequenceStore};
use crate::store::{
    ChildPayload, ChildRow, CourseCatalog, CourseRecord, DraftStore, OrderedChildStore,
};
use crate::types::{CardContent, ChildId, ContainerRef, LessonContent};
use std::sync::Arc;
use tracing::info;

/// Course API service
///
/// Cheap to share behind an `Arc`; all mutations of one container are serialized
/// by the shared [`ContainerLockManager`].
pub struct CourseApi {
    catalog: Arc<dyn CourseCatalog>,
    children: Arc<dyn OrderedChildStore>,
    drafts: Arc<dyn DraftStore>,
    locks: Arc<ContainerLockManager>,
    sequences: OrderedSequenceStore,
    append: AppendInsertion,
}

impl CourseApi {
    /// Build the facade over one backend that implements every store contract.
    pub fn new<S>(store: Arc<S>, locks: Arc<ContainerLockManager>) -> Self
    where
        S: CourseCatalog + OrderedChildStore + DraftStore + 'static,
    {
        let children: Arc<dyn OrderedChildStore> = store.clone();
        Self {
            catalog: store.clone(),
            drafts: store,
            sequences: OrderedSequenceStore::new(Arc::clone(&children), Arc::clone(&locks)),
            append: AppendInsertion::new(Arc::clone(&children), Arc::clone(&locks)),
            children,
            locks,
        }
    }

    pub fn create_course(&self, title: &str) -> Result<ContainerRef, ApiError> {
        let title = require_title(title)?;
        let course = self.catalog.create_course(title)?;
        info!(course = %course, title, "Course created");
        Ok(course)
    }

    pub fn list_courses(&self) -> Result<Vec<CourseRecord>, ApiError> {
        Ok(self.catalog.list_courses()?)
    }

    /// Append a lesson to the end of a course. The returned id addresses the lesson.
    pub fn create_lesson(&self, course_id: u64, title: &str) -> Result<ChildId, ApiError> {
        let title = require_title(title)?;
        let course = ContainerRef::course(course_id);
        let id = self.append.append_one(
            &course,
            ChildPayload::Lesson(LessonContent {
                title: title.to_string(),
            }),
        )?;
        info!(course = %course, lesson_id = id, "Lesson created");
        Ok(id)
    }

    pub fn list_lessons(&self, course_id: u64) -> Result<Vec<ChildRow>, ApiError> {
        self.list_children(&ContainerRef::course(course_id))
    }

    /// Append one hand-written card to the end of a lesson.
    pub fn add_card(&self, lesson_id: ChildId, card: CardContent) -> Result<ChildId, ApiError> {
        require_title(&card.title)?;
        let lesson = ContainerRef::lesson(lesson_id);
        let id = self.append.append_one(&lesson, ChildPayload::Card(card))?;
        info!(lesson = %lesson, card_id = id, "Card added");
        Ok(id)
    }

    pub fn list_cards(&self, lesson_id: ChildId) -> Result<Vec<ChildRow>, ApiError> {
        self.list_children(&ContainerRef::lesson(lesson_id))
    }

    pub fn reorder_lessons(&self, course_id: u64, ordered_ids: &[ChildId]) -> Result<(), ApiError> {
        self.sequences
            .reorder(&ContainerRef::course(course_id), ordered_ids)
    }

    pub fn reorder_cards(&self, lesson_id: ChildId, ordered_ids: &[ChildId]) -> Result<(), ApiError> {
        self.sequences
            .reorder(&ContainerRef::lesson(lesson_id), ordered_ids)
    }

    /// Title of a lesson, used as the default planning title.
    pub fn lesson_title(&self, lesson_id: ChildId) -> Result<String, ApiError> {
        match self.children.get_child(lesson_id)? {
            Some(ChildRow {
                payload: ChildPayload::Lesson(lesson),
                ..
            }) => Ok(lesson.title),
            _ => Err(StorageError::ContainerNotFound(ContainerRef::lesson(lesson_id)).into()),
        }
    }

    /// Draft/commit pipeline sharing this facade's store and locks.
    pub fn pipeline(&self, backends: GenerationBackends, policy: RetryPolicy) -> DraftCommitPipeline {
        DraftCommitPipeline::new(
            Arc::clone(&self.children),
            Arc::clone(&self.drafts),
            Arc::clone(&self.locks),
            backends,
            policy,
        )
    }

    fn list_children(&self, container: &ContainerRef) -> Result<Vec<ChildRow>, ApiError> {
        if !self.children.container_exists(container)? {
            return Err(StorageError::ContainerNotFound(*container).into());
        }
        Ok(self.children.select_children(container)?)
    }
}

fn require_title(title: &str) -> Result<&str, ApiError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("Title cannot be empty".to_string()));
    }
    Ok(trimmed)
}
