//! In-memory implementation of the course content store.

use crate::error::StorageError;
use crate::store::{
    ChildPayload, ChildRow, CourseCatalog, CourseRecord, Draft, DraftStore, NewChild,
    OrderedChildStore,
};
use crate::types::{ChildId, ContainerKind, ContainerRef, LessonContent};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    courses: BTreeMap<u64, CourseRecord>,
    rows: HashMap<ChildId, ChildRow>,
    positions: BTreeMap<(ContainerRef, i64), ChildId>,
    drafts: BTreeMap<String, Draft>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn container_exists(&self, container: &ContainerRef) -> bool {
        match container.kind {
            ContainerKind::Course => self.courses.contains_key(&container.id),
            ContainerKind::Lesson => matches!(
                self.rows.get(&container.id),
                Some(ChildRow {
                    payload: ChildPayload::Lesson(_),
                    ..
                })
            ),
        }
    }
}

/// Store backed by process memory; same semantics as [`super::SledCourseStore`].
#[derive(Default)]
pub struct MemoryCourseStore {
    state: RwLock<MemoryState>,
}

impl MemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for tests and embedders: create a course with one lesson.
    pub fn seed_lesson(&self, course_title: &str, lesson_title: &str) -> Result<ContainerRef, StorageError> {
        let course = self.create_course(course_title)?;
        let ids = self.insert_children(
            &course,
            vec![NewChild {
                position: 0,
                payload: ChildPayload::Lesson(LessonContent {
                    title: lesson_title.to_string(),
                }),
            }],
        )?;
        Ok(ContainerRef::lesson(ids[0]))
    }
}

impl CourseCatalog for MemoryCourseStore {
    fn create_course(&self, title: &str) -> Result<ContainerRef, StorageError> {
        let mut state = self.state.write();
        let id = state.allocate_id();
        state.courses.insert(
            id,
            CourseRecord {
                id,
                title: title.to_string(),
            },
        );
        Ok(ContainerRef::course(id))
    }

    fn list_courses(&self) -> Result<Vec<CourseRecord>, StorageError> {
        Ok(self.state.read().courses.values().cloned().collect())
    }
}

impl OrderedChildStore for MemoryCourseStore {
    fn select_children(&self, container: &ContainerRef) -> Result<Vec<ChildRow>, StorageError> {
        let state = self.state.read();
        let rows = state
            .positions
            .range((*container, i64::MIN)..=(*container, i64::MAX))
            .filter_map(|(_, id)| state.rows.get(id).cloned())
            .collect();
        Ok(rows)
    }

    fn get_child(&self, id: ChildId) -> Result<Option<ChildRow>, StorageError> {
        Ok(self.state.read().rows.get(&id).cloned())
    }

    fn update_position(
        &self,
        container: &ContainerRef,
        id: ChildId,
        position: i64,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let old_position = match state.rows.get(&id) {
            Some(row) if row.container == *container => row.position,
            _ => return Err(StorageError::ChildNotFound(id)),
        };
        if old_position == position {
            return Ok(());
        }
        if state.positions.contains_key(&(*container, position)) {
            return Err(StorageError::PositionConflict {
                container: *container,
                position,
            });
        }
        state.positions.remove(&(*container, old_position));
        state.positions.insert((*container, position), id);
        if let Some(row) = state.rows.get_mut(&id) {
            row.position = position;
        }
        Ok(())
    }

    fn insert_children(
        &self,
        container: &ContainerRef,
        children: Vec<NewChild>,
    ) -> Result<Vec<ChildId>, StorageError> {
        let mut state = self.state.write();
        if !state.container_exists(container) {
            return Err(StorageError::ContainerNotFound(*container));
        }

        let mut batch_positions = HashSet::new();
        for child in &children {
            if !batch_positions.insert(child.position)
                || state.positions.contains_key(&(*container, child.position))
            {
                return Err(StorageError::PositionConflict {
                    container: *container,
                    position: child.position,
                });
            }
        }

        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            let id = state.allocate_id();
            state.positions.insert((*container, child.position), id);
            state.rows.insert(
                id,
                ChildRow {
                    id,
                    container: *container,
                    position: child.position,
                    payload: child.payload,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    fn container_exists(&self, container: &ContainerRef) -> Result<bool, StorageError> {
        Ok(self.state.read().container_exists(container))
    }
}

impl DraftStore for MemoryCourseStore {
    fn put_draft(&self, draft: &Draft) -> Result<(), StorageError> {
        let mut state = self.state.write();
        if state.drafts.contains_key(&draft.draft_id) {
            return Err(StorageError::DraftExists(draft.draft_id.clone()));
        }
        state.drafts.insert(draft.draft_id.clone(), draft.clone());
        Ok(())
    }

    fn get_draft(&self, draft_id: &str) -> Result<Option<Draft>, StorageError> {
        Ok(self.state.read().drafts.get(draft_id).cloned())
    }

    fn delete_draft(&self, draft_id: &str) -> Result<bool, StorageError> {
        Ok(self.state.write().drafts.remove(draft_id).is_some())
    }

    fn list_drafts(&self, owner: &str) -> Result<Vec<Draft>, StorageError> {
        Ok(self
            .state
            .read()
            .drafts
            .values()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect())
    }
}
