//! Append new children after the current last position.

use crate::concurrency::ContainerLockManager;
use crate::error::{ApiError, StorageError};
use crate::store::{max_position, ChildPayload, NewChild, OrderedChildStore};
use crate::types::{ChildId, ContainerRef};
use std::sync::Arc;
use tracing::{debug, info};

pub struct AppendInsertion {
    store: Arc<dyn OrderedChildStore>,
    locks: Arc<ContainerLockManager>,
}

impl AppendInsertion {
    pub fn new(store: Arc<dyn OrderedChildStore>, locks: Arc<ContainerLockManager>) -> Self {
        Self { store, locks }
    }

    /// Insert `items` in input order at consecutive positions after the current maximum.
    ///
    /// An empty container receives positions starting at 0. The batch is inserted
    /// atomically; a store failure leaves the container unchanged.
    pub fn append_many(
        &self,
        container: &ContainerRef,
        items: Vec<ChildPayload>,
    ) -> Result<Vec<ChildId>, ApiError> {
        self.locks
            .with_lock(container, || self.append_locked(container, items))
    }

    pub(crate) fn locks(&self) -> &ContainerLockManager {
        &self.locks
    }

    /// Body of [`Self::append_many`]; the caller must hold the lock of `container`.
    pub(crate) fn append_locked(
        &self,
        container: &ContainerRef,
        items: Vec<ChildPayload>,
    ) -> Result<Vec<ChildId>, ApiError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(item) = items.iter().find(|i| i.parent_kind() != container.kind) {
            return Err(ApiError::Validation(format!(
                "'{}' cannot be added to {}",
                item.title(),
                container
            )));
        }
        if !self.store.container_exists(container)? {
            return Err(StorageError::ContainerNotFound(*container).into());
        }
        let start = max_position(self.store.as_ref(), container)?.map_or(0, |max| max + 1);
        debug!(container = %container, start, count = items.len(), "Appending children");

        let children = items
            .into_iter()
            .enumerate()
            .map(|(offset, payload)| NewChild {
                position: start + offset as i64,
                payload,
            })
            .collect();
        let ids = self.store.insert_children(container, children)?;
        info!(container = %container, count = ids.len(), "Children appended");
        Ok(ids)
    }

    /// Append a single child and return its id.
    pub fn append_one(&self, container: &ContainerRef, item: ChildPayload) -> Result<ChildId, ApiError> {
        let ids = self.append_many(container, vec![item])?;
        ids.into_iter()
            .next()
            .ok_or_else(|| ApiError::Validation("Append produced no id".to_string()))
    }
}
