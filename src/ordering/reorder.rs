//! Two-phase staged reorder.
//!
//! Writing final positions directly can collide with a sibling that still holds the
//! target value. Every child is first moved into a staging range above all current
//! values, then written to its final position. On a failed write the children already
//! touched are parked in a separate holding range and the original positions are
//! restored where possible. A failed reorder never leaves a mixed valid-range ordering.

use crate::concurrency::ContainerLockManager;
use crate::error::{ApiError, StorageError};
use crate::store::OrderedChildStore;
use crate::types::{ChildId, ContainerRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lowest position used for provisional writes.
pub const STAGING_OFFSET: i64 = 1_000_000;

/// Lowest position used to park children while recovering from a failed write.
pub const HOLDING_OFFSET: i64 = 2_000_000;

/// Phase in which a reorder write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorderPhase {
    Staging,
    Commit,
}

impl fmt::Display for ReorderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReorderPhase::Staging => f.write_str("staging"),
            ReorderPhase::Commit => f.write_str("commit"),
        }
    }
}

/// Position ranges for one reorder call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StagingRanges {
    staging_base: i64,
    holding_base: i64,
}

impl StagingRanges {
    /// Both ranges sit above every current value, including leftovers of an earlier
    /// failed reorder, and do not overlap each other.
    fn for_container(current_max: Option<i64>, n: usize) -> Self {
        let staging_base = STAGING_OFFSET.max(current_max.map_or(0, |max| max + 1));
        let holding_base = HOLDING_OFFSET.max(staging_base + n as i64);
        Self {
            staging_base,
            holding_base,
        }
    }
}

/// Rewrites the positions of a container's children to match a caller-given permutation.
pub struct OrderedSequenceStore {
    store: Arc<dyn OrderedChildStore>,
    locks: Arc<ContainerLockManager>,
}

impl OrderedSequenceStore {
    pub fn new(store: Arc<dyn OrderedChildStore>, locks: Arc<ContainerLockManager>) -> Self {
        Self { store, locks }
    }

    /// Reorder the children of `container` so that `ordered_ids[i]` ends at position `i`.
    ///
    /// `ordered_ids` must be exactly the current child ids of the container. Any
    /// mismatch fails with [`ApiError::Validation`] before the first write.
    pub fn reorder(&self, container: &ContainerRef, ordered_ids: &[ChildId]) -> Result<(), ApiError> {
        self.locks
            .with_lock(container, || self.reorder_locked(container, ordered_ids))
    }

    fn reorder_locked(
        &self,
        container: &ContainerRef,
        ordered_ids: &[ChildId],
    ) -> Result<(), ApiError> {
        if !self.store.container_exists(container)? {
            return Err(StorageError::ContainerNotFound(*container).into());
        }

        let rows = self.store.select_children(container)?;
        validate_permutation(&rows.iter().map(|r| r.id).collect::<Vec<_>>(), ordered_ids)?;
        if ordered_ids.is_empty() {
            return Ok(());
        }

        let original: Vec<(ChildId, i64)> = rows.iter().map(|r| (r.id, r.position)).collect();
        let current_max = rows.iter().map(|r| r.position).max();
        let ranges = StagingRanges::for_container(current_max, ordered_ids.len());
        debug!(
            container = %container,
            children = ordered_ids.len(),
            staging_base = ranges.staging_base,
            holding_base = ranges.holding_base,
            "Reorder started"
        );

        // Phase 1: move everything out of the valid range.
        let mut staged = Vec::with_capacity(ordered_ids.len());
        for (index, id) in ordered_ids.iter().enumerate() {
            if let Err(source) =
                self.store
                    .update_position(container, *id, ranges.staging_base + index as i64)
            {
                return Err(self.recover(
                    container,
                    ReorderPhase::Staging,
                    &staged,
                    &original,
                    ranges,
                    source,
                ));
            }
            staged.push((*id, index));
        }

        // Phase 2: final positions in requested order.
        let mut committed = Vec::with_capacity(ordered_ids.len());
        for (index, id) in ordered_ids.iter().enumerate() {
            if let Err(source) = self.store.update_position(container, *id, index as i64) {
                return Err(self.recover(
                    container,
                    ReorderPhase::Commit,
                    &committed,
                    &original,
                    ranges,
                    source,
                ));
            }
            committed.push((*id, index));
        }

        info!(container = %container, children = ordered_ids.len(), "Reorder committed");
        Ok(())
    }

    /// Park `written` children in the holding range, then try to put every child back
    /// at its original position.
    fn recover(
        &self,
        container: &ContainerRef,
        phase: ReorderPhase,
        written: &[(ChildId, usize)],
        original: &[(ChildId, i64)],
        ranges: StagingRanges,
        source: StorageError,
    ) -> ApiError {
        warn!(
            container = %container,
            phase = %phase,
            written = written.len(),
            error = %source,
            "Reorder write failed, recovering"
        );

        for (id, index) in written {
            let holding = ranges.holding_base + *index as i64;
            if let Err(e) = self.store.update_position(container, *id, holding) {
                warn!(container = %container, child_id = id, error = %e, "Failed to park child in holding range");
            }
        }

        let mut restored = true;
        for (id, position) in original {
            if let Err(e) = self.store.update_position(container, *id, *position) {
                restored = false;
                error!(
                    container = %container,
                    child_id = id,
                    position,
                    error = %e,
                    "Failed to restore original position"
                );
            }
        }

        if restored {
            info!(container = %container, phase = %phase, "Original order restored after failed reorder");
        } else {
            error!(container = %container, phase = %phase, "Container left in staging range after failed reorder");
        }

        ApiError::ReorderFailed {
            container: *container,
            phase,
            restored,
            source,
        }
    }
}

/// `requested` must be a duplicate-free permutation of `current`.
fn validate_permutation(current: &[ChildId], requested: &[ChildId]) -> Result<(), ApiError> {
    let mut seen = HashSet::with_capacity(requested.len());
    if let Some(dup) = requested.iter().find(|id| !seen.insert(**id)) {
        return Err(ApiError::Validation(format!("Duplicate child id {} in order", dup)));
    }
    if requested.len() != current.len() {
        return Err(ApiError::Validation(format!(
            "Order lists {} children but container has {}",
            requested.len(),
            current.len()
        )));
    }
    let current_set: HashSet<ChildId> = current.iter().copied().collect();
    if let Some(unknown) = requested.iter().find(|id| !current_set.contains(id)) {
        return Err(ApiError::Validation(format!(
            "Child {} does not belong to this container",
            unknown
        )));
    }
    Ok(())
}
