//! Draft/commit pipeline.
//!
//! plan → generate → persist draft → append to the lesson → delete draft. A draft whose
//! commit fails is kept so the commit can be retried.

use crate::concurrency::ContainerLockManager;
use crate::error::{ApiError, StorageError};
use crate::generation::plan::{GenerationPlanner, PlanRequest};
use crate::generation::pool::{resolve_concurrency, BoundedWorkerPool};
use crate::generation::GenerationBackends;
use crate::generation::RetryPolicy;
use crate::ordering::AppendInsertion;
use crate::progress::{UpdateEntry, UpdateLog, UpdateSink};
use crate::store::{ChildPayload, Draft, DraftKind, DraftStore, OrderedChildStore};
use crate::types::{new_draft_id, CardContent, ChildId, ContainerKind, ContainerRef, DraftId};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Request to generate cards for an existing lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub lesson: ContainerRef,
    pub plan: PlanRequest,
    /// Raw concurrency parameter; overrides the pipeline default when set.
    #[serde(default)]
    pub concurrency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub count: usize,
    pub ids: Vec<ChildId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub draft_id: DraftId,
    pub items: Vec<CardContent>,
    pub committed: Option<CommitSummary>,
    pub log: Vec<UpdateEntry>,
}

pub struct DraftCommitPipeline {
    store: Arc<dyn OrderedChildStore>,
    drafts: Arc<dyn DraftStore>,
    planner: GenerationPlanner,
    pool: BoundedWorkerPool,
    append: AppendInsertion,
    default_concurrency: Option<String>,
}

impl DraftCommitPipeline {
    pub fn new(
        store: Arc<dyn OrderedChildStore>,
        drafts: Arc<dyn DraftStore>,
        locks: Arc<ContainerLockManager>,
        backends: GenerationBackends,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            append: AppendInsertion::new(Arc::clone(&store), locks),
            store,
            drafts,
            planner: GenerationPlanner::new(backends.planner),
            pool: BoundedWorkerPool::new(backends.generator, policy),
            default_concurrency: None,
        }
    }

    /// Concurrency used when a request does not carry its own.
    pub fn with_default_concurrency(mut self, raw: Option<String>) -> Self {
        self.default_concurrency = raw;
        self
    }

    pub fn pool(&self) -> &BoundedWorkerPool {
        &self.pool
    }

    /// Plan and generate cards, then persist them as a draft without committing.
    pub async fn generate_draft(
        &self,
        owner: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, ApiError> {
        let log = UpdateLog::new();
        let draft = self.generate_into_draft(owner, request, &log).await?;
        Ok(GenerationOutcome {
            draft_id: draft.draft_id,
            items: draft.items,
            committed: None,
            log: log.entries(),
        })
    }

    /// Commit a draft owned by `owner`. `selection` picks plan indices; `None` commits all.
    pub fn commit_draft(
        &self,
        owner: &str,
        draft_id: &str,
        selection: Option<&[usize]>,
    ) -> Result<GenerationOutcome, ApiError> {
        let log = UpdateLog::new();
        let (draft, summary) = self.commit_with_log(owner, draft_id, selection, &log)?;
        Ok(GenerationOutcome {
            draft_id: draft.draft_id,
            items: draft.items,
            committed: Some(summary),
            log: log.entries(),
        })
    }

    /// `generate_draft` followed by committing every generated card.
    pub async fn generate_and_commit(
        &self,
        owner: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, ApiError> {
        let log = UpdateLog::new();
        let draft = self.generate_into_draft(owner, request, &log).await?;
        let (_, summary) = self.commit_with_log(owner, &draft.draft_id, None, &log)?;
        Ok(GenerationOutcome {
            draft_id: draft.draft_id,
            items: draft.items,
            committed: Some(summary),
            log: log.entries(),
        })
    }

    pub fn list_drafts(&self, owner: &str) -> Result<Vec<Draft>, ApiError> {
        Ok(self.drafts.list_drafts(owner)?)
    }

    pub fn get_draft(&self, owner: &str, draft_id: &str) -> Result<Draft, ApiError> {
        let draft = self
            .drafts
            .get_draft(draft_id)?
            .ok_or_else(|| ApiError::DraftNotFound(draft_id.to_string()))?;
        if draft.owner != owner {
            return Err(ApiError::Unauthorized(format!(
                "Draft {} belongs to another user",
                draft_id
            )));
        }
        Ok(draft)
    }

    async fn generate_into_draft(
        &self,
        owner: &str,
        request: &GenerationRequest,
        log: &UpdateLog,
    ) -> Result<Draft, ApiError> {
        if request.lesson.kind != ContainerKind::Lesson {
            return Err(ApiError::Validation(format!(
                "Cards can only be generated for a lesson, got {}",
                request.lesson
            )));
        }
        if !self.store.container_exists(&request.lesson)? {
            return Err(StorageError::ContainerNotFound(request.lesson).into());
        }

        let plan = self.planner.plan(&request.plan, log).await?;
        let raw = request
            .concurrency
            .as_deref()
            .or(self.default_concurrency.as_deref());
        let concurrency = resolve_concurrency(raw, log);

        let items = self
            .pool
            .generate(plan.cards, plan.shared_prefix, concurrency, Arc::new(log.clone()))
            .await;

        let draft = Draft {
            draft_id: new_draft_id(),
            owner: owner.to_string(),
            kind: DraftKind::CardBatch,
            target: request.lesson,
            lesson_title: request.plan.lesson_title.clone(),
            items,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        self.drafts.put_draft(&draft)?;
        info!(draft_id = %draft.draft_id, cards = draft.items.len(), owner, "Draft saved");
        log.note(&format!("Draft {} saved with {} cards", draft.draft_id, draft.items.len()));
        Ok(draft)
    }

    /// Append the selected cards and consume the draft.
    ///
    /// The draft is re-read, appended and deleted under the target container's lock,
    /// so concurrent commits of one draft land it once; the others see it gone.
    fn commit_with_log(
        &self,
        owner: &str,
        draft_id: &str,
        selection: Option<&[usize]>,
        log: &UpdateLog,
    ) -> Result<(Draft, CommitSummary), ApiError> {
        let target = self.get_draft(owner, draft_id)?.target;

        let (draft, summary) = self.append.locks().with_lock(&target, || {
            let draft = self.get_draft(owner, draft_id)?;
            let indices = select_indices(draft.items.len(), selection)?;
            let payloads: Vec<ChildPayload> = indices
                .iter()
                .map(|&i| ChildPayload::Card(draft.items[i].clone()))
                .collect();

            let ids = self
                .append
                .append_locked(&draft.target, payloads)
                .map_err(|e| match e {
                    ApiError::StorageError(source) => {
                        warn!(draft_id, error = %source, "Commit failed, draft retained");
                        ApiError::CommitFailed {
                            draft_id: draft_id.to_string(),
                            source,
                        }
                    }
                    other => other,
                })?;

            match self.drafts.delete_draft(draft_id) {
                Ok(true) => {}
                Ok(false) => warn!(draft_id, "Committed draft was already gone"),
                Err(e) => warn!(draft_id, error = %e, "Failed to delete committed draft"),
            }
            let summary = CommitSummary {
                count: ids.len(),
                ids,
            };
            Ok::<_, ApiError>((draft, summary))
        })?;

        info!(draft_id, count = summary.count, target = %draft.target, "Draft committed");
        log.note(&format!("Committed {} cards to {}", summary.count, draft.target));
        Ok((draft, summary))
    }
}

/// Plan indices to commit, in plan order.
fn select_indices(len: usize, selection: Option<&[usize]>) -> Result<Vec<usize>, ApiError> {
    let Some(selection) = selection else {
        return Ok((0..len).collect());
    };
    if selection.is_empty() {
        return Err(ApiError::Validation("Selection is empty".to_string()));
    }
    let mut seen = HashSet::new();
    for &index in selection {
        if index >= len {
            return Err(ApiError::Validation(format!(
                "Card index {} is out of range (draft has {} cards)",
                index, len
            )));
        }
        if !seen.insert(index) {
            return Err(ApiError::Validation(format!("Card index {} selected twice", index)));
        }
    }
    let mut indices = selection.to_vec();
    indices.sort_unstable();
    Ok(indices)
}
