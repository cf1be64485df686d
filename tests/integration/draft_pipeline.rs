//! Draft/commit pipeline end to end over the in-memory and failure-injecting stores.

use crate::integration::test_utils::{seed_cards, FlakyStore};
use async_trait::async_trait;
use cardwright::concurrency::ContainerLockManager;
use cardwright::error::{ApiError, StorageError};
use cardwright::generation::{
    DraftCommitPipeline, GenerationBackends, GenerationPlan, GenerationRequest, GenerationSpec,
    LessonPlanner, MockCardGenerator, PlanRequest, RetryPolicy,
};
use cardwright::store::{DraftStore, OrderedChildStore};
use cardwright::types::{CardType, ContainerRef};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn pipeline_over(store: &Arc<FlakyStore>, backends: GenerationBackends) -> DraftCommitPipeline {
    DraftCommitPipeline::new(
        store.clone(),
        store.clone(),
        Arc::new(ContainerLockManager::new()),
        backends,
        RetryPolicy::immediate(3),
    )
}

fn request(lesson: ContainerRef, count: usize) -> GenerationRequest {
    GenerationRequest {
        lesson,
        plan: PlanRequest {
            lesson_title: "Lifetimes".to_string(),
            desired_count: count,
            context: Some("Audience: new Rust programmers".to_string()),
        },
        concurrency: Some("2".to_string()),
    }
}

/// Planner that claims more cards than it returns and counts its calls.
struct OverclaimingPlanner {
    calls: AtomicUsize,
}

#[async_trait]
impl LessonPlanner for OverclaimingPlanner {
    async fn plan(&self, request: &PlanRequest) -> Result<GenerationPlan, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GenerationPlan {
            declared_count: request.desired_count + 2,
            cards: (0..request.desired_count)
                .map(|i| GenerationSpec {
                    card_type: CardType::Quiz,
                    brief: format!("question {}", i),
                    title: None,
                })
                .collect(),
            shared_prefix: None,
        })
    }
}

#[tokio::test]
async fn generate_and_commit_appends_in_plan_order() {
    let store = Arc::new(FlakyStore::new());
    let lesson = store.seed_lesson();
    seed_cards(store.as_ref(), &lesson, &["intro", "recap"]);
    let pipeline = pipeline_over(&store, GenerationBackends::mock());

    let outcome = pipeline
        .generate_and_commit("ada", &request(lesson, 4))
        .await
        .unwrap();

    let summary = outcome.committed.as_ref().unwrap();
    assert_eq!(summary.count, 4);
    assert_eq!(outcome.items.len(), 4);

    let rows = store.select_children(&lesson).unwrap();
    assert_eq!(rows.len(), 6);
    let appended: Vec<(u64, i64, String)> = rows[2..]
        .iter()
        .map(|r| (r.id, r.position, r.payload.title().to_string()))
        .collect();
    let expected: Vec<(u64, i64, String)> = summary
        .ids
        .iter()
        .zip(&outcome.items)
        .enumerate()
        .map(|(i, (id, item))| (*id, 2 + i as i64, item.title.clone()))
        .collect();
    assert_eq!(appended, expected);

    assert!(store.get_draft(&outcome.draft_id).unwrap().is_none());

    let texts: Vec<&str> = outcome.log.iter().map(|e| e.text.as_str()).collect();
    assert!(texts[0].starts_with("Planning started"));
    assert!(texts.contains(&"Plan ready: 4 cards"));
    assert!(texts.contains(&"Generated card 4/4"));
    assert!(texts.last().unwrap().starts_with("Committed 4 cards"));
}

#[tokio::test]
async fn draft_only_then_partial_commit() {
    let store = Arc::new(FlakyStore::new());
    let lesson = store.seed_lesson();
    let pipeline = pipeline_over(&store, GenerationBackends::mock());

    let outcome = pipeline.generate_draft("ada", &request(lesson, 5)).await.unwrap();
    assert!(outcome.committed.is_none());
    assert!(store.select_children(&lesson).unwrap().is_empty());
    assert_eq!(pipeline.list_drafts("ada").unwrap().len(), 1);
    assert!(pipeline.list_drafts("grace").unwrap().is_empty());

    let committed = pipeline
        .commit_draft("ada", &outcome.draft_id, Some(&[4, 1][..]))
        .unwrap();
    let rows = store.select_children(&lesson).unwrap();
    assert_eq!(
        rows.iter().map(|r| r.payload.title().to_string()).collect::<Vec<_>>(),
        vec![outcome.items[1].title.clone(), outcome.items[4].title.clone()]
    );
    assert_eq!(committed.committed.unwrap().count, 2);
    assert!(pipeline.list_drafts("ada").unwrap().is_empty());
}

#[tokio::test]
async fn invalid_selection_writes_nothing() {
    let store = Arc::new(FlakyStore::new());
    let lesson = store.seed_lesson();
    let pipeline = pipeline_over(&store, GenerationBackends::mock());
    let outcome = pipeline.generate_draft("ada", &request(lesson, 2)).await.unwrap();

    for selection in [&[2usize][..], &[0, 0][..], &[][..]] {
        let err = pipeline
            .commit_draft("ada", &outcome.draft_id, Some(selection))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
    assert!(store.select_children(&lesson).unwrap().is_empty());
    assert!(store.get_draft(&outcome.draft_id).unwrap().is_some());
}

#[tokio::test]
async fn failed_commit_keeps_draft_for_retry() {
    let store = Arc::new(FlakyStore::new());
    let lesson = store.seed_lesson();
    let pipeline = pipeline_over(&store, GenerationBackends::mock());
    let outcome = pipeline.generate_draft("ada", &request(lesson, 3)).await.unwrap();

    store.fail_inserts(true);
    let err = pipeline.commit_draft("ada", &outcome.draft_id, None).unwrap_err();
    match err {
        ApiError::CommitFailed { draft_id, .. } => assert_eq!(draft_id, outcome.draft_id),
        other => panic!("expected CommitFailed, got {:?}", other),
    }
    assert!(store.select_children(&lesson).unwrap().is_empty());
    assert!(store.get_draft(&outcome.draft_id).unwrap().is_some());

    store.fail_inserts(false);
    let retried = pipeline.commit_draft("ada", &outcome.draft_id, None).unwrap();
    assert_eq!(retried.committed.unwrap().count, 3);
    assert_eq!(store.select_children(&lesson).unwrap().len(), 3);
}

#[tokio::test]
async fn concurrent_commits_consume_draft_once() {
    let store = Arc::new(FlakyStore::new());
    let lesson = store.seed_lesson();
    let pipeline = pipeline_over(&store, GenerationBackends::mock());
    let outcome = pipeline.generate_draft("ada", &request(lesson, 3)).await.unwrap();

    store.slow_inserts(Duration::from_millis(200));
    let results: Vec<Result<usize, ApiError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    pipeline
                        .commit_draft("ada", &outcome.draft_id, None)
                        .map(|o| o.committed.map_or(0, |c| c.count))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let committed: Vec<usize> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(committed, vec![3]);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(ApiError::DraftNotFound(_)))));
    assert_eq!(store.select_children(&lesson).unwrap().len(), 3);
    assert!(store.get_draft(&outcome.draft_id).unwrap().is_none());
}

#[tokio::test]
async fn drafts_belong_to_their_owner() {
    let store = Arc::new(FlakyStore::new());
    let lesson = store.seed_lesson();
    let pipeline = pipeline_over(&store, GenerationBackends::mock());
    let outcome = pipeline.generate_draft("ada", &request(lesson, 1)).await.unwrap();

    assert!(matches!(
        pipeline.commit_draft("grace", &outcome.draft_id, None),
        Err(ApiError::Unauthorized(_))
    ));
    assert!(matches!(
        pipeline.get_draft("ada", "draft-missing"),
        Err(ApiError::DraftNotFound(_))
    ));
}

#[tokio::test]
async fn missing_lesson_fails_before_planning() {
    let store = Arc::new(FlakyStore::new());
    let planner = Arc::new(OverclaimingPlanner {
        calls: AtomicUsize::new(0),
    });
    let pipeline = pipeline_over(
        &store,
        GenerationBackends {
            planner: planner.clone(),
            generator: Arc::new(MockCardGenerator),
        },
    );

    let err = pipeline
        .generate_and_commit("ada", &request(ContainerRef::lesson(777), 2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::StorageError(StorageError::ContainerNotFound(_))
    ));

    let err = pipeline
        .generate_draft("ada", &request(ContainerRef::course(1), 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    assert_eq!(planner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn planner_count_mismatch_uses_returned_cards() {
    let store = Arc::new(FlakyStore::new());
    let lesson = store.seed_lesson();
    let pipeline = pipeline_over(
        &store,
        GenerationBackends {
            planner: Arc::new(OverclaimingPlanner {
                calls: AtomicUsize::new(0),
            }),
            generator: Arc::new(MockCardGenerator),
        },
    );

    let outcome = pipeline
        .generate_and_commit("ada", &request(lesson, 3))
        .await
        .unwrap();
    assert_eq!(outcome.items.len(), 3);
    assert!(outcome
        .log
        .iter()
        .any(|e| e.text == "Planner declared 5 cards but returned 3; using 3"));
    assert_eq!(outcome.items[0].title, "quiz card");
}

#[tokio::test]
async fn bad_concurrency_falls_back_and_is_logged() {
    let store = Arc::new(FlakyStore::new());
    let lesson = store.seed_lesson();
    let pipeline = pipeline_over(&store, GenerationBackends::mock());

    let mut req = request(lesson, 2);
    req.concurrency = Some("many".to_string());
    let outcome = pipeline.generate_draft("ada", &req).await.unwrap();
    assert!(outcome
        .log
        .iter()
        .any(|e| e.text == "Concurrency invalid value 'many'; using default of 4"));
}
