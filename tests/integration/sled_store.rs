//! The course API and pipeline over the sled backend, including reopen.

use crate::integration::test_utils::seed_cards;
use cardwright::api::CourseApi;
use cardwright::concurrency::ContainerLockManager;
use cardwright::generation::{GenerationBackends, GenerationRequest, PlanRequest, RetryPolicy};
use cardwright::ordering::{OrderedSequenceStore, STAGING_OFFSET};
use cardwright::store::{ChildPayload, DraftStore, OrderedChildStore, SledCourseStore};
use cardwright::types::{CardContent, CardType, ContainerRef};
use std::sync::Arc;
use tempfile::TempDir;

fn open_api(dir: &TempDir) -> (Arc<SledCourseStore>, CourseApi) {
    let store = Arc::new(SledCourseStore::open(dir.path().join("store")).unwrap());
    let api = CourseApi::new(store.clone(), Arc::new(ContainerLockManager::new()));
    (store, api)
}

#[test]
fn reordered_lessons_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let (course, expected) = {
        let (store, api) = open_api(&dir);
        let course = api.create_course("Systems").unwrap();
        let a = api.create_lesson(course.id, "Memory").unwrap();
        let b = api.create_lesson(course.id, "Threads").unwrap();
        let c = api.create_lesson(course.id, "Sockets").unwrap();
        api.reorder_lessons(course.id, &[b, c, a]).unwrap();
        store.flush().unwrap();
        (course, vec![b, c, a])
    };

    let (_store, api) = open_api(&dir);
    let lessons = api.list_lessons(course.id).unwrap();
    assert_eq!(lessons.iter().map(|r| r.id).collect::<Vec<_>>(), expected);
    assert_eq!(
        lessons.iter().map(|r| r.position).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(api.list_courses().unwrap().len(), 1);
}

#[test]
fn staging_range_sorts_after_valid_positions() {
    let dir = TempDir::new().unwrap();
    let (store, api) = open_api(&dir);
    let course = api.create_course("Systems").unwrap();
    let lesson = ContainerRef::lesson(api.create_lesson(course.id, "Memory").unwrap());
    let ids = seed_cards(store.as_ref(), &lesson, &["a", "b", "c"]);

    store.update_position(&lesson, ids[0], STAGING_OFFSET).unwrap();
    store.update_position(&lesson, ids[1], -1).unwrap();
    let order: Vec<u64> = store
        .select_children(&lesson)
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(order, vec![ids[1], ids[2], ids[0]]);

    let sequences = OrderedSequenceStore::new(store.clone(), Arc::new(ContainerLockManager::new()));
    sequences.reorder(&lesson, &[ids[0], ids[1], ids[2]]).unwrap();
    let positions: Vec<i64> = store
        .select_children(&lesson)
        .unwrap()
        .iter()
        .map(|r| r.position)
        .collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[tokio::test]
async fn drafts_persist_until_committed() {
    let dir = TempDir::new().unwrap();
    let (lesson_id, draft_id) = {
        let (store, api) = open_api(&dir);
        let course = api.create_course("Systems").unwrap();
        let lesson_id = api.create_lesson(course.id, "Memory").unwrap();
        api.add_card(lesson_id, CardContent::new(CardType::Explanation, "Stack vs heap", "..."))
            .unwrap();

        let pipeline = api.pipeline(GenerationBackends::mock(), RetryPolicy::immediate(3));
        let outcome = pipeline
            .generate_draft(
                "ada",
                &GenerationRequest {
                    lesson: ContainerRef::lesson(lesson_id),
                    plan: PlanRequest {
                        lesson_title: "Memory".to_string(),
                        desired_count: 3,
                        context: None,
                    },
                    concurrency: None,
                },
            )
            .await
            .unwrap();
        store.flush().unwrap();
        (lesson_id, outcome.draft_id)
    };

    let (store, api) = open_api(&dir);
    assert_eq!(store.list_drafts("ada").unwrap().len(), 1);

    let pipeline = api.pipeline(GenerationBackends::mock(), RetryPolicy::immediate(3));
    let committed = pipeline.commit_draft("ada", &draft_id, None).unwrap();
    assert_eq!(committed.committed.unwrap().count, 3);

    let cards = api.list_cards(lesson_id).unwrap();
    assert_eq!(cards.len(), 4);
    assert!(matches!(&cards[0].payload, ChildPayload::Card(c) if c.title == "Stack vs heap"));
    assert_eq!(cards[3].position, 3);
    assert!(store.get_draft(&draft_id).unwrap().is_none());
}
