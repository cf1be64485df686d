//! Appending children after the current last position.

use crate::integration::test_utils::{card, positions, FlakyStore};
use cardwright::concurrency::ContainerLockManager;
use cardwright::error::{ApiError, StorageError};
use cardwright::ordering::AppendInsertion;
use cardwright::store::{ChildPayload, NewChild, OrderedChildStore};
use cardwright::types::{ContainerRef, LessonContent};
use std::sync::Arc;

fn setup() -> (Arc<FlakyStore>, AppendInsertion, ContainerRef) {
    let store = Arc::new(FlakyStore::new());
    let lesson = store.seed_lesson();
    let append = AppendInsertion::new(store.clone(), Arc::new(ContainerLockManager::new()));
    (store, append, lesson)
}

#[test]
fn lands_after_current_maximum_in_input_order() {
    let (store, append, lesson) = setup();
    store
        .insert_children(
            &lesson,
            (0..8)
                .map(|i| NewChild {
                    position: i,
                    payload: card(&format!("existing {}", i)),
                })
                .collect(),
        )
        .unwrap();

    let ids = append
        .append_many(&lesson, vec![card("first new"), card("second new")])
        .unwrap();

    let rows = store.select_children(&lesson).unwrap();
    let tail: Vec<(u64, i64, &str)> = rows[8..]
        .iter()
        .map(|r| (r.id, r.position, r.payload.title()))
        .collect();
    assert_eq!(
        tail,
        vec![(ids[0], 8, "first new"), (ids[1], 9, "second new")]
    );
}

#[test]
fn empty_container_starts_at_zero() {
    let (store, append, lesson) = setup();
    let ids = append
        .append_many(&lesson, vec![card("a"), card("b"), card("c")])
        .unwrap();
    assert_eq!(
        positions(store.as_ref(), &lesson),
        vec![(ids[0], 0), (ids[1], 1), (ids[2], 2)]
    );
}

#[test]
fn appending_nothing_writes_nothing() {
    let (store, append, lesson) = setup();
    store.fail_inserts(true);
    assert_eq!(append.append_many(&lesson, Vec::new()).unwrap(), Vec::<u64>::new());
}

#[test]
fn failed_batch_leaves_container_unchanged() {
    let (store, append, lesson) = setup();
    append.append_one(&lesson, card("kept")).unwrap();
    store.fail_inserts(true);

    let err = append
        .append_many(&lesson, vec![card("x"), card("y")])
        .unwrap_err();
    assert!(matches!(err, ApiError::StorageError(StorageError::IoError(_))));
    assert_eq!(store.select_children(&lesson).unwrap().len(), 1);
}

#[test]
fn payload_kind_must_match_container() {
    let (_store, append, lesson) = setup();
    let err = append
        .append_one(
            &lesson,
            ChildPayload::Lesson(LessonContent {
                title: "nested lesson".to_string(),
            }),
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[test]
fn concurrent_appends_keep_positions_dense() {
    let (store, append, lesson) = setup();
    let append = Arc::new(append);

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let append = Arc::clone(&append);
            std::thread::spawn(move || {
                for i in 0..10 {
                    append
                        .append_one(&lesson, card(&format!("t{} c{}", t, i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let rows = positions(store.as_ref(), &lesson);
    assert_eq!(rows.len(), 60);
    assert!(rows.iter().enumerate().all(|(i, (_, p))| *p == i as i64));
}
