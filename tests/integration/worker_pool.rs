//! Bounded worker pool: output shape, ordering, retries and the concurrency cap.

use async_trait::async_trait;
use cardwright::error::ApiError;
use cardwright::generation::{BoundedWorkerPool, CardGenerator, GenerationSpec, RetryPolicy};
use cardwright::progress::UpdateLog;
use cardwright::types::{CardContent, CardType};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn specs(n: usize) -> Vec<GenerationSpec> {
    (0..n)
        .map(|i| GenerationSpec {
            card_type: CardType::ALL[i % CardType::ALL.len()],
            brief: format!("brief {}", i),
            title: Some(format!("spec {}", i)),
        })
        .collect()
}

fn index_of(spec: &GenerationSpec) -> usize {
    spec.brief
        .trim_start_matches("brief ")
        .parse()
        .unwrap()
}

/// Generator with per-index delays, permanent failures, and in-flight accounting.
#[derive(Default)]
struct ScriptedGenerator {
    failing: HashSet<usize>,
    delay_ms: HashMap<usize, u64>,
    attempts: Mutex<HashMap<usize, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    finished: Mutex<Vec<usize>>,
}

#[async_trait]
impl CardGenerator for ScriptedGenerator {
    async fn generate_one(
        &self,
        spec: &GenerationSpec,
        _shared_prefix: Option<&str>,
    ) -> Result<CardContent, ApiError> {
        let index = index_of(spec);
        *self.attempts.lock().entry(index).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.delay_ms.get(&index).copied().unwrap_or(5);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&index) {
            return Err(ApiError::GenerationFailed(format!("card {} always fails", index)));
        }
        self.finished.lock().push(index);
        Ok(CardContent::new(spec.card_type, format!("generated {}", index), spec.brief.clone()))
    }
}

async fn run(generator: Arc<ScriptedGenerator>, n: usize, concurrency: usize) -> (Vec<CardContent>, UpdateLog) {
    let pool = BoundedWorkerPool::new(generator, RetryPolicy::immediate(3));
    let log = UpdateLog::new();
    let out = pool
        .generate(specs(n), None, concurrency, Arc::new(log.clone()))
        .await;
    (out, log)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn output_length_matches_plan_for_any_concurrency() {
    for (n, k) in [(0, 1), (1, 1), (3, 1), (3, 3), (3, 10), (7, 2)] {
        let (out, _) = run(Arc::new(ScriptedGenerator::default()), n, k).await;
        assert_eq!(out.len(), n, "n={} k={}", n, k);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn order_follows_plan_not_completion() {
    let n = 6;
    let generator = Arc::new(ScriptedGenerator {
        delay_ms: (0..n).map(|i| (i, (n - i) as u64 * 15)).collect(),
        ..ScriptedGenerator::default()
    });
    let (out, _) = run(generator.clone(), n, n).await;

    let finished = generator.finished.lock().clone();
    assert_ne!(finished, (0..n).collect::<Vec<_>>(), "completion order should differ");
    let titles: Vec<String> = out.iter().map(|c| c.title.clone()).collect();
    let expected: Vec<String> = (0..n).map(|i| format!("generated {}", i)).collect();
    assert_eq!(titles, expected);
}

#[tokio::test]
async fn permanently_failing_card_is_tried_three_times() {
    let generator = Arc::new(ScriptedGenerator {
        failing: [1].into_iter().collect(),
        ..ScriptedGenerator::default()
    });
    let (out, _) = run(generator.clone(), 3, 2).await;

    assert_eq!(generator.attempts.lock().get(&1).copied(), Some(3));
    assert_eq!(generator.attempts.lock().get(&0).copied(), Some(1));
    assert!(out[1].is_placeholder());
    assert_eq!(out[1].title, "spec 1");
    assert!(!out[0].is_placeholder() && !out[2].is_placeholder());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_calls_never_exceed_cap() {
    for (n, k) in [(10, 3), (4, 8), (6, 1)] {
        let generator = Arc::new(ScriptedGenerator {
            delay_ms: (0..n).map(|i| (i, 20)).collect(),
            ..ScriptedGenerator::default()
        });
        run(generator.clone(), n, k).await;
        let max = generator.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= k.min(n), "n={} k={} saw {}", n, k, max);
        assert!(max >= 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_cards_two_failing_with_concurrency_two() {
    let generator = Arc::new(ScriptedGenerator {
        failing: [1, 3].into_iter().collect(),
        ..ScriptedGenerator::default()
    });
    let (out, log) = run(generator, 5, 2).await;

    assert_eq!(out.len(), 5);
    let placeholders: Vec<usize> = out
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_placeholder())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(placeholders, vec![1, 3]);
    for i in [1, 3] {
        assert!(out[i].body.contains(&format!("card {} always fails", i)));
    }
    for i in [0, 2, 4] {
        assert_eq!(out[i].title, format!("generated {}", i));
    }

    let progress: Vec<String> = log
        .entries()
        .into_iter()
        .map(|e| e.text)
        .filter(|t| t.starts_with("Generated card"))
        .collect();
    assert_eq!(progress.len(), 5);
    assert_eq!(progress.last().map(String::as_str), Some("Generated card 5/5"));
}

#[tokio::test]
async fn retries_wait_with_backoff() {
    let generator = Arc::new(ScriptedGenerator {
        failing: [0].into_iter().collect(),
        delay_ms: [(0, 0)].into_iter().collect(),
        ..ScriptedGenerator::default()
    });
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(20),
        max_jitter: Duration::ZERO,
    };
    let pool = BoundedWorkerPool::new(generator, policy);

    let started = std::time::Instant::now();
    let out = pool
        .generate(specs(1), None, 1, Arc::new(UpdateLog::new()))
        .await;
    // 20ms after the first failure, 40ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert!(out[0].is_placeholder());
}
