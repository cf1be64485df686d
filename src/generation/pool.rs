//! Bounded worker pool for card generation.
//!
//! Workers claim plan indices from a shared atomic cursor and write each result into
//! the slot of that index, so output order is plan order regardless of completion
//! order. A card that exhausts its retries becomes a placeholder; the pool itself
//! never fails.

use crate::generation::backoff::RetryPolicy;
use crate::generation::generator::CardGenerator;
use crate::generation::plan::GenerationSpec;
use crate::progress::UpdateSink;
use crate::types::CardContent;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;

const CANCELLED_MESSAGE: &str = "generation cancelled";

/// Parse a concurrency parameter. Missing, non-numeric and zero values fall back to
/// [`DEFAULT_CONCURRENCY`] and the fallback is recorded in `sink`.
pub fn resolve_concurrency(raw: Option<&str>, sink: &dyn UpdateSink) -> usize {
    let reason = match raw.map(str::trim) {
        None | Some("") => "not set".to_string(),
        Some(value) => match value.parse::<usize>() {
            Ok(n) if n >= 1 => return n,
            _ => format!("invalid value '{}'", value),
        },
    };
    warn!(reason = %reason, default = DEFAULT_CONCURRENCY, "Concurrency fallback");
    sink.note(&format!(
        "Concurrency {}; using default of {}",
        reason, DEFAULT_CONCURRENCY
    ));
    DEFAULT_CONCURRENCY
}

/// State shared by the workers of one `generate` call.
struct PoolRun {
    generator: Arc<dyn CardGenerator>,
    specs: Vec<GenerationSpec>,
    shared_prefix: Option<String>,
    slots: Vec<OnceLock<CardContent>>,
    cursor: AtomicUsize,
    completed: AtomicUsize,
    policy: RetryPolicy,
    cancel: CancellationToken,
    sink: Arc<dyn UpdateSink>,
}

pub struct BoundedWorkerPool {
    generator: Arc<dyn CardGenerator>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl BoundedWorkerPool {
    pub fn new(generator: Arc<dyn CardGenerator>, policy: RetryPolicy) -> Self {
        Self {
            generator,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops further claims and retry waits when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Generate one card per spec with at most `concurrency` calls in flight.
    ///
    /// Always returns exactly `specs.len()` cards, `output[i]` belonging to `specs[i]`.
    pub async fn generate(
        &self,
        specs: Vec<GenerationSpec>,
        shared_prefix: Option<String>,
        concurrency: usize,
        sink: Arc<dyn UpdateSink>,
    ) -> Vec<CardContent> {
        let total = specs.len();
        let worker_count = concurrency.min(total).max(1);
        let run = Arc::new(PoolRun {
            generator: Arc::clone(&self.generator),
            slots: (0..total).map(|_| OnceLock::new()).collect(),
            specs,
            shared_prefix,
            cursor: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            policy: self.policy,
            cancel: self.cancel.clone(),
            sink,
        });
        debug!(total, workers = worker_count, "Starting generation workers");

        let handles: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                let run = Arc::clone(&run);
                tokio::spawn(async move { Self::worker_loop(worker_id, run).await })
            })
            .collect();
        for (worker_id, joined) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                error!(worker_id, error = %e, "Generation worker stopped abnormally");
            }
        }

        let mut unresolved = 0usize;
        let cards: Vec<CardContent> = run
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| match slot.get() {
                Some(card) => card.clone(),
                None => {
                    unresolved += 1;
                    let reason = if run.cancel.is_cancelled() {
                        CANCELLED_MESSAGE
                    } else {
                        "generation worker stopped"
                    };
                    placeholder_for(&run.specs[index], index, reason.to_string())
                }
            })
            .collect();

        if unresolved > 0 {
            run.sink.note(&format!(
                "{} of {} cards were not generated and hold placeholders",
                unresolved, total
            ));
        }
        info!(
            total,
            placeholders = cards.iter().filter(|c| c.is_placeholder()).count(),
            "Generation finished"
        );
        cards
    }

    async fn worker_loop(worker_id: usize, run: Arc<PoolRun>) {
        let total = run.specs.len();
        loop {
            if run.cancel.is_cancelled() {
                debug!(worker_id, "Worker stopping on cancellation");
                break;
            }
            let index = run.cursor.fetch_add(1, Ordering::SeqCst);
            if index >= total {
                break;
            }

            let card = Self::generate_with_retry(&run, index).await;
            if run.slots[index].set(card).is_err() {
                error!(worker_id, index, "Slot written twice");
            }
            let done = run.completed.fetch_add(1, Ordering::SeqCst) + 1;
            run.sink.note(&format!("Generated card {}/{}", done, total));
        }
    }

    async fn generate_with_retry(run: &PoolRun, index: usize) -> CardContent {
        let spec = &run.specs[index];
        let max_attempts = run.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match run
                .generator
                .generate_one(spec, run.shared_prefix.as_deref())
                .await
            {
                Ok(card) => return card,
                Err(e) => {
                    last_error = e.to_string();
                    warn!(index, attempt, max_attempts, error = %e, "Card generation attempt failed");
                }
            }

            if attempt == max_attempts {
                break;
            }
            if run.cancel.is_cancelled() {
                last_error = format!("{} ({})", last_error, CANCELLED_MESSAGE);
                break;
            }
            let delay = run.policy.delay_with_jitter(attempt);
            tokio::select! {
                _ = run.cancel.cancelled() => {
                    last_error = format!("{} ({})", last_error, CANCELLED_MESSAGE);
                    break;
                }
                _ = sleep(delay) => {}
            }
        }

        error!(index, error = %last_error, "Card generation failed permanently, using placeholder");
        placeholder_for(spec, index, last_error)
    }
}

fn placeholder_for(spec: &GenerationSpec, index: usize, error: String) -> CardContent {
    let title = spec
        .title
        .clone()
        .unwrap_or_else(|| format!("Card {}", index + 1));
    CardContent::placeholder(spec.card_type, title, error)
}
