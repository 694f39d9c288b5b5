//! Ordered batch embedding over a bounded worker pool.
//!
//! Texts are cut into contiguous batches tagged with their starting row.
//! Workers pull batches from a bounded channel, call the provider, and push
//! `(start, vectors)` back; the coordinator collects results keyed by start
//! and concatenates them in ascending order once every batch has reported.
//! The first failed batch aborts the run.

use crate::{EmbeddingProfile, EmbeddingProvider};
use core_types::{BuildError, BuildResult};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Progress notification delivered on the coordinating thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

struct BatchTask<'a> {
    start: usize,
    texts: &'a [String],
}

type BatchResult = BuildResult<(usize, Vec<Vec<f32>>)>;

pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    concurrency: usize,
}

impl BatchEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, concurrency: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Confirm `requested` is served; otherwise fall back to the first model
    /// of the sorted listing and warn. Listing failures are fatal.
    pub fn resolve_model(&self, requested: &str) -> BuildResult<String> {
        let endpoint = self.provider.endpoint().to_string();
        let mut available = self.provider.list_models().map_err(|err| match err {
            BuildError::ProviderUnavailable { .. } => err,
            other => BuildError::ProviderUnavailable {
                endpoint: endpoint.clone(),
                reason: other.to_string(),
            },
        })?;

        if available.iter().any(|m| m == requested) {
            return Ok(requested.to_string());
        }

        available.sort();
        available.dedup();
        let Some(fallback) = available.first().cloned() else {
            return Err(BuildError::ProviderUnavailable {
                endpoint,
                reason: "provider lists no models".to_string(),
            });
        };

        let notice = BuildError::ModelNotFound {
            requested: requested.to_string(),
            available: available.join(", "),
        };
        warn!(
            %notice,
            %endpoint,
            fallback = %fallback,
            "using first available model; search results may differ from builds with the requested model"
        );
        Ok(fallback)
    }

    /// Embed `texts` (after applying `profile`) and return one vector per
    /// text in input order.
    pub fn embed_all(
        &self,
        model: &str,
        profile: EmbeddingProfile,
        texts: &[String],
        on_progress: &mut dyn FnMut(BatchProgress),
    ) -> BuildResult<Vec<Vec<f32>>> {
        let prefixed: Vec<String> = texts.iter().map(|t| profile.prefix(t)).collect();
        let tasks: Vec<BatchTask<'_>> = prefixed
            .chunks(self.batch_size)
            .enumerate()
            .map(|(i, texts)| BatchTask {
                start: i * self.batch_size,
                texts,
            })
            .collect();
        let total = tasks.len();

        info!(
            texts = texts.len(),
            batches = total,
            batch_size = self.batch_size,
            concurrency = self.concurrency,
            model,
            profile = %profile,
            "embedding texts"
        );

        if total == 0 {
            return Ok(Vec::new());
        }

        let results = if total == 1 {
            let (start, vectors) = run_batch(self.provider.as_ref(), model, &tasks[0])?;
            on_progress(BatchProgress {
                completed: 1,
                total,
            });
            BTreeMap::from([(start, vectors)])
        } else {
            self.run_pool(model, tasks, on_progress)?
        };

        let vectors: Vec<Vec<f32>> = results.into_values().flatten().collect();
        debug_assert_eq!(vectors.len(), texts.len());
        Ok(vectors)
    }

    fn run_pool(
        &self,
        model: &str,
        tasks: Vec<BatchTask<'_>>,
        on_progress: &mut dyn FnMut(BatchProgress),
    ) -> BuildResult<BTreeMap<usize, Vec<Vec<f32>>>> {
        let total = tasks.len();
        let workers = self.concurrency.min(total);
        let provider = self.provider.as_ref();

        thread::scope(|scope| {
            let (task_tx, task_rx) = bounded::<BatchTask<'_>>(workers * 2);
            let (result_tx, result_rx) = bounded::<BatchResult>(workers * 2);

            for worker_id in 0..workers {
                let rx = task_rx.clone();
                let tx = result_tx.clone();
                scope.spawn(move || worker_loop(worker_id, provider, model, &rx, &tx));
            }
            drop(task_rx);
            drop(result_tx);

            scope.spawn(move || feed(tasks, &task_tx));

            collect_results(&result_rx, total, on_progress)
        })
    }
}

fn feed<'a>(tasks: Vec<BatchTask<'a>>, sender: &Sender<BatchTask<'a>>) {
    for task in tasks {
        // Receivers are gone once the coordinator aborts on a failed batch.
        if sender.send(task).is_err() {
            break;
        }
    }
}

fn worker_loop(
    worker_id: usize,
    provider: &dyn EmbeddingProvider,
    model: &str,
    receiver: &Receiver<BatchTask<'_>>,
    sender: &Sender<BatchResult>,
) {
    for task in receiver {
        debug!(
            worker_id,
            start = task.start,
            len = task.texts.len(),
            "embedding batch"
        );
        let result = run_batch(provider, model, &task);
        if sender.send(result).is_err() {
            break;
        }
    }
}

/// Completion barrier: wait until every batch has reported, keyed by start row.
fn collect_results(
    receiver: &Receiver<BatchResult>,
    total: usize,
    on_progress: &mut dyn FnMut(BatchProgress),
) -> BuildResult<BTreeMap<usize, Vec<Vec<f32>>>> {
    let mut results = BTreeMap::new();
    while results.len() < total {
        let Ok(outcome) = receiver.recv() else {
            return Err(BuildError::EmbeddingBatchFailed {
                start: 0,
                reason: format!(
                    "worker pool exited with {} of {total} batches outstanding",
                    total - results.len()
                ),
            });
        };
        let (start, vectors) = outcome?;
        results.insert(start, vectors);
        on_progress(BatchProgress {
            completed: results.len(),
            total,
        });
    }
    Ok(results)
}

fn run_batch(
    provider: &dyn EmbeddingProvider,
    model: &str,
    task: &BatchTask<'_>,
) -> BatchResult {
    let vectors = provider
        .embed(model, task.texts)
        .map_err(|err| BuildError::EmbeddingBatchFailed {
            start: task.start,
            reason: err.to_string(),
        })?;
    if vectors.len() != task.texts.len() {
        return Err(BuildError::EmbeddingBatchFailed {
            start: task.start,
            reason: format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                task.texts.len()
            ),
        });
    }
    Ok((task.start, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Encodes each input's row index (parsed from the text) into its vector.
    /// Later batches finish first so completion order differs from input order.
    struct IndexEchoProvider {
        models: Vec<String>,
        calls: AtomicUsize,
        fail_at: Option<usize>,
        seen: Mutex<Vec<String>>,
    }

    impl IndexEchoProvider {
        fn new() -> Self {
            Self {
                models: vec!["b-model".into(), "a-model".into()],
                calls: AtomicUsize::new(0),
                fail_at: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    fn index_of(text: &str) -> usize {
        text.rsplit(' ').next().unwrap().parse().unwrap()
    }

    impl EmbeddingProvider for IndexEchoProvider {
        fn endpoint(&self) -> &str {
            "stub://echo"
        }

        fn list_models(&self) -> BuildResult<Vec<String>> {
            Ok(self.models.clone())
        }

        fn embed(&self, _model: &str, batch: &[String]) -> BuildResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().extend(batch.iter().cloned());
            let first = index_of(&batch[0]);
            if self.fail_at.is_some_and(|row| batch.iter().any(|t| index_of(t) == row)) {
                return Err(BuildError::ProviderUnavailable {
                    endpoint: "stub://echo".into(),
                    reason: "boom".into(),
                });
            }
            thread::sleep(Duration::from_millis(((50 - first.min(50)) / 10) as u64));
            Ok(batch
                .iter()
                .map(|t| vec![index_of(t) as f32, 1.0])
                .collect())
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk {i}")).collect()
    }

    fn embed(provider: Arc<IndexEchoProvider>, n: usize, batch: usize, conc: usize) -> BuildResult<Vec<Vec<f32>>> {
        let embedder = BatchEmbedder::new(provider, batch, conc);
        embedder.embed_all("a-model", EmbeddingProfile::Plain, &texts(n), &mut |_| {})
    }

    #[test]
    fn preserves_input_order_across_workers() {
        let provider = Arc::new(IndexEchoProvider::new());
        let out = embed(provider.clone(), 53, 4, 6).unwrap();
        assert_eq!(out.len(), 53);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(v[0] as usize, i);
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 14);
    }

    #[test]
    fn single_batch_runs_inline() {
        let provider = Arc::new(IndexEchoProvider::new());
        let mut events = Vec::new();
        let embedder = BatchEmbedder::new(provider.clone(), 64, 8);
        let out = embedder
            .embed_all("a-model", EmbeddingProfile::Plain, &texts(10), &mut |p| events.push(p))
            .unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(events, vec![BatchProgress { completed: 1, total: 1 }]);
    }

    #[test]
    fn empty_input_makes_no_calls() {
        let provider = Arc::new(IndexEchoProvider::new());
        let out = embed(provider.clone(), 0, 8, 2).unwrap();
        assert!(out.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn profile_prefix_reaches_provider() {
        let provider = Arc::new(IndexEchoProvider::new());
        let embedder = BatchEmbedder::new(provider.clone(), 2, 2);
        embedder
            .embed_all("a-model", EmbeddingProfile::E5, &texts(3), &mut |_| {})
            .unwrap();
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|t| t.starts_with("passage: chunk ")));
    }

    #[test]
    fn failed_batch_aborts_run() {
        let provider = Arc::new(IndexEchoProvider {
            fail_at: Some(17),
            ..IndexEchoProvider::new()
        });
        let err = embed(provider, 40, 5, 3).unwrap_err();
        match err {
            BuildError::EmbeddingBatchFailed { start, reason } => {
                assert_eq!(start, 15);
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn progress_reports_every_batch() {
        let provider = Arc::new(IndexEchoProvider::new());
        let embedder = BatchEmbedder::new(provider, 3, 2);
        let mut last = None;
        let mut count = 0;
        embedder
            .embed_all("a-model", EmbeddingProfile::Plain, &texts(10), &mut |p| {
                count += 1;
                last = Some(p);
            })
            .unwrap();
        assert_eq!(count, 4);
        assert_eq!(last, Some(BatchProgress { completed: 4, total: 4 }));
    }

    #[test]
    fn missing_model_falls_back_to_sorted_first() {
        let embedder = BatchEmbedder::new(Arc::new(IndexEchoProvider::new()), 8, 1);
        assert_eq!(embedder.resolve_model("b-model").unwrap(), "b-model");
        assert_eq!(embedder.resolve_model("missing").unwrap(), "a-model");
    }

    #[test]
    fn empty_listing_is_provider_unavailable() {
        let provider = IndexEchoProvider {
            models: Vec::new(),
            ..IndexEchoProvider::new()
        };
        let embedder = BatchEmbedder::new(Arc::new(provider), 8, 1);
        assert!(matches!(
            embedder.resolve_model("x"),
            Err(BuildError::ProviderUnavailable { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn order_holds_for_any_partition(n in 0usize..60, batch in 1usize..9, conc in 1usize..6) {
            let out = embed(Arc::new(IndexEchoProvider::new()), n, batch, conc).unwrap();
            prop_assert_eq!(out.len(), n);
            for (i, v) in out.iter().enumerate() {
                prop_assert_eq!(v[0] as usize, i);
            }
        }
    }
}
