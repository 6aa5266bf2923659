//! The Batch Pool (spec.md §4.4): runs `handler(record)` across a finite
//! sequence with a concurrency cap, collecting per-item success/failure
//! without ever letting one record's failure abort the others.
//!
//! `results.len() + errors.len() == records.len()` always holds; ordering
//! of either vector relative to `records` is NOT guaranteed (spec.md §4.4,
//! §8 quantified invariant).

use futures::stream::{self, StreamExt};

#[derive(Debug, Clone)]
pub struct BatchItemError<I> {
    pub item: I,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct BatchPoolOutcome<R, I> {
    pub results: Vec<R>,
    pub errors: Vec<BatchItemError<I>>,
}

/// Default concurrency cap (spec.md §4.4). `0` is invalid and rejected at
/// driver init time, not here — by the time a `BatchPool` is constructed
/// the concurrency has already been validated.
pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct BatchPool {
    concurrency: usize,
}

impl Default for BatchPool {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl BatchPool {
    /// `concurrency` is clamped to a minimum of 1 — callers validate `0` as
    /// a configuration error before constructing a pool (spec.md §8
    /// boundary behaviour: `batchConcurrency=0` is rejected at init).
    pub fn new(concurrency: usize) -> Self {
        BatchPool {
            concurrency: concurrency.max(1),
        }
    }

    /// Runs `handler` over every record in `records` with up to
    /// `self.concurrency` invocations in flight at once. `map_error` turns
    /// the handler's error type into the compact string every driver
    /// collects for its `{success, results[], errors[]}` response.
    pub async fn run<T, R, E, F, Fut, M>(&self, records: Vec<T>, handler: F, map_error: M) -> BatchPoolOutcome<R, T>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<R, E>> + Send,
        M: Fn(&E) -> String,
    {
        let concurrency = self.concurrency;
        let outcomes: Vec<(T, Result<R, E>)> = stream::iter(records)
            .map(|item| {
                let item_for_result = item.clone();
                let fut = handler(item);
                async move { (item_for_result, fut.await) }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (item, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(err) => errors.push(BatchItemError {
                    item,
                    error: map_error(&err),
                }),
            }
        }

        BatchPoolOutcome { results, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn every_record_lands_in_results_or_errors() {
        let pool = BatchPool::new(2);
        let records: Vec<i32> = (0..10).collect();

        let outcome = pool
            .run(
                records.clone(),
                |n| async move {
                    if n % 3 == 0 {
                        Err(format!("bad: {n}"))
                    } else {
                        Ok(n * 10)
                    }
                },
                |e: &String| e.clone(),
            )
            .await;

        assert_eq!(outcome.results.len() + outcome.errors.len(), records.len());
        assert_eq!(outcome.errors.len(), 4); // 0, 3, 6, 9
    }

    #[tokio::test]
    async fn empty_batch_never_invokes_handler() {
        let pool = BatchPool::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let outcome: BatchPoolOutcome<(), i32> = pool
            .run(
                Vec::new(),
                move |_item: i32| {
                    let calls_clone = calls_clone.clone();
                    async move {
                        calls_clone.fetch_add(1, Ordering::SeqCst);
                        Ok::<(), String>(())
                    }
                },
                |e: &String| e.clone(),
            )
            .await;

        assert!(outcome.results.is_empty());
        assert!(outcome.errors.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn respects_concurrency_cap() {
        let pool = BatchPool::new(3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));

        let records: Vec<i32> = (0..20).collect();
        let in_flight_handler = in_flight.clone();
        let max_observed_handler = max_observed.clone();

        let _outcome = pool
            .run(
                records,
                move |_n| {
                    let in_flight = in_flight_handler.clone();
                    let max_observed = max_observed_handler.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_observed.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<(), String>(())
                    }
                },
                |e: &String| e.clone(),
            )
            .await;

        assert!(max_observed.load(Ordering::SeqCst) <= 3);
    }
}
