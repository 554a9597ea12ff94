use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Outcome of one instance's execution, as the caller's producer classifies
/// it. The executor itself never inspects `T` beyond sorting outcomes into
/// the stats bucket the caller names in [`InstanceOutcome::bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Passed,
    Failed,
    Errored,
}

/// One instance's result plus which stats bucket it belongs in.
pub struct InstanceOutcome<T> {
    pub index: usize,
    pub kind: OutcomeKind,
    pub value: T,
}

/// Final tally across a run, matching spec §4.12's required
/// `{passed, failed, errors, cancelled}` stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub cancelled: usize,
}

/// Bounded-concurrency parallel executor over `count` instances.
///
/// At most `parallelism` producer futures run concurrently, backed by a
/// [`tokio::sync::Semaphore`]. `cancel` is checked before each instance
/// acquires its permit: once set, unscheduled instances resolve as
/// `cancelled` without ever invoking their producer, while in-flight
/// instances run to completion (spec §4.12's cancellation contract).
pub struct ParallelExecutor {
    parallelism: usize,
    cancel: CancellationToken,
}

impl ParallelExecutor {
    #[must_use]
    pub fn new(parallelism: usize, cancel: CancellationToken) -> Self {
        Self {
            parallelism: parallelism.max(1),
            cancel,
        }
    }

    /// Run `count` instances through `produce`, collecting results in
    /// completion order, and return them alongside the accumulated stats.
    ///
    /// `produce(index)` must itself never panic in a way the caller wants
    /// surfaced as anything other than an errored instance; a panicking
    /// task is caught by `JoinSet` and folded into the `errors` bucket so
    /// one bad instance can never abort the run.
    #[instrument(skip(self, produce))]
    pub async fn run<T, F, Fut>(&self, count: usize, produce: F) -> (Vec<InstanceOutcome<T>>, ExecutionStats)
    where
        T: Send + 'static,
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InstanceOutcome<T>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let produce = Arc::new(produce);
        let mut joins = JoinSet::new();
        let mut stats = ExecutionStats::default();
        let scheduled = Arc::new(AtomicUsize::new(0));

        for index in 0..count {
            if self.cancel.is_cancelled() {
                stats.cancelled += count - index;
                debug!(remaining = count - index, "run cancelled, skipping unscheduled instances");
                break;
            }

            let semaphore = Arc::clone(&semaphore);
            let produce = Arc::clone(&produce);
            let cancel = self.cancel.clone();
            let scheduled = Arc::clone(&scheduled);

            joins.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return None,
                    permit = semaphore.acquire_owned() => permit.expect("semaphore is never closed"),
                };
                scheduled.fetch_add(1, Ordering::SeqCst);
                let outcome = produce(index).await;
                drop(permit);
                Some(outcome)
            });
        }

        let mut results = Vec::with_capacity(count);
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok(Some(outcome)) => {
                    match outcome.kind {
                        OutcomeKind::Passed => stats.passed += 1,
                        OutcomeKind::Failed => stats.failed += 1,
                        OutcomeKind::Errored => stats.errors += 1,
                    }
                    results.push(outcome);
                }
                Ok(None) => stats.cancelled += 1,
                Err(join_error) => {
                    tracing::warn!(%join_error, "instance task panicked");
                    stats.errors += 1;
                }
            }
        }

        results.sort_by_key(|o| o.index);
        (results, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn runs_all_instances_and_tallies_stats() {
        let executor = ParallelExecutor::new(4, CancellationToken::new());
        let (results, stats) = executor
            .run(6, |index| async move {
                let kind = if index % 2 == 0 { OutcomeKind::Passed } else { OutcomeKind::Failed };
                InstanceOutcome { index, kind, value: index }
            })
            .await;
        assert_eq!(results.len(), 6);
        assert_eq!(stats.passed, 3);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.cancelled, 0);
        let indices: Vec<usize> = results.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let executor = ParallelExecutor::new(2, CancellationToken::new());

        let in_flight_producer = Arc::clone(&in_flight);
        let max_observed_producer = Arc::clone(&max_observed);
        let (_results, _stats) = executor
            .run(8, move |index| {
                let in_flight = Arc::clone(&in_flight_producer);
                let max_observed = Arc::clone(&max_observed_producer);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    InstanceOutcome {
                        index,
                        kind: OutcomeKind::Passed,
                        value: (),
                    }
                }
            })
            .await;
        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn unscheduled_instances_are_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let executor = ParallelExecutor::new(2, cancel);
        let (results, stats) = executor
            .run(5, |index| async move {
                InstanceOutcome {
                    index,
                    kind: OutcomeKind::Passed,
                    value: index,
                }
            })
            .await;
        assert!(results.is_empty());
        assert_eq!(stats.cancelled, 5);
    }

    #[tokio::test]
    async fn one_panicking_instance_does_not_abort_others() {
        let executor = ParallelExecutor::new(4, CancellationToken::new());
        let (results, stats) = executor
            .run(4, |index| async move {
                if index == 2 {
                    panic!("simulated instance panic");
                }
                InstanceOutcome {
                    index,
                    kind: OutcomeKind::Passed,
                    value: index,
                }
            })
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(stats.passed, 3);
        assert_eq!(stats.errors, 1);
    }
}
