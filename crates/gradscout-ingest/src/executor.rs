//! Bounded fan-out of per-page work
//!
//! Each call to [`FanOutExecutor::map_unordered`] creates a pool for one batch:
//! every task is submitted up front, at most `max_workers` run at a time, and
//! the returned [`Completions`] yields results in the order tasks finish.
//! Dropping [`Completions`] before it is drained aborts whatever is still
//! running.

use crate::error::{IngestError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct FanOutExecutor {
    max_workers: usize,
}

impl FanOutExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Submit the whole batch and return a completion-ordered stream of results
    ///
    /// A failing or panicking task only produces an error for its own slot.
    /// Must be called from within a Tokio runtime.
    pub fn map_unordered<T, R, F, Fut>(&self, tasks: Vec<T>, worker: F) -> Completions<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.max_workers));
        let mut set = JoinSet::new();
        let submitted = tasks.len();

        for task in tasks {
            let permits = Arc::clone(&permits);
            let work = worker(task);
            set.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| IngestError::task_failure(e.to_string()))?;
                work.await
            });
        }

        debug!(submitted, max_workers = self.max_workers, "Batch submitted");
        Completions { set, submitted }
    }
}

/// Results of one batch, in completion order
pub struct Completions<R> {
    set: JoinSet<Result<R>>,
    submitted: usize,
}

impl<R: Send + 'static> Completions<R> {
    /// Next finished task, or `None` once the batch is drained
    pub async fn next(&mut self) -> Option<Result<R>> {
        let joined = self.set.join_next().await?;
        Some(joined.unwrap_or_else(|e| Err(join_failure(e))))
    }

    /// Number of tasks in the batch
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Tasks not yet collected
    pub fn pending(&self) -> usize {
        self.set.len()
    }
}

fn join_failure(err: JoinError) -> IngestError {
    if err.is_panic() {
        IngestError::task_failure("worker panicked")
    } else {
        IngestError::task_failure(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_results_arrive_in_completion_order() {
        let executor = FanOutExecutor::new(4);
        let mut completions = executor.map_unordered(vec![300u64, 100, 200], |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ms)
        });

        let mut order = Vec::new();
        while let Some(result) = completions.next().await {
            order.push(result.unwrap());
        }

        assert_eq!(order, vec![100, 200, 300]);
        assert_eq!(completions.submitted(), 3);
        assert_eq!(completions.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let executor = FanOutExecutor::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut completions = executor.map_unordered((0..8).collect(), |i: usize| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            }
        });

        let mut seen = 0;
        while let Some(result) = completions.next().await {
            result.unwrap();
            seen += 1;
        }

        assert_eq!(seen, 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_siblings() {
        let executor = FanOutExecutor::new(3);
        let mut completions = executor.map_unordered(vec![1, 2, 3, 4], |i: i32| async move {
            if i == 2 {
                Err(IngestError::transient("upstream down"))
            } else {
                Ok(i)
            }
        });

        let mut ok = Vec::new();
        let mut failed = 0;
        while let Some(result) = completions.next().await {
            match result {
                Ok(i) => ok.push(i),
                Err(_) => failed += 1,
            }
        }

        ok.sort();
        assert_eq!(ok, vec![1, 3, 4]);
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_task_failure() {
        let executor = FanOutExecutor::new(2);
        let mut completions = executor.map_unordered(vec![true, false], |boom: bool| async move {
            if boom {
                panic!("worker exploded");
            }
            Ok(())
        });

        let mut failures = Vec::new();
        let mut successes = 0;
        while let Some(result) = completions.next().await {
            match result {
                Ok(()) => successes += 1,
                Err(e) => failures.push(e),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], IngestError::TaskFailure(_)));
    }
}
