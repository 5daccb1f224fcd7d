//! Bounded worker pool.
//!
//! A producer task feeds `(index, item)` jobs into a shared queue, a fixed
//! number of workers pull from it and publish `(index, result)` pairs into a
//! result sink, and a watcher task closes the sink once every worker has
//! finished. Every wait point races against the run's cancellation token.

use crate::probe::types::ProbeResult;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 5;

/// Upper bound on buffered results between workers and the collector.
const SINK_CAPACITY: usize = 100;

/// Bounded-concurrency executor for per-domain probes.
///
/// # Example
///
/// ```ignore
/// let pool = WorkerPool::new(5);
/// let results = pool
///     .run(&token, &domains, |token, domain| async move {
///         prober.probe(&token, &domain).await
///     })
///     .await;
/// assert_eq!(results.len(), domains.len());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Create a pool running at most `workers` probes at a time (at least one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Number of workers.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Probe every domain and return one result per domain, in input order.
    ///
    /// `probe` must not panic; failures belong in the returned result. Domains
    /// that were not finished when `token` got cancelled are reported as
    /// `Error` with a cancellation cause.
    pub async fn run<F, Fut>(
        &self,
        token: &CancellationToken,
        domains: &[String],
        probe: F,
    ) -> Vec<ProbeResult>
    where
        F: Fn(CancellationToken, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        if domains.is_empty() {
            return Vec::new();
        }

        let mut slots: Vec<Option<ProbeResult>> = std::iter::repeat_with(|| None)
            .take(domains.len())
            .collect();

        let mut sink = self.dispatch(token, domains.to_vec(), probe);
        while let Some((idx, result)) = sink.recv().await {
            slots[idx] = Some(result);
        }

        slots
            .into_iter()
            .zip(domains)
            .map(|(slot, domain)| slot.unwrap_or_else(|| ProbeResult::cancelled(domain.clone())))
            .collect()
    }

    /// Start probing `items` and return the result sink.
    ///
    /// Results arrive in completion order, tagged with the item's index. The
    /// sink closes once every worker has exited; indices missing at that
    /// point were cut short by cancellation.
    pub fn dispatch<T, R, F, Fut>(
        &self,
        token: &CancellationToken,
        items: Vec<T>,
        probe: F,
    ) -> mpsc::Receiver<(usize, R)>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let (sink_tx, sink_rx) = mpsc::channel(total.clamp(1, SINK_CAPACITY));

        if total == 0 {
            return sink_rx;
        }

        let (job_tx, job_rx) = mpsc::channel::<(usize, T)>(self.workers);
        let queue = Arc::new(Mutex::new(job_rx));
        let probe = Arc::new(probe);

        tokio::spawn(produce(token.clone(), items, job_tx));

        let handles: Vec<_> = (0..self.workers)
            .map(|id| {
                tokio::spawn(work(
                    id,
                    token.clone(),
                    Arc::clone(&queue),
                    Arc::clone(&probe),
                    sink_tx.clone(),
                ))
            })
            .collect();

        // The watcher owns the last sender, so the sink closes only after
        // every worker is done.
        tokio::spawn(async move {
            for outcome in futures::future::join_all(handles).await {
                if let Err(e) = outcome {
                    warn!("worker task failed: {e}");
                }
            }
            debug!(total, "all workers finished");
            drop(sink_tx);
        });

        sink_rx
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

/// Feed every item into the queue, then close it.
async fn produce<T>(token: CancellationToken, items: Vec<T>, jobs: mpsc::Sender<(usize, T)>) {
    for job in items.into_iter().enumerate() {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("producer stopped by cancellation");
                return;
            }
            sent = jobs.send(job) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

async fn work<T, R, F, Fut>(
    id: usize,
    token: CancellationToken,
    queue: Arc<Mutex<mpsc::Receiver<(usize, T)>>>,
    probe: Arc<F>,
    sink: mpsc::Sender<(usize, R)>,
) where
    F: Fn(CancellationToken, T) -> Fut,
    Fut: Future<Output = R>,
{
    loop {
        let job = tokio::select! {
            biased;
            () = token.cancelled() => None,
            job = async { queue.lock().await.recv().await } => job,
        };
        let Some((idx, item)) = job else {
            break;
        };

        let result = probe(token.clone(), item).await;

        // A finished result is kept if there is room for it, even when the
        // run is being cancelled.
        tokio::select! {
            biased;
            sent = sink.send((idx, result)) => {
                if sent.is_err() {
                    break;
                }
            }
            () = token.cancelled() => break,
        }
    }
    debug!(worker = id, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::types::ProbeStatus;
    use crate::report::Stats;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn domains(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("d{i}.example.com")).collect()
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(WorkerPool::new(2).workers(), 2);
        assert_eq!(WorkerPool::new(0).workers(), 1);
        assert_eq!(WorkerPool::default().workers(), DEFAULT_WORKERS);
    }

    #[tokio::test]
    async fn test_results_are_index_aligned() {
        let list = domains(12);
        let token = CancellationToken::new();

        // Later domains finish first.
        let results = WorkerPool::new(3)
            .run(&token, &list, |_, domain| async move {
                let n: u64 = domain[1..domain.find('.').unwrap()].parse().unwrap();
                tokio::time::sleep(Duration::from_millis(60 - n * 5)).await;
                ProbeResult::resolved(domain, Duration::from_millis(n))
            })
            .await;

        assert_eq!(results.len(), list.len());
        for (result, domain) in results.iter().zip(&list) {
            assert_eq!(&result.domain, domain);
            assert_eq!(result.status, ProbeStatus::Resolved);
        }
    }

    #[tokio::test]
    async fn test_empty_input_starts_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let token = CancellationToken::new();

        let results = WorkerPool::new(2)
            .run(&token, &[], move |_, domain| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { ProbeResult::resolved(domain, Duration::ZERO) }
            })
            .await;

        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let token = CancellationToken::new();

        let results = WorkerPool::new(3)
            .run(&token, &domains(15), move |_, domain| {
                let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    ProbeResult::resolved(domain, Duration::ZERO)
                }
            })
            .await;

        assert_eq!(results.len(), 15);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_all_resolved_stats() {
        let list = domains(7);
        let token = CancellationToken::new();

        let results = WorkerPool::default()
            .run(&token, &list, |_, domain| async move {
                ProbeResult::resolved(domain, Duration::ZERO)
            })
            .await;

        let stats = Stats::from_statuses(results.iter().map(|r| r.status));
        assert_eq!(stats.resolved, list.len());
        assert!((stats.percent_resolved - 100.0).abs() < f64::EPSILON);
        assert!(stats.percent_blocked.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_every_domain() {
        let list = domains(20);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let pool = WorkerPool::new(5);
        let run = pool.run(&token, &list, |token, domain| async move {
            let n: usize = domain[1..domain.find('.').unwrap()].parse().unwrap();
            if n < 3 {
                return ProbeResult::resolved(domain, Duration::ZERO);
            }
            tokio::select! {
                () = token.cancelled() => ProbeResult::cancelled(domain),
                () = tokio::time::sleep(Duration::from_secs(30)) => {
                    ProbeResult::resolved(domain, Duration::ZERO)
                }
            }
        });

        let results = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("run did not return after cancellation");

        assert_eq!(results.len(), list.len());
        for (result, domain) in results.iter().zip(&list) {
            assert_eq!(&result.domain, domain);
        }
        for result in &results[..3] {
            assert_eq!(result.status, ProbeStatus::Resolved);
        }
        for result in &results[3..] {
            assert_eq!(result.status, ProbeStatus::Error);
            assert!(result.error.as_ref().is_some_and(|e| e.is_cancelled()));
        }
    }
}
