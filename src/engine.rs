//! Block-test engine.
//!
//! Runs the DNS and HTTP probers for every domain of a list on a bounded
//! worker pool and merges their verdicts. Results are published to an
//! optional progress channel as they complete, and returned in input order
//! once the run is over.

#![allow(clippy::missing_errors_doc)]

use crate::error::{ProbeError, Result};
use crate::pool::{WorkerPool, DEFAULT_WORKERS};
use crate::probe::dns::{self, DnsProber};
use crate::probe::http::{self, HttpProber};
use crate::probe::types::{ClassifiedResult, DomainEntry};
use crate::probe::merge;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tunables of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// DNS server address, empty for the platform resolver
    pub dns_server: String,
    /// Per-attempt timeout of both probers
    pub timeout: Duration,
    /// Retries of the HTTP prober after a transport failure
    pub http_retries: usize,
    /// Number of concurrent workers
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dns_server: String::new(),
            timeout: dns::DEFAULT_TIMEOUT,
            http_retries: http::DEFAULT_RETRIES,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Tests a domain list for DNS and HTTP filtering.
///
/// # Example
///
/// ```ignore
/// let tester = BlockTester::new(&Settings::default())?;
/// let token = CancellationToken::new();
/// let results = tester.run(&token, &ConfigLoader::default_domains(), None).await;
/// let stats = Stats::compute(&results);
/// ```
#[derive(Clone)]
pub struct BlockTester {
    dns: DnsProber,
    http: HttpProber,
    pool: WorkerPool,
}

impl BlockTester {
    /// Create a tester from run settings.
    pub fn new(settings: &Settings) -> Result<Self> {
        let dns = DnsProber::with_settings(&settings.dns_server, settings.timeout, dns::MAX_RETRIES)?;
        let http = HttpProber::with_settings(settings.timeout, settings.http_retries)?;
        Ok(Self::from_parts(dns, http, WorkerPool::new(settings.workers)))
    }

    /// Assemble a tester from ready-made probers.
    #[must_use]
    pub fn from_parts(dns: DnsProber, http: HttpProber, pool: WorkerPool) -> Self {
        Self { dns, http, pool }
    }

    /// The DNS prober in use.
    #[must_use]
    pub fn dns(&self) -> &DnsProber {
        &self.dns
    }

    /// Test every entry and return one result per entry, in input order.
    ///
    /// Each result is also sent to `progress` as soon as it is available, in
    /// completion order. Entries cut short by cancelling `token` come back as
    /// `Error` with a cancellation cause.
    pub async fn run(
        &self,
        token: &CancellationToken,
        entries: &[DomainEntry],
        progress: Option<mpsc::UnboundedSender<ClassifiedResult>>,
    ) -> Vec<ClassifiedResult> {
        let started = Instant::now();
        info!(
            domains = entries.len(),
            workers = self.pool.workers(),
            dns = %self.server_label(),
            "Starting block test"
        );

        let tester = self.clone();
        let mut sink = self
            .pool
            .dispatch(token, entries.to_vec(), move |token, entry: DomainEntry| {
                let tester = tester.clone();
                async move { tester.check(&token, &entry).await }
            });

        let mut slots: Vec<Option<ClassifiedResult>> = vec![None; entries.len()];
        while let Some((idx, result)) = sink.recv().await {
            if let Some(tx) = &progress {
                if tx.send(result.clone()).is_err() {
                    debug!("progress receiver dropped");
                }
            }
            slots[idx] = Some(result);
        }

        let missing = slots.iter().filter(|s| s.is_none()).count();
        if missing > 0 {
            warn!(missing, "Run cancelled before every domain was tested");
        }

        let results: Vec<ClassifiedResult> = slots
            .into_iter()
            .zip(entries)
            .map(|(slot, entry)| slot.unwrap_or_else(|| ClassifiedResult::cancelled(entry)))
            .collect();

        info!(
            domains = results.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Block test finished"
        );
        results
    }

    /// Test a single entry: both probes run concurrently, then merge.
    ///
    /// An entry whose probes were cut short by cancelling `token` is
    /// reported as `Error` with a cancellation cause, whatever the probers
    /// made of the interruption.
    pub async fn check(&self, token: &CancellationToken, entry: &DomainEntry) -> ClassifiedResult {
        let (dns, http) = tokio::join!(
            self.dns.probe(token, &entry.name),
            self.http.probe(token, &entry.name),
        );
        debug!(
            domain = %entry.name,
            dns = %dns.status,
            http = %http.status,
            "probes finished"
        );

        let interrupted = [&dns.error, &http.error]
            .into_iter()
            .any(|e| e.as_ref().is_some_and(ProbeError::is_cancelled));
        if interrupted && token.is_cancelled() {
            return ClassifiedResult::cancelled(entry);
        }
        merge(entry, dns, http)
    }

    fn server_label(&self) -> String {
        self.dns
            .server()
            .map_or_else(|| "system".to_string(), |addr| addr.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::types::ProbeStatus;
    use tokio::net::{TcpListener, UdpSocket};

    fn offline_tester() -> BlockTester {
        let dns = DnsProber::with_settings("127.0.0.1:9", Duration::from_millis(200), 0).unwrap();
        let http = HttpProber::with_settings(Duration::from_millis(200), 0)
            .unwrap()
            .with_scheme("http");
        BlockTester::from_parts(dns, http, WorkerPool::new(2))
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.dns_server.is_empty());
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.http_retries, 2);
        assert_eq!(settings.workers, 5);
    }

    #[tokio::test]
    async fn test_invalid_domains_keep_order_and_labels() {
        let tester = offline_tester();
        let entries = vec![
            DomainEntry::categorized("bad domain", "Ads", "Google"),
            DomainEntry::categorized("", "Analytics", "Other"),
            DomainEntry::new("another bad one"),
        ];
        let (tx, mut rx) = mpsc::unbounded_channel();

        let results = tester.run(&CancellationToken::new(), &entries, Some(tx)).await;

        assert_eq!(results.len(), entries.len());
        for (result, entry) in results.iter().zip(&entries) {
            assert_eq!(result.domain, entry.name);
            assert_eq!(result.category, entry.category);
            assert_eq!(result.status, ProbeStatus::Error);
            assert!(matches!(result.error, Some(ProbeError::InvalidDomain(_))));
        }

        let mut seen = 0;
        while rx.recv().await.is_some() {
            seen += 1;
        }
        assert_eq!(seen, entries.len());
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_every_entry() {
        let tester = offline_tester();
        let entries: Vec<DomainEntry> = (0..10)
            .map(|i| DomainEntry::categorized(format!("d{i}.example.com"), "Ads", ""))
            .collect();
        let token = CancellationToken::new();
        token.cancel();

        let results = tester.run(&token, &entries, None).await;

        assert_eq!(results.len(), entries.len());
        for (result, entry) in results.iter().zip(&entries) {
            assert_eq!(result.domain, entry.name);
            assert_eq!(result.status, ProbeStatus::Error);
            assert_eq!(result.error, Some(ProbeError::Cancelled));
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_flight_reports_error() {
        // Neither server ever answers, so every probe is still running at cancel.
        let dns_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http_port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let dns_server = dns_socket.local_addr().unwrap().to_string();
        let dns = DnsProber::with_settings(&dns_server, Duration::from_secs(10), 2).unwrap();
        let http = HttpProber::with_settings(Duration::from_secs(10), 2)
            .unwrap()
            .with_scheme("http")
            .with_port(http_port);
        let tester = BlockTester::from_parts(dns, http, WorkerPool::new(2));

        let entries: Vec<DomainEntry> = (0..4)
            .map(|i| DomainEntry::categorized("localhost", "Ads", format!("sub{i}")))
            .collect();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let results = tokio::time::timeout(Duration::from_secs(5), tester.run(&token, &entries, None))
            .await
            .expect("run did not return after cancellation");

        assert_eq!(results.len(), entries.len());
        for (result, entry) in results.iter().zip(&entries) {
            assert_eq!(result.subcategory, entry.subcategory);
            assert_eq!(result.status, ProbeStatus::Error);
            assert_eq!(result.error, Some(ProbeError::Cancelled));
        }
        drop(dns_socket);
    }

    #[tokio::test]
    async fn test_empty_list() {
        let results = offline_tester().run(&CancellationToken::new(), &[], None).await;
        assert!(results.is_empty());
    }
}
