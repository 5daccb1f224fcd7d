//! DNS-level block detection.
//!
//! This module classifies a domain by resolving it, either through the
//! platform resolver configuration or through one explicitly chosen server.
//! Sinkholed answers (`0.0.0.0`), empty answers and negative responses from a
//! chosen server count as filtering; transport failures are retried.

#![allow(clippy::missing_errors_doc)]

use crate::config::loader::ensure_dns_port;
use crate::error::{Error, ProbeError, Result};
use crate::probe::types::{ProbeResult, ProbeStatus};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::error::ProtoErrorKind;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

/// Number of retries after a failed attempt (3 attempts in total).
pub const MAX_RETRIES: usize = 2;

/// Timeout for a single lookup attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between two attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Where queries are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upstream {
    /// Platform resolver configuration
    System,
    /// A single server, queried for A records only
    Server(SocketAddr),
}

/// DNS prober.
///
/// Cheap to clone; clones share the underlying resolver.
///
/// # Example
///
/// ```ignore
/// let prober = DnsProber::new("1.1.1.1")?;
/// let result = prober.probe(&token, "doubleclick.net").await;
/// println!("{}", result.status);
/// ```
#[derive(Clone)]
pub struct DnsProber {
    resolver: TokioAsyncResolver,
    upstream: Upstream,
    timeout: Duration,
    retries: usize,
}

impl DnsProber {
    /// Create a prober for `server`, or for the platform resolver when
    /// `server` is empty.
    ///
    /// A bare IP or hostname gets port 53.
    pub fn new(server: &str) -> Result<Self> {
        Self::with_settings(server, DEFAULT_TIMEOUT, MAX_RETRIES)
    }

    /// Create a prober with a custom per-attempt timeout and retry count.
    pub fn with_settings(server: &str, timeout: Duration, retries: usize) -> Result<Self> {
        let upstream = parse_upstream(server)?;

        let (config, mut opts) = match upstream {
            Upstream::System => match trust_dns_resolver::system_conf::read_system_conf() {
                Ok(conf) => conf,
                Err(e) => {
                    warn!("Could not read system DNS config, using defaults: {e}");
                    (ResolverConfig::default(), ResolverOpts::default())
                }
            },
            Upstream::Server(addr) => {
                let group = NameServerConfigGroup::from_ips_clear(&[addr.ip()], addr.port(), true);
                let mut opts = ResolverOpts::default();
                opts.use_hosts_file = false;
                (ResolverConfig::from_parts(None, vec![], group), opts)
            }
        };

        // Retries are driven by `probe`, and every attempt must hit the wire.
        opts.timeout = timeout;
        opts.attempts = 1;
        opts.cache_size = 0;

        let resolver = TokioAsyncResolver::tokio(config, opts).map_err(Error::Resolver)?;

        Ok(Self {
            resolver,
            upstream,
            timeout,
            retries,
        })
    }

    /// The explicitly chosen server, if any.
    #[must_use]
    pub fn server(&self) -> Option<SocketAddr> {
        match self.upstream {
            Upstream::System => None,
            Upstream::Server(addr) => Some(addr),
        }
    }

    /// Classify `domain`.
    ///
    /// Never fails: invalid input, exhausted retries and cancellation all
    /// come back as an `Error` result with the cause attached.
    pub async fn probe(&self, token: &CancellationToken, domain: &str) -> ProbeResult {
        let domain = match validate_domain(domain) {
            Ok(d) => d,
            Err(cause) => return ProbeResult::error(domain, Duration::ZERO, cause),
        };

        let mut attempt = 0;
        loop {
            let result = self.probe_once(token, domain).await;

            if result.status != ProbeStatus::Error {
                return result;
            }
            if result.error.as_ref().is_some_and(ProbeError::is_cancelled) {
                return result;
            }
            if attempt >= self.retries {
                warn!(domain, attempts = attempt + 1, "DNS probe gave up");
                return result;
            }

            attempt += 1;
            debug!(domain, attempt, "retrying DNS probe");

            tokio::select! {
                biased;
                () = token.cancelled() => {
                    return ProbeResult::error(domain, Duration::ZERO, ProbeError::Cancelled);
                }
                () = tokio::time::sleep(RETRY_DELAY) => {}
            }
        }
    }

    async fn probe_once(&self, token: &CancellationToken, domain: &str) -> ProbeResult {
        let fqdn = format!("{domain}.");
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => None,
            res = tokio::time::timeout(self.timeout, self.lookup(&fqdn)) => Some(res),
        };
        let elapsed = start.elapsed();

        let verdict = match outcome {
            None => Err(ProbeError::Cancelled),
            Some(Err(_)) => Err(ProbeError::Timeout(self.timeout.as_millis() as u64)),
            Some(Ok(Ok(ips))) => Ok(classify_addresses(&ips)),
            Some(Ok(Err(e))) => self.classify_error(&e),
        };

        debug!(domain, ?verdict, ?elapsed, "DNS attempt finished");

        match verdict {
            Ok(status) => ProbeResult::new(domain, status, elapsed),
            Err(cause) => ProbeResult::error(domain, elapsed, cause),
        }
    }

    async fn lookup(&self, fqdn: &str) -> std::result::Result<Vec<IpAddr>, ResolveError> {
        match self.upstream {
            Upstream::System => {
                let lookup = self.resolver.lookup_ip(fqdn).await?;
                Ok(lookup.iter().collect())
            }
            Upstream::Server(_) => {
                let lookup = self.resolver.ipv4_lookup(fqdn).await?;
                Ok(lookup.iter().map(|ip| IpAddr::V4(*ip)).collect())
            }
        }
    }

    /// Map a resolver failure to a verdict.
    ///
    /// A chosen server answering with no records, a negative code or a
    /// garbled message is treated as filtering. Through the platform resolver
    /// only an empty successful answer is; anything else is an error.
    fn classify_error(&self, err: &ResolveError) -> std::result::Result<ProbeStatus, ProbeError> {
        match err.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. } => match self.upstream {
                Upstream::Server(_) => Ok(ProbeStatus::Blocked),
                Upstream::System if *response_code == ResponseCode::NoError => {
                    Ok(ProbeStatus::Blocked)
                }
                Upstream::System => Err(ProbeError::transport(err)),
            },
            ResolveErrorKind::Timeout => Err(ProbeError::Timeout(self.timeout.as_millis() as u64)),
            ResolveErrorKind::Proto(proto) => match proto.kind() {
                ProtoErrorKind::Timeout => {
                    Err(ProbeError::Timeout(self.timeout.as_millis() as u64))
                }
                ProtoErrorKind::Io(_) => Err(ProbeError::transport(err)),
                _ if matches!(self.upstream, Upstream::Server(_)) => Ok(ProbeStatus::Blocked),
                _ => Err(ProbeError::transport(err)),
            },
            _ => Err(ProbeError::transport(err)),
        }
    }
}

/// Blocked when nothing came back or any address is a sinkhole.
fn classify_addresses(ips: &[IpAddr]) -> ProbeStatus {
    if ips.is_empty() || ips.iter().any(IpAddr::is_unspecified) {
        ProbeStatus::Blocked
    } else {
        ProbeStatus::Resolved
    }
}

/// Trim and reject empty names or names containing whitespace.
fn validate_domain(domain: &str) -> std::result::Result<&str, ProbeError> {
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(ProbeError::InvalidDomain("domain cannot be empty".into()));
    }
    if domain.chars().any(char::is_whitespace) {
        return Err(ProbeError::InvalidDomain(format!(
            "{domain:?} contains whitespace"
        )));
    }
    Ok(domain)
}

fn parse_upstream(server: &str) -> Result<Upstream> {
    let server = server.trim();
    if server.is_empty() {
        return Ok(Upstream::System);
    }

    let addr = ensure_dns_port(server);
    addr.to_socket_addrs()
        .map_err(|e| Error::parse(format!("Invalid DNS server {server}: {e}")))?
        .next()
        .map(Upstream::Server)
        .ok_or_else(|| Error::parse(format!("DNS server {server} has no address")))
}
