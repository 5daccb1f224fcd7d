//! HTTP-level block detection.
//!
//! Issues a GET against the domain root and reads the status code. Filtering
//! proxies and block pages tend to answer with a small set of codes (403,
//! 451, ...), so those are reported as blocked, as is anything outside the
//! success and redirect ranges.

#![allow(clippy::missing_errors_doc)]

use crate::error::{ProbeError, Result};
use crate::probe::types::{ProbeResult, ProbeStatus};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of retries after a transport failure.
pub const DEFAULT_RETRIES: usize = 2;

/// Maximum number of redirects followed.
pub const MAX_REDIRECTS: usize = 10;

/// Status codes that filters and blocklists are known to answer with.
const BLOCK_SIGNATURES: &[u16] = &[401, 403, 404, 429, 451, 503];

/// Classify an HTTP status code.
#[must_use]
pub fn classify_status(code: u16) -> ProbeStatus {
    if BLOCK_SIGNATURES.contains(&code) {
        ProbeStatus::Blocked
    } else if (200..400).contains(&code) {
        ProbeStatus::Resolved
    } else {
        ProbeStatus::Blocked
    }
}

/// HTTP prober.
///
/// Wraps one pooled `reqwest::Client`; clones share it.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
    retries: usize,
    scheme: &'static str,
    port: Option<u16>,
}

impl HttpProber {
    /// Create a prober with default timeout and retries.
    pub fn new() -> Result<Self> {
        Self::with_settings(DEFAULT_TIMEOUT, DEFAULT_RETRIES)
    }

    /// Create a prober with a custom per-request timeout and retry count.
    pub fn with_settings(timeout: Duration, retries: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .no_proxy()
            .user_agent(concat!("blockcheck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            retries,
            scheme: "https",
            port: None,
        })
    }

    /// Use another URL scheme (plain `http` for local servers).
    #[must_use]
    pub fn with_scheme(mut self, scheme: &'static str) -> Self {
        self.scheme = scheme;
        self
    }

    /// Connect to `port` instead of the scheme's default.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    fn url(&self, domain: &str) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}/", self.scheme, domain, port),
            None => format!("{}://{}/", self.scheme, domain),
        }
    }

    /// Classify `domain` by requesting its root path.
    ///
    /// A transport failure that coincides with cancellation of `token` is
    /// reported as `Blocked`: an interrupted connection is read as
    /// interception rather than as an ordinary failure.
    pub async fn probe(&self, token: &CancellationToken, domain: &str) -> ProbeResult {
        let url = self.url(domain);
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => None,
                res = self.client.get(&url).send() => Some(res),
            };

            match outcome {
                None => {
                    debug!(domain, "HTTP probe interrupted by cancellation");
                    return ProbeResult::blocked(domain, start.elapsed())
                        .with_error(ProbeError::Cancelled);
                }
                Some(Ok(response)) => {
                    let code = response.status().as_u16();
                    debug!(domain, code, "HTTP response");
                    return ProbeResult::new(domain, classify_status(code), start.elapsed())
                        .with_http_status(code);
                }
                Some(Err(e)) if token.is_cancelled() => {
                    debug!(domain, error = %e, "HTTP failure during cancellation");
                    return ProbeResult::blocked(domain, start.elapsed())
                        .with_error(ProbeError::Cancelled);
                }
                Some(Err(e)) if attempt < self.retries => {
                    attempt += 1;
                    debug!(domain, attempt, error = %e, "retrying HTTP probe");
                }
                Some(Err(e)) => {
                    let cause = if e.is_timeout() {
                        ProbeError::Timeout(start.elapsed().as_millis() as u64)
                    } else {
                        ProbeError::transport(&e)
                    };
                    return ProbeResult::error(domain, start.elapsed(), cause);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `status` on every path except `/final`, which answers 200.
    /// A `Location: /final` header is sent along with 3xx codes.
    async fn serve(status: u16) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]);

                    let code = if request.starts_with("GET /final") {
                        200
                    } else {
                        status
                    };
                    let location = if (300..400).contains(&code) {
                        "Location: /final\r\n"
                    } else {
                        ""
                    };
                    let response = format!(
                        "HTTP/1.1 {code} Test\r\n{location}Content-Length: 0\r\nConnection: close\r\n\r\n"
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        addr.to_string()
    }

    fn local_prober() -> HttpProber {
        HttpProber::with_settings(Duration::from_secs(2), 0)
            .unwrap()
            .with_scheme("http")
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(404), ProbeStatus::Blocked);
        assert_eq!(classify_status(200), ProbeStatus::Resolved);
        assert_eq!(classify_status(500), ProbeStatus::Blocked);
        assert_eq!(classify_status(301), ProbeStatus::Resolved);
        assert_eq!(classify_status(451), ProbeStatus::Blocked);
        assert_eq!(classify_status(100), ProbeStatus::Blocked);
    }

    #[tokio::test]
    async fn test_probe_status_codes() {
        let token = CancellationToken::new();
        let prober = local_prober();

        for (code, expected) in [
            (200, ProbeStatus::Resolved),
            (404, ProbeStatus::Blocked),
            (500, ProbeStatus::Blocked),
        ] {
            let host = serve(code).await;
            let result = prober.probe(&token, &host).await;
            assert_eq!(result.status, expected, "status {code}");
            assert_eq!(result.http_status, code);
            assert!(result.error.is_none());
        }
    }

    #[tokio::test]
    async fn test_probe_follows_redirect() {
        let token = CancellationToken::new();
        let host = serve(302).await;

        let result = local_prober().probe(&token, &host).await;
        assert_eq!(result.status, ProbeStatus::Resolved);
        assert_eq!(result.http_status, 200);
    }

    #[tokio::test]
    async fn test_connection_refused_is_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let token = CancellationToken::new();
        let result = local_prober().probe(&token, &addr.to_string()).await;
        assert_eq!(result.status, ProbeStatus::Error);
        assert_eq!(result.http_status, 0);
        assert!(matches!(result.error, Some(ProbeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_probe_with_port_override() {
        let token = CancellationToken::new();
        let host = serve(200).await;
        let port: u16 = host.rsplit_once(':').unwrap().1.parse().unwrap();

        let result = local_prober().with_port(port).probe(&token, "127.0.0.1").await;
        assert_eq!(result.status, ProbeStatus::Resolved);
        assert_eq!(result.http_status, 200);
    }

    #[tokio::test]
    async fn test_cancelled_probe_is_blocked() {
        let token = CancellationToken::new();
        token.cancel();

        let result = local_prober().probe(&token, "127.0.0.1:9").await;
        assert_eq!(result.status, ProbeStatus::Blocked);
        assert_eq!(result.error, Some(ProbeError::Cancelled));
        assert_eq!(result.http_status, 0);
    }
}
