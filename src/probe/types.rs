//! Probe types and data structures.
//!
//! This module provides the core types shared by the probers, the worker
//! pool and the report layer: the domain entries under test, the outcome of a
//! single probe, and the merged per-domain verdict.

use crate::error::ProbeError;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

/// A domain to test, with the taxonomy labels used for report grouping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DomainEntry {
    /// Domain name (e.g., "doubleclick.net")
    pub name: String,
    /// Top-level grouping, e.g. "Advertising". Empty when unknown.
    #[serde(default)]
    pub category: String,
    /// Second-level grouping, e.g. "Google Ads". Empty when unknown.
    #[serde(default)]
    pub subcategory: String,
}

impl DomainEntry {
    /// Create an uncategorised entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: String::new(),
            subcategory: String::new(),
        }
    }

    /// Create an entry tagged with a category and subcategory.
    pub fn categorized(
        name: impl Into<String>,
        category: impl Into<String>,
        subcategory: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            subcategory: subcategory.into(),
        }
    }
}

/// Verdict of a probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    /// The domain answered normally
    Resolved,
    /// Filtering was positively detected
    Blocked,
    /// No determination could be made
    Error,
}

impl ProbeStatus {
    /// Short label used by the table and CSV output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolved => "RESOLVED",
            Self::Blocked => "BLOCKED",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one probe (DNS or HTTP) against one domain.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProbeResult {
    /// Domain that was probed
    pub domain: String,
    /// Verdict
    pub status: ProbeStatus,
    /// Time spent on the deciding attempt
    #[serde(rename = "response_time_ms", serialize_with = "serialize_millis")]
    pub response_time: Duration,
    /// Cause, when one is known
    pub error: Option<ProbeError>,
    /// HTTP status code, 0 when no response was received
    pub http_status: u16,
}

impl ProbeResult {
    /// Create a result with no error attached.
    pub fn new(domain: impl Into<String>, status: ProbeStatus, response_time: Duration) -> Self {
        Self {
            domain: domain.into(),
            status,
            response_time,
            error: None,
            http_status: 0,
        }
    }

    /// Create a `Resolved` result.
    pub fn resolved(domain: impl Into<String>, response_time: Duration) -> Self {
        Self::new(domain, ProbeStatus::Resolved, response_time)
    }

    /// Create a `Blocked` result.
    pub fn blocked(domain: impl Into<String>, response_time: Duration) -> Self {
        Self::new(domain, ProbeStatus::Blocked, response_time)
    }

    /// Create an `Error` result carrying its cause.
    pub fn error(domain: impl Into<String>, response_time: Duration, cause: ProbeError) -> Self {
        Self::new(domain, ProbeStatus::Error, response_time).with_error(cause)
    }

    /// Result reported for a domain the run never got to finish.
    pub fn cancelled(domain: impl Into<String>) -> Self {
        Self::error(domain, Duration::ZERO, ProbeError::Cancelled)
    }

    /// Attach a cause.
    #[must_use]
    pub fn with_error(mut self, cause: ProbeError) -> Self {
        self.error = Some(cause);
        self
    }

    /// Attach an HTTP status code.
    #[must_use]
    pub fn with_http_status(mut self, code: u16) -> Self {
        self.http_status = code;
        self
    }
}

/// Merged DNS + HTTP verdict for one domain, tagged for grouping.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClassifiedResult {
    /// Domain that was tested
    pub domain: String,
    /// Merged verdict
    pub status: ProbeStatus,
    /// Combined time of both probes
    #[serde(rename = "response_time_ms", serialize_with = "serialize_millis")]
    pub response_time: Duration,
    /// Cause, DNS first then HTTP
    pub error: Option<ProbeError>,
    /// HTTP status code from the HTTP probe, 0 when none
    pub http_status: u16,
    /// Category label, possibly empty
    pub category: String,
    /// Subcategory label, possibly empty
    pub subcategory: String,
}

impl ClassifiedResult {
    /// Tag a single probe result with its entry's labels.
    #[must_use]
    pub fn from_probe(result: ProbeResult, entry: &DomainEntry) -> Self {
        Self {
            domain: result.domain,
            status: result.status,
            response_time: result.response_time,
            error: result.error,
            http_status: result.http_status,
            category: entry.category.clone(),
            subcategory: entry.subcategory.clone(),
        }
    }

    /// Result reported for an entry the run never got to finish.
    #[must_use]
    pub fn cancelled(entry: &DomainEntry) -> Self {
        Self::from_probe(ProbeResult::cancelled(entry.name.clone()), entry)
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_entry_deserialize_defaults() {
        let entry: DomainEntry = serde_json::from_str(r#"{"name": "ads.example.com"}"#).unwrap();
        assert_eq!(entry, DomainEntry::new("ads.example.com"));
    }

    #[test]
    fn test_cancelled_result() {
        let result = ProbeResult::cancelled("ads.example.com");
        assert_eq!(result.status, ProbeStatus::Error);
        assert_eq!(result.error, Some(ProbeError::Cancelled));
        assert_eq!(result.http_status, 0);
    }

    #[test]
    fn test_status_serialize() {
        assert_eq!(
            serde_json::to_string(&ProbeStatus::Blocked).unwrap(),
            r#""BLOCKED""#
        );
        assert_eq!(ProbeStatus::Resolved.to_string(), "RESOLVED");
    }

    #[test]
    fn test_result_serializes_millis() {
        let result = ProbeResult::resolved("a.com", Duration::from_millis(12));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["response_time_ms"], 12.0);
        assert_eq!(value["status"], "RESOLVED");
    }
}
