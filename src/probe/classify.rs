//! Merging of DNS and HTTP verdicts.
//!
//! A domain is considered filtered as soon as either protocol says so; an
//! error only wins over a clean resolution.

use crate::probe::types::{ClassifiedResult, DomainEntry, ProbeResult, ProbeStatus};

/// Combine two verdicts, `Blocked` > `Error` > `Resolved`.
#[must_use]
pub fn classify(dns: ProbeStatus, http: ProbeStatus) -> ProbeStatus {
    use ProbeStatus::{Blocked, Error, Resolved};

    match (dns, http) {
        (Blocked, _) | (_, Blocked) => Blocked,
        (Error, _) | (_, Error) => Error,
        (Resolved, Resolved) => Resolved,
    }
}

/// Merge the DNS and HTTP results for `entry` into one verdict.
///
/// The cause comes from the DNS result when it has one, otherwise from the
/// HTTP result. The HTTP status code is always carried over for display.
#[must_use]
pub fn merge(entry: &DomainEntry, dns: ProbeResult, http: ProbeResult) -> ClassifiedResult {
    ClassifiedResult {
        domain: entry.name.clone(),
        status: classify(dns.status, http.status),
        response_time: dns.response_time + http.response_time,
        error: dns.error.or(http.error),
        http_status: http.http_status,
        category: entry.category.clone(),
        subcategory: entry.subcategory.clone(),
    }
}
