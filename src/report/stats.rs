//! Summary statistics over a result set.

use crate::probe::types::{ClassifiedResult, ProbeStatus};
use serde::{Deserialize, Serialize};

/// Aggregated counts of a result set.
///
/// `blocked + resolved + errored == total`, and both percentages are taken
/// against `total` (zero for an empty set).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Stats {
    /// Number of results
    pub total: usize,
    /// Results classified as blocked
    pub blocked: usize,
    /// Results classified as resolved
    pub resolved: usize,
    /// Results with no determination
    pub errored: usize,
    /// Share of blocked results, 0-100
    pub percent_blocked: f64,
    /// Share of resolved results, 0-100
    pub percent_resolved: f64,
}

impl Stats {
    /// Compute statistics over classified results.
    #[must_use]
    pub fn compute(results: &[ClassifiedResult]) -> Self {
        Self::from_statuses(results.iter().map(|r| r.status))
    }

    /// Compute statistics over a stream of verdicts.
    pub fn from_statuses(statuses: impl IntoIterator<Item = ProbeStatus>) -> Self {
        let mut stats = Self::default();
        for status in statuses {
            stats.add(status);
        }
        stats
    }

    /// Count one more verdict.
    pub fn add(&mut self, status: ProbeStatus) {
        self.total += 1;
        match status {
            ProbeStatus::Blocked => self.blocked += 1,
            ProbeStatus::Resolved => self.resolved += 1,
            ProbeStatus::Error => self.errored += 1,
        }
        self.percent_blocked = percent(self.blocked, self.total);
        self.percent_resolved = percent(self.resolved, self.total);
    }

    /// Share of errored results, 0-100.
    #[must_use]
    pub fn percent_errored(&self) -> f64 {
        percent(self.errored, self.total)
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}
