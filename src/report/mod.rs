//! Report module.
//!
//! Aggregation of a finished run: summary statistics, the ordered
//! category tree, and the verdict shown to the user.

pub mod group;
pub mod stats;

pub use group::{group_by_category, CategoryGroup, GroupedResults, OTHER, UNCATEGORIZED};
pub use stats::Stats;

use crate::config::CategoryConfig;
use crate::probe::types::ClassifiedResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Recommendation when every domain is blocked.
pub const MSG_ALL_BLOCKED: &str = "All ad/tracker domains are blocked. Excellent job!";
/// Recommendation when more than 80% are blocked.
pub const MSG_MOST_BLOCKED: &str = "Most ad/tracker domains are blocked. Good job!";
/// Recommendation when some are blocked.
pub const MSG_PARTIAL_BLOCK: &str = "Partial blocking detected. Consider tightening your filters.";
/// Recommendation when nothing is blocked.
pub const MSG_NO_BLOCKING: &str = "No blocking detected. Check your DNS or hosts file setup.";

/// Pick the recommendation matching the share of blocked domains.
#[must_use]
pub fn recommend(stats: &Stats) -> &'static str {
    if stats.total > 0 && stats.blocked == stats.total {
        MSG_ALL_BLOCKED
    } else if stats.percent_blocked > 80.0 {
        MSG_MOST_BLOCKED
    } else if stats.percent_blocked > 0.0 {
        MSG_PARTIAL_BLOCK
    } else {
        MSG_NO_BLOCKING
    }
}

/// Complete, serializable outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// When the report was built
    pub generated_at: DateTime<Utc>,
    /// DNS server used, `None` for the platform resolver
    pub dns_server: Option<String>,
    /// Statistics over all results
    pub stats: Stats,
    /// Recommendation text
    pub recommendation: &'static str,
    /// Results grouped by category
    pub categories: Vec<CategoryGroup>,
}

impl Report {
    /// Aggregate `results` into a report.
    #[must_use]
    pub fn build(
        results: &[ClassifiedResult],
        config: &CategoryConfig,
        dns_server: Option<String>,
    ) -> Self {
        let stats = Stats::compute(results);
        Self {
            generated_at: Utc::now(),
            dns_server,
            recommendation: recommend(&stats),
            stats,
            categories: group_by_category(results, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::types::ProbeStatus::{Blocked, Error, Resolved};

    #[test]
    fn test_recommend() {
        assert_eq!(recommend(&Stats::from_statuses([Blocked, Blocked])), MSG_ALL_BLOCKED);
        assert_eq!(
            recommend(&Stats::from_statuses([Blocked; 9].into_iter().chain([Resolved]))),
            MSG_MOST_BLOCKED
        );
        assert_eq!(recommend(&Stats::from_statuses([Blocked, Resolved])), MSG_PARTIAL_BLOCK);
        assert_eq!(recommend(&Stats::from_statuses([Resolved, Error])), MSG_NO_BLOCKING);
        assert_eq!(recommend(&Stats::default()), MSG_NO_BLOCKING);
    }

    #[test]
    fn test_report_serializes() {
        let report = Report::build(&[], &CategoryConfig::default(), Some("1.1.1.1:53".into()));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["dns_server"], "1.1.1.1:53");
        assert_eq!(value["stats"]["total"], 0);
        assert!(value["categories"].as_array().unwrap().is_empty());
    }
}
