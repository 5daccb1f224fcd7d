//! Category/subcategory grouping of results.
//!
//! Results are bucketed in a single pass that remembers first-seen order,
//! then buckets are stably sorted by their configured rank. Unlisted names
//! therefore keep the order in which the results introduced them, which
//! makes the output reproducible for a given input.

use crate::config::CategoryConfig;
use crate::probe::types::ClassifiedResult;
use crate::report::stats::Stats;
use serde::Serialize;
use std::collections::HashMap;

/// Label for results without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Label for results without a subcategory.
pub const OTHER: &str = "Other";

/// Results of one subcategory.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupedResults {
    /// Owning category
    pub category: String,
    /// Subcategory name
    pub subcategory: String,
    /// Member results, in input order
    pub results: Vec<ClassifiedResult>,
    /// Statistics over `results`
    pub stats: Stats,
}

/// One category and its subcategories.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryGroup {
    /// Category name
    pub category: String,
    /// Subcategories, in display order
    pub subcategories: Vec<GroupedResults>,
    /// Statistics over every result of the category
    pub stats: Stats,
}

impl CategoryGroup {
    /// Iterate over all results of the category.
    pub fn results(&self) -> impl Iterator<Item = &ClassifiedResult> {
        self.subcategories.iter().flat_map(|s| s.results.iter())
    }
}

#[derive(Default)]
struct Bucket {
    name: String,
    subs: Vec<(String, Vec<ClassifiedResult>)>,
    sub_index: HashMap<String, usize>,
}

/// Group `results` into an ordered category tree.
///
/// Listed categories come first in configured order, then unlisted ones in
/// first-seen order; subcategories follow the same rule using the
/// category's subcategory order. Every input result appears exactly once.
/// Labels are compared after trimming surrounding whitespace.
#[must_use]
pub fn group_by_category(results: &[ClassifiedResult], config: &CategoryConfig) -> Vec<CategoryGroup> {
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for result in results {
        let category = label_or(&result.category, UNCATEGORIZED);
        let subcategory = label_or(&result.subcategory, OTHER);

        let b = *index.entry(category.to_string()).or_insert_with(|| {
            buckets.push(Bucket {
                name: category.to_string(),
                ..Bucket::default()
            });
            buckets.len() - 1
        });
        let bucket = &mut buckets[b];

        let s = match bucket.sub_index.get(subcategory) {
            Some(&s) => s,
            None => {
                bucket.subs.push((subcategory.to_string(), Vec::new()));
                bucket.sub_index.insert(subcategory.to_string(), bucket.subs.len() - 1);
                bucket.subs.len() - 1
            }
        };
        bucket.subs[s].1.push(result.clone());
    }

    // Stable sorts: unranked entries keep their first-seen order.
    buckets.sort_by_key(|b| rank_key(config.category_rank(&b.name)));

    buckets
        .into_iter()
        .map(|mut bucket| {
            bucket
                .subs
                .sort_by_key(|(sub, _)| rank_key(config.subcategory_rank(&bucket.name, sub)));

            let subcategories: Vec<GroupedResults> = bucket
                .subs
                .into_iter()
                .map(|(subcategory, results)| GroupedResults {
                    category: bucket.name.clone(),
                    subcategory,
                    stats: Stats::compute(&results),
                    results,
                })
                .collect();

            let stats = Stats::from_statuses(
                subcategories
                    .iter()
                    .flat_map(|s| s.results.iter().map(|r| r.status)),
            );

            CategoryGroup {
                category: bucket.name,
                subcategories,
                stats,
            }
        })
        .collect()
}

/// Trimmed `label`, or `default` when nothing is left.
///
/// Labels differing only by surrounding whitespace share a group, named
/// after the trimmed form.
fn label_or<'a>(label: &'a str, default: &'a str) -> &'a str {
    let label = label.trim();
    if label.is_empty() {
        default
    } else {
        label
    }
}

/// Listed names sort before unlisted ones.
fn rank_key(rank: Option<usize>) -> (bool, usize) {
    rank.map_or((true, 0), |r| (false, r))
}
