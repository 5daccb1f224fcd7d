//! Category display order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Preferred ordering of categories and of the subcategories inside each.
///
/// Names not listed here are still reported, after the listed ones, in the
/// order they were first seen.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CategoryConfig {
    /// Category names, in display order
    #[serde(default, alias = "categoryOrder")]
    pub category_order: Vec<String>,
    /// Subcategory names per category, in display order
    #[serde(default, alias = "subcategoryOrder")]
    pub subcategory_order: HashMap<String, Vec<String>>,
}

impl CategoryConfig {
    /// Create a config with only a category order.
    pub fn with_categories<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category_order: order.into_iter().map(Into::into).collect(),
            subcategory_order: HashMap::new(),
        }
    }

    /// Set the subcategory order of one category.
    #[must_use]
    pub fn with_subcategories<I, S>(mut self, category: impl Into<String>, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subcategory_order
            .insert(category.into(), order.into_iter().map(Into::into).collect());
        self
    }

    /// Configured position of `category`, if listed.
    #[must_use]
    pub fn category_rank(&self, category: &str) -> Option<usize> {
        self.category_order.iter().position(|c| c == category)
    }

    /// Configured position of `subcategory` within `category`, if listed.
    #[must_use]
    pub fn subcategory_rank(&self, category: &str, subcategory: &str) -> Option<usize> {
        self.subcategory_order
            .get(category)?
            .iter()
            .position(|s| s == subcategory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks() {
        let config = CategoryConfig::with_categories(["Ads", "Analytics"])
            .with_subcategories("Ads", ["Google", "Amazon"]);

        assert_eq!(config.category_rank("Analytics"), Some(1));
        assert_eq!(config.category_rank("Social"), None);
        assert_eq!(config.subcategory_rank("Ads", "Amazon"), Some(1));
        assert_eq!(config.subcategory_rank("Analytics", "Google"), None);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let config: CategoryConfig = serde_json::from_str(
            r#"{"categoryOrder": ["Ads"], "subcategoryOrder": {"Ads": ["Google"]}}"#,
        )
        .unwrap();
        assert_eq!(config.category_order, vec!["Ads"]);
        assert_eq!(config.subcategory_rank("Ads", "Google"), Some(0));
    }
}
