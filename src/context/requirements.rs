//! Declared data requirements and the missing-field check.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::TaskContext;

/// Category → required field names. Field order within a category follows
/// declaration order; categories iterate in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requirements {
    categories: BTreeMap<String, Vec<String>>,
}

impl Requirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare required fields for a category. Repeated calls for the same
    /// category append; duplicate field names are skipped.
    pub fn require<I, S>(mut self, category: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.categories.entry(category.into()).or_default();
        for field in fields {
            let field = field.into();
            if !entry.contains(&field) {
                entry.push(field);
            }
        }
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories.iter().map(|(c, f)| (c.as_str(), f.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Whether every category/field named here is also declared by `other`.
    ///
    /// Used for requirement-driven task discovery: a task can serve a query
    /// when the query's requirements are a per-category subset of the
    /// task's own.
    pub fn is_subset_of(&self, other: &Requirements) -> bool {
        self.categories.iter().all(|(category, fields)| {
            other
                .categories
                .get(category)
                .is_some_and(|supported| fields.iter().all(|f| supported.contains(f)))
        })
    }

    /// Report every required field the context cannot satisfy, formatted as
    /// `"category.field"`.
    ///
    /// An absent category reports all of its fields. Presence is the only
    /// criterion: a field present with a `null` or empty value satisfies the
    /// requirement. Empty result means fully satisfied.
    pub fn missing_from(&self, context: &TaskContext) -> Vec<String> {
        let mut missing = Vec::new();
        for (category, fields) in &self.categories {
            match context.category(category) {
                None => {
                    missing.extend(fields.iter().map(|f| format!("{}.{}", category, f)));
                }
                Some(data) => {
                    for field in fields {
                        if !data.contains_key(field) {
                            missing.push(format!("{}.{}", category, field));
                        }
                    }
                }
            }
        }
        missing
    }
}

/// Free-function form of [`Requirements::missing_from`].
pub fn find_missing(requirements: &Requirements, context: &TaskContext) -> Vec<String> {
    requirements.missing_from(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample_requirements() -> Requirements {
        Requirements::new()
            .require("blockchain", ["recent_blocks", "gas_prices"])
            .require("context", ["network_congestion"])
    }

    #[test]
    fn test_missing_reports_whole_absent_category() {
        let reqs = sample_requirements();
        let ctx = TaskContext::new().with_field("context", "network_congestion", json!(0.5));

        let missing = reqs.missing_from(&ctx);
        assert_eq!(
            missing,
            vec!["blockchain.recent_blocks", "blockchain.gas_prices"]
        );
    }

    #[test]
    fn test_empty_iff_satisfied() {
        let reqs = sample_requirements();
        let ctx = TaskContext::new()
            .with_field("blockchain", "recent_blocks", json!([]))
            .with_field("blockchain", "gas_prices", Value::Null)
            .with_field("context", "network_congestion", json!(0.5));

        assert!(reqs.missing_from(&ctx).is_empty());
    }

    #[test]
    fn test_extra_fields_do_not_change_result() {
        let reqs = sample_requirements();
        let base = TaskContext::new()
            .with_field("blockchain", "recent_blocks", json!([]))
            .with_field("context", "network_congestion", json!(0.5));
        let extended = base
            .clone()
            .with_field("blockchain", "unrelated", json!(1))
            .with_field("defi", "trading_pairs", json!([]));

        assert_eq!(reqs.missing_from(&base), reqs.missing_from(&extended));
        assert_eq!(reqs.missing_from(&base), vec!["blockchain.gas_prices"]);
    }

    #[test]
    fn test_subset_check() {
        let task_reqs = sample_requirements();
        let query = Requirements::new().require("blockchain", ["gas_prices"]);
        assert!(query.is_subset_of(&task_reqs));

        let wider = Requirements::new().require("blockchain", ["gas_prices", "mempool_data"]);
        assert!(!wider.is_subset_of(&task_reqs));

        let other_category = Requirements::new().require("defi", ["volume_data"]);
        assert!(!other_category.is_subset_of(&task_reqs));
    }

    #[test]
    fn test_require_deduplicates_fields() {
        let reqs = Requirements::new()
            .require("blockchain", ["gas_prices"])
            .require("blockchain", ["gas_prices", "recent_blocks"]);
        let fields: Vec<_> = reqs.categories().collect();
        assert_eq!(fields[0].1, &["gas_prices", "recent_blocks"]);
    }
}
