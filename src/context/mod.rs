//! Execution context passed into analysis tasks.
//!
//! A context is a snapshot of already-fetched chain data, grouped by
//! category ("blockchain", "governance", "defi", "context"). Tasks only read
//! from it; nothing in the task layer mutates a context after construction.

mod requirements;

pub use requirements::{find_missing, Requirements};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nested category → field → value mapping supplied fresh per execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskContext {
    categories: BTreeMap<String, Map<String, Value>>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a single field, creating the category if needed.
    pub fn insert(
        &mut self,
        category: impl Into<String>,
        field: impl Into<String>,
        value: Value,
    ) {
        self.categories
            .entry(category.into())
            .or_default()
            .insert(field.into(), value);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_field(
        mut self,
        category: impl Into<String>,
        field: impl Into<String>,
        value: Value,
    ) -> Self {
        self.insert(category, field, value);
        self
    }

    /// Merge an entire category object. Non-object values are ignored.
    pub fn with_category(mut self, category: impl Into<String>, value: Value) -> Self {
        if let Value::Object(fields) = value {
            self.categories.entry(category.into()).or_default().extend(fields);
        }
        self
    }

    pub fn category(&self, name: &str) -> Option<&Map<String, Value>> {
        self.categories.get(name)
    }

    pub fn get(&self, category: &str, field: &str) -> Option<&Value> {
        self.categories.get(category)?.get(field)
    }

    /// Presence check only: a field holding `null` or an empty collection
    /// still counts as present.
    pub fn has(&self, category: &str, field: &str) -> bool {
        self.get(category, field).is_some()
    }

    /// Deserialize a field into a typed value. Returns `None` when the field
    /// is absent or has an incompatible shape.
    pub fn field_as<T: serde::de::DeserializeOwned>(
        &self,
        category: &str,
        field: &str,
    ) -> Option<T> {
        serde_json::from_value(self.get(category, field)?.clone()).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
