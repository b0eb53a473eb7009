//! Equality filters for document lookups.

use serde_json::Value;

use crate::document::Document;
use crate::error::StoreError;

/// A conjunction of equality predicates on document paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    predicates: Vec<(String, Value)>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the value at `path` to equal `value`.
    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((path.into(), value.into()));
        self
    }

    pub fn predicates(&self) -> &[(String, Value)] {
        &self.predicates
    }

    /// Reject paths and values a store cannot evaluate.
    pub fn validate(&self) -> Result<(), StoreError> {
        for (path, value) in &self.predicates {
            validate_path(path)?;
            if !is_scalar(value) {
                return Err(StoreError::UnsupportedFilter(path.clone()));
            }
        }
        Ok(())
    }

    /// True when every predicate holds for `doc`.
    pub fn matches(&self, doc: &Document) -> bool {
        self.predicates
            .iter()
            .all(|(path, expected)| doc.get(path) == Some(expected))
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Check a dot-separated path (or collection name) of `[A-Za-z0-9_]` segments.
pub fn validate_path(path: &str) -> Result<(), StoreError> {
    let valid = !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(path.to_string()))
    }
}
