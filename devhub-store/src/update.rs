//! Field-level update descriptions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{get_path, remove_path, set_path, Document};

/// An ordered list of `$set` and `$unset` operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub set: Vec<(String, Value)>,
    #[serde(default)]
    pub unset: Vec<String>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to a value
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    /// Remove a field
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Apply to a document, returning whether anything changed
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut changed = false;
        for (field, value) in &self.set {
            if get_path(doc, field) != Some(value) {
                set_path(doc, field, value.clone());
                changed = true;
            }
        }
        for field in &self.unset {
            if remove_path(doc, field).is_some() {
                changed = true;
            }
        }
        changed
    }
}

/// Outcome of an update or replace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Documents matched by the filter
    pub matched: u64,
    /// Documents actually changed (or inserted by an upsert)
    pub modified: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::from_value;
    use serde_json::json;

    #[test]
    fn test_apply_reports_changes() {
        let mut doc = from_value(json!({"_id": 1, "origin": "sso", "legacy": true})).unwrap();

        let update = Update::new().set("origin", "sso").unset("missing");
        assert!(!update.apply(&mut doc));

        let update = Update::new().set("origin", "local").unset("legacy");
        assert!(update.apply(&mut doc));
        assert_eq!(doc.get("origin"), Some(&json!("local")));
        assert!(!doc.contains_key("legacy"));
        assert!(!update.is_empty());
        assert!(Update::new().is_empty());
    }
}
