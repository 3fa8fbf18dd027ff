//! Index definitions

use serde::{Deserialize, Serialize};

use crate::document::{get_path, Document};
use serde_json::Value;

/// Sort direction of an index key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrder {
    Asc,
    Desc,
}

/// Named index over one or more fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexModel {
    pub name: String,
    pub keys: Vec<(String, IndexOrder)>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            unique: false,
        }
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexOrder::Asc));
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexOrder::Desc));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Same keys and options, ignoring the name
    pub fn same_definition(&self, other: &IndexModel) -> bool {
        self.keys == other.keys && self.unique == other.unique
    }

    /// Key tuple used for uniqueness checks.
    ///
    /// Missing fields index as `null`, as a document store does.
    pub fn key_of(&self, doc: &Document) -> Vec<Value> {
        self.keys
            .iter()
            .map(|(field, _)| get_path(doc, field).cloned().unwrap_or(Value::Null))
            .collect()
    }
}
