//! Document filters

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::document::{compare_values, get_path, Document, ID_FIELD};

/// A predicate over documents, addressed by dotted field paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every document
    All,
    /// Field equals value (a missing field equals `null`)
    Eq(String, Value),
    /// Field differs from value
    Ne(String, Value),
    /// Field presence (`true`) or absence (`false`)
    Exists(String, bool),
    /// Field equals one of the values
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Filter::Exists(field.into(), true)
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Filter::Exists(field.into(), false)
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In(field.into(), values)
    }

    /// Match a single document by primary key
    pub fn by_id(id: impl Into<Value>) -> Self {
        Filter::Eq(ID_FIELD.to_string(), id.into())
    }

    /// Conjunction with another filter, flattening nested `And`s
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (l, r) => Filter::And(vec![l, r]),
        }
    }

    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Evaluate the filter against a document
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => field_equals(doc, field, value),
            Filter::Ne(field, value) => !field_equals(doc, field, value),
            Filter::Exists(field, present) => get_path(doc, field).is_some() == *present,
            Filter::In(field, values) => values.iter().any(|v| field_equals(doc, field, v)),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
            Filter::Not(inner) => !inner.matches(doc),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

fn field_equals(doc: &Document, field: &str, expected: &Value) -> bool {
    match get_path(doc, field) {
        Some(actual) => {
            compare_values(actual, expected) == Ordering::Equal
                || matches!(actual, Value::Array(items)
                    if items.iter().any(|i| compare_values(i, expected) == Ordering::Equal))
        }
        None => expected.is_null(),
    }
}
