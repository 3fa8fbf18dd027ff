//! Aggregation pipelines
//!
//! A pipeline is an ordered list of stages evaluated over the documents of a
//! collection. Every stage except [`Stage::Merge`] is a pure transformation of
//! the document stream and is evaluated by [`evaluate`]. `Merge` writes its
//! input back into a collection and must be the final stage; stores handle it
//! themselves.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::document::{get_path, remove_path, set_path, Document, IdKey, ID_FIELD};
use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;

/// Expression computing a value from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Value at a dotted path, `null` when missing
    Field(String),
    Literal(Value),
    /// Lowercased string; non-strings pass through
    Lowercase(Box<Expr>),
    /// String concatenation; `null` if any part is `null`
    Concat(Vec<Expr>),
    /// First expression unless it is `null`, otherwise the fallback
    IfNull(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field(path.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn lowercase(inner: Expr) -> Self {
        Expr::Lowercase(Box::new(inner))
    }

    pub fn if_null(inner: Expr, fallback: Expr) -> Self {
        Expr::IfNull(Box::new(inner), Box::new(fallback))
    }

    pub fn eval(&self, doc: &Document) -> Value {
        match self {
            Expr::Field(path) => get_path(doc, path).cloned().unwrap_or(Value::Null),
            Expr::Literal(value) => value.clone(),
            Expr::Lowercase(inner) => match inner.eval(doc) {
                Value::String(s) => Value::String(s.to_lowercase()),
                other => other,
            },
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part.eval(doc) {
                        Value::Null => return Value::Null,
                        Value::String(s) => out.push_str(&s),
                        other => out.push_str(&other.to_string()),
                    }
                }
                Value::String(out)
            }
            Expr::IfNull(inner, fallback) => match inner.eval(doc) {
                Value::Null => fallback.eval(doc),
                other => other,
            },
        }
    }
}

/// What a merge does with an input document whose key matches a target document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenMatched {
    /// Overwrite the target's fields with the input's fields
    Merge,
    /// Replace the target document (keeping its `_id`)
    Replace,
    /// Leave the target untouched
    KeepExisting,
}

/// What a merge does with an input document that matches nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenNotMatched {
    Insert,
    Discard,
}

/// A single pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Match(Filter),
    Set(String, Expr),
    Unset(Vec<String>),
    /// Group by a field, counting members into `count_field`.
    ///
    /// Output documents are `{_id: <key>, <count_field>: n}` in key order.
    Group { key: String, count_field: String },
    /// Write the stream into `into`, matching target documents on `on`
    Merge {
        into: String,
        on: String,
        when_matched: WhenMatched,
        when_not_matched: WhenNotMatched,
    },
}

impl Stage {
    pub fn set(path: impl Into<String>, expr: Expr) -> Self {
        Stage::Set(path.into(), expr)
    }

    pub fn group_count(key: impl Into<String>, count_field: impl Into<String>) -> Self {
        Stage::Group {
            key: key.into(),
            count_field: count_field.into(),
        }
    }

    /// Merge back into `into` by `_id`, updating matches and discarding the rest
    pub fn merge_into(into: impl Into<String>) -> Self {
        Stage::Merge {
            into: into.into(),
            on: ID_FIELD.to_string(),
            when_matched: WhenMatched::Merge,
            when_not_matched: WhenNotMatched::Discard,
        }
    }
}

/// Ordered list of stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Split into the pure stages and the trailing merge, if any.
    ///
    /// Fails if a merge appears anywhere but last.
    pub fn split_merge(&self) -> StoreResult<(&[Stage], Option<&Stage>)> {
        match self.stages.iter().position(|s| matches!(s, Stage::Merge { .. })) {
            None => Ok((self.stages.as_slice(), None)),
            Some(pos) if pos + 1 == self.stages.len() => {
                Ok((&self.stages[..pos], Some(&self.stages[pos])))
            }
            Some(_) => Err(StoreError::QueryFailed(
                "merge must be the last pipeline stage".to_string(),
            )),
        }
    }
}

impl From<Vec<Stage>> for Pipeline {
    fn from(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

/// Evaluate pure stages over a document stream
pub fn evaluate(mut docs: Vec<Document>, stages: &[Stage]) -> StoreResult<Vec<Document>> {
    for stage in stages {
        docs = match stage {
            Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
            Stage::Set(path, expr) => docs
                .into_iter()
                .map(|mut d| {
                    let value = expr.eval(&d);
                    set_path(&mut d, path, value);
                    d
                })
                .collect(),
            Stage::Unset(paths) => docs
                .into_iter()
                .map(|mut d| {
                    for path in paths {
                        remove_path(&mut d, path);
                    }
                    d
                })
                .collect(),
            Stage::Group { key, count_field } => {
                let mut groups: BTreeMap<IdKey, u64> = BTreeMap::new();
                for d in &docs {
                    let k = get_path(d, key).cloned().unwrap_or(Value::Null);
                    *groups.entry(IdKey(k)).or_default() += 1;
                }
                groups
                    .into_iter()
                    .map(|(k, n)| {
                        let mut out = Map::new();
                        out.insert(ID_FIELD.to_string(), k.0);
                        out.insert(count_field.clone(), Value::from(n));
                        out
                    })
                    .collect()
            }
            Stage::Merge { .. } => {
                return Err(StoreError::QueryFailed(
                    "merge cannot be evaluated as a pure stage".to_string(),
                ))
            }
        };
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::from_value;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values.into_iter().filter_map(from_value).collect()
    }

    #[test]
    fn test_expressions() {
        let d = from_value(json!({"email": "Ana@Example.COM", "name": "ana"})).unwrap();
        assert_eq!(Expr::lowercase(Expr::field("email")).eval(&d), json!("ana@example.com"));
        assert_eq!(
            Expr::Concat(vec![Expr::field("name"), Expr::literal("/"), Expr::field("email")]).eval(&d),
            json!("ana/Ana@Example.COM")
        );
        assert_eq!(Expr::Concat(vec![Expr::field("missing")]).eval(&d), Value::Null);
        assert_eq!(
            Expr::if_null(Expr::field("missing"), Expr::literal(0)).eval(&d),
            json!(0)
        );
    }

    #[test]
    fn test_group_counts() {
        let input = docs(vec![
            json!({"_id": 1, "device_id": "b"}),
            json!({"_id": 2, "device_id": "a"}),
            json!({"_id": 3, "device_id": "b"}),
            json!({"_id": 4, "device_id": "c", "status": "rejected"}),
        ]);
        let out = evaluate(
            input,
            &[
                Stage::Match(Filter::ne("status", "rejected")),
                Stage::group_count("device_id", "auth_sets_count"),
            ],
        )
        .unwrap();
        assert_eq!(
            out,
            docs(vec![
                json!({"_id": "a", "auth_sets_count": 1}),
                json!({"_id": "b", "auth_sets_count": 2}),
            ])
        );
    }

    #[test]
    fn test_merge_position() {
        let ok = Pipeline::new()
            .stage(Stage::Match(Filter::All))
            .stage(Stage::merge_into("users"));
        let (pure, merge) = ok.split_merge().unwrap();
        assert_eq!(pure.len(), 1);
        assert!(merge.is_some());

        let bad = Pipeline::from(vec![Stage::merge_into("users"), Stage::Match(Filter::All)]);
        assert!(bad.split_merge().is_err());
    }
}
