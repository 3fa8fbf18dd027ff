//! Migration trait and step outcomes

use async_trait::async_trait;
use devhub_store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{context::MigrationContext, error::TransformError};

/// Result type for transforms
pub type TransformResult<T> = std::result::Result<T, TransformError>;

/// Direction a migration step runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "Up"),
            Direction::Down => write!(f, "Down"),
        }
    }
}

/// Successful result of running one direction of a migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransformOutcome {
    /// The transform ran
    Applied,
    /// The transform does not apply to this deployment; counts as done
    NotApplicable { reason: String },
    /// There is nothing to undo; counts as done
    Irreversible { reason: String },
}

impl TransformOutcome {
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        TransformOutcome::NotApplicable {
            reason: reason.into(),
        }
    }

    pub fn irreversible(reason: impl Into<String>) -> Self {
        TransformOutcome::Irreversible {
            reason: reason.into(),
        }
    }

    /// Value of the `outcome` log field
    pub fn label(&self) -> &'static str {
        match self {
            TransformOutcome::Applied => "applied",
            TransformOutcome::NotApplicable { .. } => "skipped",
            TransformOutcome::Irreversible { .. } => "irreversible",
        }
    }
}

/// A versioned, ordered transformation of the store.
///
/// `up` must be idempotent: a run interrupted after `up` finished but before
/// the version marker was written repeats it.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Strictly positive, unique version number
    fn version(&self) -> i64;

    /// Human readable summary, recorded with the version marker
    fn description(&self) -> &str;

    /// Move the store from the previous version to this one
    async fn up(
        &self,
        ctx: &MigrationContext,
        store: &dyn DocumentStore,
    ) -> TransformResult<TransformOutcome>;

    /// Undo `up`, or report why that is impossible
    async fn down(
        &self,
        ctx: &MigrationContext,
        store: &dyn DocumentStore,
    ) -> TransformResult<TransformOutcome>;
}

impl fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version())
            .field("description", &self.description())
            .finish()
    }
}
