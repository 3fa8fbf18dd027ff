//! Migrations for exercising the runner in tests

use async_trait::async_trait;
use devhub_store::{document::from_value, DocumentStore, Filter};
use serde_json::json;

use crate::{
    context::MigrationContext,
    error::TransformError,
    migration::{Migration, TransformOutcome, TransformResult},
};

/// Collection [`RecordMigration`] writes to
pub const APPLIED_STEPS: &str = "applied_steps";

/// Does nothing in either direction
#[derive(Debug, Clone)]
pub struct NoopMigration {
    version: i64,
    description: String,
}

impl NoopMigration {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            description: format!("noop {}", version),
        }
    }
}

#[async_trait]
impl Migration for NoopMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn up(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Ok(TransformOutcome::Applied)
    }

    async fn down(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Ok(TransformOutcome::Applied)
    }
}

/// Records its version in [`APPLIED_STEPS`] on up and removes it on down
#[derive(Debug, Clone)]
pub struct RecordMigration {
    version: i64,
    description: String,
}

impl RecordMigration {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            description: format!("record {}", version),
        }
    }

    /// Versions currently recorded, ascending
    pub async fn applied(store: &dyn DocumentStore) -> Vec<i64> {
        let docs = store
            .find_batch(APPLIED_STEPS, &Filter::All, None, usize::MAX)
            .await
            .unwrap_or_default();
        docs.iter()
            .filter_map(|doc| doc.get("_id").and_then(|v| v.as_i64()))
            .collect()
    }
}

#[async_trait]
impl Migration for RecordMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn up(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        let doc = from_value(json!({"_id": self.version, "runs": 1}))
            .ok_or_else(|| TransformError::Invalid("step record".to_string()))?;
        store
            .replace_one(APPLIED_STEPS, &Filter::by_id(self.version), doc, true)
            .await?;
        Ok(TransformOutcome::Applied)
    }

    async fn down(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        store
            .delete_many(APPLIED_STEPS, &Filter::by_id(self.version))
            .await?;
        Ok(TransformOutcome::Applied)
    }
}

/// Fails in both directions
#[derive(Debug, Clone)]
pub struct FailingMigration {
    version: i64,
}

impl FailingMigration {
    pub fn new(version: i64) -> Self {
        Self { version }
    }
}

#[async_trait]
impl Migration for FailingMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn description(&self) -> &str {
        "always fails"
    }

    async fn up(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Err(TransformError::Invalid(format!("migration {} refuses to run", self.version)))
    }

    async fn down(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Err(TransformError::Invalid(format!("migration {} refuses to run", self.version)))
    }
}

/// Returns the same outcome in both directions without touching the store
#[derive(Debug, Clone)]
pub struct FixedOutcomeMigration {
    version: i64,
    outcome: TransformOutcome,
}

impl FixedOutcomeMigration {
    pub fn new(version: i64, outcome: TransformOutcome) -> Self {
        Self { version, outcome }
    }
}

#[async_trait]
impl Migration for FixedOutcomeMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn description(&self) -> &str {
        self.outcome.label()
    }

    async fn up(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Ok(self.outcome.clone())
    }

    async fn down(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Ok(self.outcome.clone())
    }
}
