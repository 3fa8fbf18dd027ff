//! Denormalized authentication set count on devices

use async_trait::async_trait;
use devhub_migrate::{
    transforms::{reconcile_counts, unreconcile_counts, ReconcileSpec},
    Migration, MigrationContext, TransformOutcome, TransformResult,
};
use devhub_store::DocumentStore;

use crate::collections::{AUTH_SETS, DEVICES};

pub const COUNT_FIELD: &str = "auth_sets_count";

/// Every auth set counts, whatever its status
pub fn spec() -> ReconcileSpec {
    ReconcileSpec::new(DEVICES, AUTH_SETS, "device_id", COUNT_FIELD)
}

pub struct DevicesAuthSetsCount;

#[async_trait]
impl Migration for DevicesAuthSetsCount {
    fn version(&self) -> i64 {
        3
    }

    fn description(&self) -> &str {
        "reconcile devices.auth_sets_count from auth_sets"
    }

    async fn up(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        reconcile_counts(store, &spec()).await?;
        Ok(TransformOutcome::Applied)
    }

    async fn down(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        unreconcile_counts(store, &spec()).await?;
        Ok(TransformOutcome::Applied)
    }
}
