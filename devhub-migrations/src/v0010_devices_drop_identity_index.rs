//! Drop the legacy identity index on devices

use async_trait::async_trait;
use devhub_migrate::{
    transforms::{drop_index_if_exists, ensure_index},
    Migration, MigrationContext, TransformOutcome, TransformResult,
};
use devhub_store::{DocumentStore, IndexModel};

use crate::collections::DEVICES;

pub const LEGACY_INDEX: &str = "identity_data";

pub fn legacy_index() -> IndexModel {
    IndexModel::new(LEGACY_INDEX).asc("identity_data")
}

pub struct DevicesDropIdentityIndex;

#[async_trait]
impl Migration for DevicesDropIdentityIndex {
    fn version(&self) -> i64 {
        10
    }

    fn description(&self) -> &str {
        "drop legacy devices.identity_data index"
    }

    async fn up(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        drop_index_if_exists(store, DEVICES, LEGACY_INDEX).await?;
        Ok(TransformOutcome::Applied)
    }

    async fn down(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        ensure_index(store, DEVICES, legacy_index()).await?;
        Ok(TransformOutcome::Applied)
    }
}
