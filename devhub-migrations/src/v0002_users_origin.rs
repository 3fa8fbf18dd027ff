//! Default origin for users created before origins were tracked

use async_trait::async_trait;
use devhub_migrate::{
    transforms::add_field, Migration, MigrationContext, TransformOutcome, TransformResult,
};
use devhub_store::DocumentStore;
use tracing::info;

use crate::collections::USERS;

pub const DEFAULT_ORIGIN: &str = "local";

pub struct UsersOrigin;

#[async_trait]
impl Migration for UsersOrigin {
    fn version(&self) -> i64 {
        2
    }

    fn description(&self) -> &str {
        "default users.origin to local"
    }

    async fn up(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        let modified = add_field(store, USERS, "origin", DEFAULT_ORIGIN).await?;
        info!(modified, "defaulted user origins");
        Ok(TransformOutcome::Applied)
    }

    // Defaulted origins cannot be told apart from users created as local.
    async fn down(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Ok(TransformOutcome::irreversible(
            "defaulted origins are indistinguishable from explicit ones",
        ))
    }
}
