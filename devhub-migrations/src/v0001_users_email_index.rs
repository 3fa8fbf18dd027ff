//! Unique index on user emails

use async_trait::async_trait;
use devhub_migrate::{
    transforms::{drop_index_if_exists, ensure_index},
    Migration, MigrationContext, TransformOutcome, TransformResult,
};
use devhub_store::{DocumentStore, IndexModel};

use crate::collections::USERS;

pub const INDEX_NAME: &str = "email";

pub struct UsersEmailIndex;

#[async_trait]
impl Migration for UsersEmailIndex {
    fn version(&self) -> i64 {
        1
    }

    fn description(&self) -> &str {
        "unique index on users.email"
    }

    async fn up(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        ensure_index(store, USERS, IndexModel::new(INDEX_NAME).asc("email").unique()).await?;
        Ok(TransformOutcome::Applied)
    }

    async fn down(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        drop_index_if_exists(store, USERS, INDEX_NAME).await?;
        Ok(TransformOutcome::Applied)
    }
}
