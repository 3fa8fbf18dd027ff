//! Lowercased copy of user emails for case-insensitive lookups

use async_trait::async_trait;
use devhub_migrate::{
    transforms::{aggregate_replace, remove_field},
    Migration, MigrationContext, TransformOutcome, TransformResult,
};
use devhub_store::{DocumentStore, Expr, Filter, Stage};

use crate::collections::USERS;

pub const NORMALIZED_FIELD: &str = "email_normalized";

pub struct UsersEmailNormalized;

#[async_trait]
impl Migration for UsersEmailNormalized {
    fn version(&self) -> i64 {
        4
    }

    fn description(&self) -> &str {
        "add users.email_normalized"
    }

    async fn up(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        aggregate_replace(
            store,
            USERS,
            vec![
                Stage::Match(Filter::exists("email")),
                Stage::set(NORMALIZED_FIELD, Expr::lowercase(Expr::field("email"))),
            ],
        )
        .await?;
        Ok(TransformOutcome::Applied)
    }

    async fn down(&self, _ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        remove_field(store, USERS, NORMALIZED_FIELD).await?;
        Ok(TransformOutcome::Applied)
    }
}
