//! Default plan for tenants of enterprise deployments

use async_trait::async_trait;
use devhub_migrate::{
    transforms::{add_field, gated},
    EnvironmentGate, Migration, MigrationContext, TransformOutcome, TransformResult,
};
use devhub_store::{DocumentStore, Filter, Update};

use crate::collections::TENANTS;

pub const DEFAULT_PLAN: &str = "os";

const ENTERPRISE_ONLY: &str = "tenant plans exist on enterprise deployments only";

pub struct TenantsPlan;

#[async_trait]
impl Migration for TenantsPlan {
    fn version(&self) -> i64 {
        6
    }

    fn description(&self) -> &str {
        "default tenants.plan on enterprise"
    }

    async fn up(&self, ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        if let Some(skip) = gated(ctx, |gate: &dyn EnvironmentGate| gate.is_enterprise(), ENTERPRISE_ONLY) {
            return Ok(skip);
        }
        add_field(store, TENANTS, "plan", DEFAULT_PLAN).await?;
        Ok(TransformOutcome::Applied)
    }

    async fn down(&self, ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        if let Some(skip) = gated(ctx, |gate: &dyn EnvironmentGate| gate.is_enterprise(), ENTERPRISE_ONLY) {
            return Ok(skip);
        }
        store
            .update_many(TENANTS, &Filter::eq("plan", DEFAULT_PLAN), &Update::new().unset("plan"))
            .await?;
        Ok(TransformOutcome::Applied)
    }
}
