//! Fan-out over tenant databases

use devhub_store::{tenant_database, tenant_from_database, StoreClient};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::{
    context::MigrationContext,
    error::TenantError,
    registry::MigrationRegistry,
    report::RunReport,
    runner::{MigrationStatus, Runner},
};

#[derive(Debug, Clone, Copy)]
enum Plan {
    Up(Option<i64>),
    Down(i64),
}

/// Runs the registry against every tenant database, one tenant at a time.
///
/// Tenant databases are those whose name carries the configured prefix; the
/// default database is migrated separately by the caller.
pub struct TenantMigrator {
    client: Arc<dyn StoreClient>,
    registry: Arc<MigrationRegistry>,
    prefix: String,
}

impl TenantMigrator {
    pub fn new(
        client: Arc<dyn StoreClient>,
        registry: Arc<MigrationRegistry>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            registry,
            prefix: prefix.into(),
        }
    }

    /// Tenant ids with a database, sorted
    pub async fn tenants(&self) -> Result<Vec<String>, TenantError> {
        let databases = self.client.list_databases().await.map_err(TenantError::List)?;
        let mut tenants: Vec<String> = databases
            .iter()
            .filter_map(|db| tenant_from_database(&self.prefix, db))
            .map(str::to_string)
            .collect();
        tenants.sort();
        Ok(tenants)
    }

    /// Runner bound to one tenant's database
    pub async fn runner_for(&self, tenant: &str) -> Result<Runner, TenantError> {
        let store = self
            .client
            .database(&tenant_database(&self.prefix, tenant))
            .await
            .map_err(|source| TenantError::Open {
                tenant: tenant.to_string(),
                source,
            })?;
        Ok(Runner::new(store, self.registry.clone()))
    }

    /// Migrate every tenant up; stops at the first failing tenant
    pub async fn apply_up(
        &self,
        ctx: &MigrationContext,
        target: Option<i64>,
    ) -> Result<Vec<RunReport>, TenantError> {
        self.run_all(ctx, Plan::Up(target)).await
    }

    /// Migrate every tenant down; stops at the first failing tenant
    pub async fn apply_down(
        &self,
        ctx: &MigrationContext,
        target: i64,
    ) -> Result<Vec<RunReport>, TenantError> {
        self.run_all(ctx, Plan::Down(target)).await
    }

    /// Migrate a single tenant up
    pub async fn apply_up_tenant(
        &self,
        ctx: &MigrationContext,
        tenant: &str,
        target: Option<i64>,
    ) -> Result<RunReport, TenantError> {
        self.run_tenant(ctx, tenant, Plan::Up(target)).await
    }

    /// Migrate a single tenant down
    pub async fn apply_down_tenant(
        &self,
        ctx: &MigrationContext,
        tenant: &str,
        target: i64,
    ) -> Result<RunReport, TenantError> {
        self.run_tenant(ctx, tenant, Plan::Down(target)).await
    }

    /// Status of every tenant
    pub async fn status(&self) -> Result<Vec<(String, MigrationStatus)>, TenantError> {
        let mut statuses = Vec::new();
        for tenant in self.tenants().await? {
            let runner = self.runner_for(&tenant).await?;
            let status = runner
                .status()
                .await
                .map_err(|source| TenantError::Migration {
                    tenant: tenant.clone(),
                    completed: Vec::new(),
                    source,
                })?;
            statuses.push((tenant, status));
        }
        Ok(statuses)
    }

    async fn run_all(&self, ctx: &MigrationContext, plan: Plan) -> Result<Vec<RunReport>, TenantError> {
        let tenants = self.tenants().await?;
        info!(component = "migration", tenants = tenants.len(), "migrating tenant databases");

        let mut completed = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            match self.run_tenant(ctx, &tenant, plan).await {
                Ok(report) => completed.push(report),
                Err(TenantError::Migration { tenant, source, .. }) => {
                    return Err(TenantError::Migration {
                        tenant,
                        completed,
                        source,
                    })
                }
                Err(other) => return Err(other),
            }
        }
        Ok(completed)
    }

    async fn run_tenant(
        &self,
        ctx: &MigrationContext,
        tenant: &str,
        plan: Plan,
    ) -> Result<RunReport, TenantError> {
        let runner = self.runner_for(tenant).await?;
        let ctx = ctx.for_tenant(tenant);
        let result = async {
            match plan {
                Plan::Up(target) => runner.apply_up(&ctx, target).await,
                Plan::Down(target) => runner.apply_down(&ctx, target).await,
            }
        }
        .instrument(info_span!("tenant", tenant))
        .await;
        result.map_err(|source| TenantError::Migration {
            tenant: tenant.to_string(),
            completed: Vec::new(),
            source,
        })
    }
}
