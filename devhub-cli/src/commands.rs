//! Command implementations

use anyhow::{Context, Result};
use devhub_config::{DeploymentConfig, DeploymentKind, DevhubConfig};
use devhub_migrate::{
    CancellationToken, DeploymentMode, MigrationContext, MigrationError, MigrationRegistry,
    MigrationStatus, RunReport, Runner, StaticGate, TenantError, TenantMigrator,
};
use devhub_store::InMemoryClient;
use std::sync::Arc;
use tracing::{info, warn};

/// Gate describing the configured deployment
pub fn gate_for(deployment: &DeploymentConfig) -> StaticGate {
    let mode = match deployment.mode {
        DeploymentKind::Community => DeploymentMode::Community,
        DeploymentKind::Enterprise => DeploymentMode::Enterprise,
    };
    StaticGate::new(mode, deployment.cloud)
}

/// Execution context for a run, cancelled through `cancel`
pub fn build_context(config: &DevhubConfig, cancel: CancellationToken) -> MigrationContext {
    let mut ctx = MigrationContext::new(Arc::new(gate_for(&config.deployment)))
        .with_cancel(cancel)
        .with_batch_size(config.migration.batch_size);
    if let Some(timeout) = config.migration.step_timeout {
        ctx = ctx.with_step_timeout(timeout);
    }
    ctx
}

fn migration_failure(database: &str, err: MigrationError) -> anyhow::Error {
    let message = match err.database_version() {
        Some(version) => format!("{}: database left at version {}", database, version),
        None => format!("{}: migration failed", database),
    };
    anyhow::Error::new(err).context(message)
}

fn tenant_failure(prefix: &str, err: TenantError) -> anyhow::Error {
    let database = match err.tenant() {
        Some(tenant) => format!("{}{}", prefix, tenant),
        None => "tenant databases".to_string(),
    };
    let version = match &err {
        TenantError::Migration { source, .. } => source.database_version(),
        _ => None,
    };
    let message = match version {
        Some(version) => format!("{}: database left at version {}", database, version),
        None => format!("{}: migration failed", database),
    };
    anyhow::Error::new(err).context(message)
}

fn print_report(database: &str, report: &RunReport) {
    if report.is_noop() {
        println!("{}: at version {}, nothing to do", database, report.to_version);
        return;
    }
    println!(
        "{}: {} {} -> {} ({} steps, {} ms)",
        database,
        report.direction,
        report.from_version,
        report.to_version,
        report.steps.len(),
        report.total_duration_ms
    );
    for step in &report.steps {
        println!(
            "  {:>4}  {:<12} {}",
            step.version,
            step.outcome.label(),
            step.description
        );
    }
}

fn print_status(database: &str, status: &MigrationStatus) {
    let state = if status.is_ahead() {
        "ahead of this binary"
    } else if status.is_up_to_date() {
        "up to date"
    } else {
        "pending"
    };
    println!(
        "{}: version {} of {} ({}), pending {:?}",
        database, status.current_version, status.latest_version, state, status.pending
    );
}

/// Runs commands against one in-memory deployment
pub struct MigrationApp {
    client: InMemoryClient,
    registry: Arc<MigrationRegistry>,
    database: String,
    tenant_prefix: String,
    include_tenants: bool,
}

impl MigrationApp {
    pub fn new(config: &DevhubConfig, client: InMemoryClient) -> Result<Self> {
        let registry = devhub_migrations::registry().context("Invalid migration catalog")?;
        Ok(Self {
            client,
            registry: Arc::new(registry),
            database: config.store.database.clone(),
            tenant_prefix: config.store.tenant_prefix.clone(),
            include_tenants: config.migration.include_tenants,
        })
    }

    async fn default_runner(&self) -> Runner {
        let store = self.client.store(&self.database).await;
        Runner::new(Arc::new(store), self.registry.clone())
    }

    fn tenants(&self) -> TenantMigrator {
        TenantMigrator::new(
            Arc::new(self.client.clone()),
            self.registry.clone(),
            self.tenant_prefix.clone(),
        )
    }

    fn tenant_database(&self, tenant: &str) -> String {
        format!("{}{}", self.tenant_prefix, tenant)
    }

    /// Migrate up: the default database first, then each tenant
    pub async fn up(
        &self,
        ctx: &MigrationContext,
        target: Option<i64>,
        tenant: Option<&str>,
        skip_tenants: bool,
    ) -> Result<Vec<RunReport>> {
        if let Some(tenant) = tenant {
            let report = self
                .tenants()
                .apply_up_tenant(ctx, tenant, target)
                .await
                .map_err(|e| tenant_failure(&self.tenant_prefix, e))?;
            print_report(&self.tenant_database(tenant), &report);
            return Ok(vec![report]);
        }

        let report = self
            .default_runner()
            .await
            .apply_up(ctx, target)
            .await
            .map_err(|e| migration_failure(&self.database, e))?;
        print_report(&self.database, &report);
        let mut reports = vec![report];

        if self.include_tenants && !skip_tenants {
            let tenant_reports = self
                .tenants()
                .apply_up(ctx, target)
                .await
                .map_err(|e| tenant_failure(&self.tenant_prefix, e))?;
            for report in &tenant_reports {
                let tenant = report.tenant.as_deref().unwrap_or_default();
                print_report(&self.tenant_database(tenant), report);
            }
            reports.extend(tenant_reports);
        }

        info!(component = "cli", runs = reports.len(), "migration complete");
        Ok(reports)
    }

    /// Migrate down: tenants first, then the default database
    pub async fn down(
        &self,
        ctx: &MigrationContext,
        target: i64,
        tenant: Option<&str>,
    ) -> Result<Vec<RunReport>> {
        if let Some(tenant) = tenant {
            let report = self
                .tenants()
                .apply_down_tenant(ctx, tenant, target)
                .await
                .map_err(|e| tenant_failure(&self.tenant_prefix, e))?;
            print_report(&self.tenant_database(tenant), &report);
            return Ok(vec![report]);
        }

        let mut reports = Vec::new();
        if self.include_tenants {
            reports = self
                .tenants()
                .apply_down(ctx, target)
                .await
                .map_err(|e| tenant_failure(&self.tenant_prefix, e))?;
            for report in &reports {
                let tenant = report.tenant.as_deref().unwrap_or_default();
                print_report(&self.tenant_database(tenant), report);
            }
        }

        let report = self
            .default_runner()
            .await
            .apply_down(ctx, target)
            .await
            .map_err(|e| migration_failure(&self.database, e))?;
        print_report(&self.database, &report);
        reports.push(report);
        Ok(reports)
    }

    /// Version of the default database and every tenant database
    pub async fn status(&self) -> Result<Vec<(String, MigrationStatus)>> {
        let status = self
            .default_runner()
            .await
            .status()
            .await
            .map_err(|e| migration_failure(&self.database, e))?;
        let mut statuses = vec![(self.database.clone(), status)];

        let tenants = self
            .tenants()
            .status()
            .await
            .map_err(|e| tenant_failure(&self.tenant_prefix, e))?;
        statuses.extend(
            tenants
                .into_iter()
                .map(|(tenant, status)| (self.tenant_database(&tenant), status)),
        );

        for (database, status) in &statuses {
            if status.is_ahead() {
                warn!(
                    component = "cli",
                    database = %database,
                    current_version = status.current_version,
                    latest_version = status.latest_version,
                    "database is ahead of the registered migrations"
                );
            }
        }
        Ok(statuses)
    }

    pub async fn print_status(&self, json: bool) -> Result<()> {
        let statuses = self.status().await?;
        if json {
            let rows: Vec<serde_json::Value> = statuses
                .iter()
                .map(|(database, status)| {
                    serde_json::json!({ "database": database, "status": status })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("Failed to encode status")?
            );
        } else {
            for (database, status) in &statuses {
                print_status(database, status);
            }
        }
        Ok(())
    }

    /// Registered migrations in application order
    pub fn list(&self) {
        for migration in self.registry.list_ordered() {
            println!("{:>4}  {}", migration.version(), migration.description());
        }
    }
}
