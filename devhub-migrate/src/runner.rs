//! Migration runner
//!
//! Drives the registry against one store. Steps run strictly one after the
//! other; the version marker is rewritten after every completed step, so a
//! failed or interrupted run leaves the store at the last completed version
//! and a rerun resumes from there.

use devhub_store::DocumentStore;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::{
    context::MigrationContext,
    error::{MigrationError, MigrationResult, TransformError},
    marker,
    migration::{Direction, Migration, TransformOutcome},
    registry::MigrationRegistry,
    report::{RunReport, StepReport},
};

/// Marker position relative to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub current_version: i64,
    pub latest_version: i64,
    pub applied: Vec<i64>,
    pub pending: Vec<i64>,
}

impl MigrationStatus {
    /// The store was migrated by a newer binary
    pub fn is_ahead(&self) -> bool {
        self.current_version > self.latest_version
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

enum StepEnd {
    Done(Result<TransformOutcome, TransformError>),
    Cancelled,
    DeadlineExceeded,
}

/// Applies registered migrations to a single store
#[derive(Clone)]
pub struct Runner {
    store: Arc<dyn DocumentStore>,
    registry: Arc<MigrationRegistry>,
}

impl Runner {
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<MigrationRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Version recorded in the store
    pub async fn current_version(&self) -> MigrationResult<i64> {
        marker::current_version(self.store.as_ref())
            .await
            .map_err(|source| MigrationError::Marker {
                left_at: None,
                source,
            })
    }

    /// Applied and pending versions
    pub async fn status(&self) -> MigrationResult<MigrationStatus> {
        let current = self.current_version().await?;
        let (applied, pending): (Vec<i64>, Vec<i64>) = self
            .registry
            .versions()
            .into_iter()
            .partition(|v| *v <= current);
        Ok(MigrationStatus {
            current_version: current,
            latest_version: self.registry.latest_version(),
            applied,
            pending,
        })
    }

    /// Apply every migration above the marker, up to `target` if given
    pub async fn apply_up(
        &self,
        ctx: &MigrationContext,
        target: Option<i64>,
    ) -> MigrationResult<RunReport> {
        let current = self.current_version().await?;
        let mut report = RunReport::new(Direction::Up, current, ctx.tenant.clone());

        let latest = self.registry.latest_version();
        if current > latest {
            warn!(
                component = "migration",
                current_version = current,
                latest_version = latest,
                "store is ahead of every known migration, nothing to apply"
            );
            report.complete();
            return Ok(report);
        }

        let target = target.unwrap_or(latest);
        let pending: Vec<Arc<dyn Migration>> = self
            .registry
            .list_ordered()
            .into_iter()
            .filter(|m| m.version() > current && m.version() <= target)
            .collect();
        info!(
            component = "migration",
            from_version = current,
            target_version = target,
            pending = pending.len(),
            "applying migrations up"
        );

        let mut at = current;
        for migration in pending {
            let step = self
                .run_step(ctx, migration.as_ref(), Direction::Up, at)
                .await?;
            self.record(at, migration.version(), migration.description())
                .await?;
            at = migration.version();
            report.push(step, at);
        }

        report.complete();
        Ok(report)
    }

    /// Revert every applied migration above `target`, newest first
    pub async fn apply_down(&self, ctx: &MigrationContext, target: i64) -> MigrationResult<RunReport> {
        let current = self.current_version().await?;
        let mut report = RunReport::new(Direction::Down, current, ctx.tenant.clone());

        let latest = self.registry.latest_version();
        if current > latest {
            warn!(
                component = "migration",
                current_version = current,
                latest_version = latest,
                "store is ahead of every known migration, nothing to revert"
            );
            report.complete();
            return Ok(report);
        }

        let mut pending: Vec<Arc<dyn Migration>> = self
            .registry
            .list_ordered()
            .into_iter()
            .filter(|m| m.version() <= current && m.version() > target)
            .collect();
        pending.reverse();
        info!(
            component = "migration",
            from_version = current,
            target_version = target,
            pending = pending.len(),
            "applying migrations down"
        );

        let mut at = current;
        for migration in pending {
            let step = self
                .run_step(ctx, migration.as_ref(), Direction::Down, at)
                .await?;
            let below = self.registry.version_below(migration.version());
            let description = self
                .registry
                .get(below)
                .map(|m| m.description().to_string())
                .unwrap_or_default();
            self.record(at, below, &description).await?;
            at = below;
            report.push(step, at);
        }

        report.complete();
        Ok(report)
    }

    async fn record(&self, left_at: i64, version: i64, description: &str) -> MigrationResult<()> {
        marker::write_version(self.store.as_ref(), version, description)
            .await
            .map_err(|source| MigrationError::Marker {
                left_at: Some(left_at),
                source,
            })
    }

    async fn run_step(
        &self,
        ctx: &MigrationContext,
        migration: &dyn Migration,
        direction: Direction,
        left_at: i64,
    ) -> MigrationResult<StepReport> {
        let version = migration.version();
        let span = info_span!(
            "migration_step",
            version,
            action = %direction,
            tenant = ctx.tenant.as_deref().unwrap_or("-")
        );

        async move {
            let started = Instant::now();
            let end = if ctx.is_cancelled() {
                StepEnd::Cancelled
            } else if ctx.deadline.is_some_and(|d| d <= started) {
                StepEnd::DeadlineExceeded
            } else {
                self.execute(ctx, migration, direction).await
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            match end {
                StepEnd::Done(Ok(outcome)) => {
                    match &outcome {
                        TransformOutcome::Applied => info!(
                            component = "migration",
                            version,
                            action = %direction,
                            outcome = outcome.label(),
                            duration_ms,
                            description = migration.description(),
                            "migration step"
                        ),
                        TransformOutcome::NotApplicable { reason } => info!(
                            component = "migration",
                            version,
                            action = %direction,
                            outcome = outcome.label(),
                            duration_ms,
                            reason = reason.as_str(),
                            "migration step"
                        ),
                        TransformOutcome::Irreversible { reason } => warn!(
                            component = "migration",
                            version,
                            action = %direction,
                            outcome = outcome.label(),
                            duration_ms,
                            reason = reason.as_str(),
                            "migration step"
                        ),
                    }
                    Ok(StepReport {
                        version,
                        description: migration.description().to_string(),
                        direction,
                        outcome,
                        duration_ms,
                    })
                }
                StepEnd::Done(Err(source)) => {
                    error!(
                        component = "migration",
                        version,
                        action = %direction,
                        outcome = "failed",
                        duration_ms,
                        error = %source,
                        "migration step"
                    );
                    Err(MigrationError::Transform {
                        version,
                        direction,
                        left_at,
                        source,
                    })
                }
                StepEnd::Cancelled => {
                    warn!(
                        component = "migration",
                        version,
                        action = %direction,
                        outcome = "cancelled",
                        duration_ms,
                        "migration step"
                    );
                    Err(MigrationError::Cancelled { version, left_at })
                }
                StepEnd::DeadlineExceeded => {
                    warn!(
                        component = "migration",
                        version,
                        action = %direction,
                        outcome = "cancelled",
                        duration_ms,
                        reason = "deadline exceeded",
                        "migration step"
                    );
                    Err(MigrationError::DeadlineExceeded { version, left_at })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run the transform, dropping it if the run is cancelled or times out
    async fn execute(
        &self,
        ctx: &MigrationContext,
        migration: &dyn Migration,
        direction: Direction,
    ) -> StepEnd {
        let store = self.store.as_ref();
        let work = async {
            match direction {
                Direction::Up => migration.up(ctx, store).await,
                Direction::Down => migration.down(ctx, store).await,
            }
        };
        let bounded = async {
            match ctx.step_deadline() {
                Some(deadline) => match tokio::time::timeout_at(deadline, work).await {
                    Ok(result) => StepEnd::Done(result),
                    Err(_) => StepEnd::DeadlineExceeded,
                },
                None => StepEnd::Done(work.await),
            }
        };
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => StepEnd::Cancelled,
            end = bounded => end,
        }
    }
}
