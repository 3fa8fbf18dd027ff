//! Execution context handed to every migration step

use devhub_store::DEFAULT_BATCH_SIZE;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::gate::{EnvironmentGate, StaticGate};

/// Per-run context: cancellation, deadline, deployment gate and tuning
#[derive(Clone)]
pub struct MigrationContext {
    pub cancel: CancellationToken,
    /// Absolute deadline for the whole run
    pub deadline: Option<Instant>,
    /// Upper bound for a single step
    pub step_timeout: Option<Duration>,
    pub gate: Arc<dyn EnvironmentGate>,
    /// Page size for cursors and transactional swaps
    pub batch_size: usize,
    /// Tenant the run is scoped to, if any
    pub tenant: Option<String>,
}

impl MigrationContext {
    pub fn new(gate: Arc<dyn EnvironmentGate>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
            step_timeout: None,
            gate,
            batch_size: DEFAULT_BATCH_SIZE,
            tenant: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Same context scoped to a tenant; shares the cancellation token
    pub fn for_tenant(&self, tenant: impl Into<String>) -> Self {
        Self {
            tenant: Some(tenant.into()),
            ..self.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Earliest of the run deadline and `now + step_timeout`
    pub fn step_deadline(&self) -> Option<Instant> {
        let step = self.step_timeout.map(|t| Instant::now() + t);
        match (self.deadline, step) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

impl Default for MigrationContext {
    fn default() -> Self {
        Self::new(Arc::new(StaticGate::default()))
    }
}

impl std::fmt::Debug for MigrationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("step_timeout", &self.step_timeout)
            .field("enterprise", &self.gate.is_enterprise())
            .field("cloud", &self.gate.is_cloud())
            .field("batch_size", &self.batch_size)
            .field("tenant", &self.tenant)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_step_deadline_takes_earliest() {
        let ctx = MigrationContext::default();
        assert!(ctx.step_deadline().is_none());

        let run_deadline = Instant::now() + Duration::from_secs(5);
        let ctx = ctx
            .with_deadline(run_deadline)
            .with_step_timeout(Duration::from_secs(60));
        assert_eq!(ctx.step_deadline(), Some(run_deadline));

        let ctx = ctx.with_step_timeout(Duration::from_secs(1));
        assert!(ctx.step_deadline().is_some_and(|d| d < run_deadline));
    }

    #[test]
    fn test_tenant_context_shares_cancellation() {
        let ctx = MigrationContext::default().with_batch_size(0);
        assert_eq!(ctx.batch_size, 1);

        let tenant = ctx.for_tenant("t1");
        assert_eq!(tenant.tenant.as_deref(), Some("t1"));
        ctx.cancel.cancel();
        assert!(tenant.is_cancelled());
    }
}
