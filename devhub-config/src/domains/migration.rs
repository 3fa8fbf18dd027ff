//! Migration run configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How migrations are run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Version to migrate up to; latest when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_version: Option<i64>,

    /// Documents per page for cursors and transactional swaps
    pub batch_size: usize,

    /// Upper bound for a single step, in seconds
    #[serde(
        with = "crate::domains::utils::serde_duration_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub step_timeout: Option<Duration>,

    /// Also migrate tenant databases
    #[serde(default = "crate::domains::utils::default_true")]
    pub include_tenants: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            target_version: None,
            batch_size: 100,
            step_timeout: None,
            include_tenants: true,
        }
    }
}

impl Validatable for MigrationConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.batch_size, "batch_size", self.domain_name())?;
        if let Some(target) = self.target_version {
            if target < 0 {
                return Err(self.validation_error(format!(
                    "target_version cannot be negative, got {}",
                    target
                )));
            }
        }
        if self.step_timeout == Some(Duration::ZERO) {
            return Err(self.validation_error("step_timeout must be greater than 0"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "migration"
    }
}
