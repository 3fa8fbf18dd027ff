//! Deployment environment queries

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Edition of the deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Community,
    Enterprise,
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "community" | "os" | "open-source" => Ok(DeploymentMode::Community),
            "enterprise" => Ok(DeploymentMode::Enterprise),
            other => Err(format!("unknown deployment mode: {}", other)),
        }
    }
}

/// Read-only view of the deployment a migration runs in.
///
/// Passed to migrations through the execution context; migrations must not
/// consult process-wide settings for this.
#[cfg_attr(test, mockall::automock)]
pub trait EnvironmentGate: Send + Sync {
    fn is_cloud(&self) -> bool;

    fn is_enterprise(&self) -> bool;

    fn is_community(&self) -> bool {
        !self.is_enterprise()
    }
}

/// Gate with fixed answers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticGate {
    pub mode: DeploymentMode,
    pub cloud: bool,
}

impl StaticGate {
    pub fn new(mode: DeploymentMode, cloud: bool) -> Self {
        Self { mode, cloud }
    }

    pub fn community() -> Self {
        Self::new(DeploymentMode::Community, false)
    }

    pub fn enterprise() -> Self {
        Self::new(DeploymentMode::Enterprise, false)
    }
}

impl EnvironmentGate for StaticGate {
    fn is_cloud(&self) -> bool {
        self.cloud
    }

    fn is_enterprise(&self) -> bool {
        self.mode == DeploymentMode::Enterprise
    }
}
