//! Deployment description handed to migrations

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Edition of the deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentKind {
    #[default]
    Community,
    Enterprise,
}

impl FromStr for DeploymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "community" | "os" => Ok(DeploymentKind::Community),
            "enterprise" => Ok(DeploymentKind::Enterprise),
            _ => Err(format!("Invalid deployment mode: {}", s)),
        }
    }
}

/// Deployment configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub mode: DeploymentKind,

    /// Hosted (multi-tenant cloud) deployment
    pub cloud: bool,
}

impl Validatable for DeploymentConfig {
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "deployment"
    }
}
