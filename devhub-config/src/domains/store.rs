//! Document store configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the data lives and how databases are named
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file holding every database
    pub data_path: PathBuf,

    /// Default (non-tenant) database
    pub database: String,

    /// Prefix of tenant database names
    pub tenant_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("devhub-data.json"),
            database: "devhub".to_string(),
            tenant_prefix: "devhub-".to_string(),
        }
    }
}

impl Validatable for StoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.data_path.as_os_str().is_empty() {
            return Err(self.validation_error("data_path cannot be empty"));
        }
        validate_required_string(&self.database, "database", self.domain_name())?;
        validate_required_string(&self.tenant_prefix, "tenant_prefix", self.domain_name())?;
        if self.database.starts_with(&self.tenant_prefix) {
            return Err(self.validation_error(format!(
                "database '{}' would be taken for a tenant database (prefix '{}')",
                self.database, self.tenant_prefix
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "store"
    }
}
