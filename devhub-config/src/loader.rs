//! Configuration loading and environment variable handling

use crate::domains::{
    deployment::{DeploymentConfig, DeploymentKind},
    logging::{LogFormat, LogLevel, LoggingConfig},
    migration::MigrationConfig,
    store::StoreConfig,
    DevhubConfig,
};
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "DEVHUB".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<DevhubConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: DevhubConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<DevhubConfig> {
        let mut config = DevhubConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<DevhubConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut DevhubConfig) -> ConfigResult<()> {
        self.apply_store_overrides(&mut config.store);
        self.apply_migration_overrides(&mut config.migration)?;
        self.apply_deployment_overrides(&mut config.deployment)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply store config overrides
    fn apply_store_overrides(&self, config: &mut StoreConfig) {
        if let Ok(path) = self.get_env_var("DATA_PATH") {
            config.data_path = PathBuf::from(path);
        }

        if let Ok(database) = self.get_env_var("DATABASE") {
            config.database = database;
        }

        if let Ok(prefix) = self.get_env_var("TENANT_PREFIX") {
            config.tenant_prefix = prefix;
        }
    }

    /// Apply migration config overrides
    fn apply_migration_overrides(&self, config: &mut MigrationConfig) -> ConfigResult<()> {
        if let Ok(batch_size) = self.get_env_var("MIGRATION_BATCH_SIZE") {
            config.batch_size = batch_size.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid MIGRATION_BATCH_SIZE: {}", e))
            })?;
        }

        if let Ok(target) = self.get_env_var("MIGRATION_TARGET") {
            config.target_version = Some(target.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid MIGRATION_TARGET: {}", e))
            })?);
        }

        if let Ok(timeout) = self.get_env_var("MIGRATION_STEP_TIMEOUT") {
            let seconds: u64 = timeout.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid MIGRATION_STEP_TIMEOUT: {}", e))
            })?;
            config.step_timeout = Some(Duration::from_secs(seconds));
        }

        if let Ok(include) = self.get_env_var("MIGRATION_INCLUDE_TENANTS") {
            config.include_tenants = include.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid MIGRATION_INCLUDE_TENANTS: {}", e))
            })?;
        }

        Ok(())
    }

    /// Apply deployment config overrides
    fn apply_deployment_overrides(&self, config: &mut DeploymentConfig) -> ConfigResult<()> {
        if let Ok(mode) = self.get_env_var("DEPLOYMENT_MODE") {
            config.mode = DeploymentKind::from_str(&mode).map_err(ConfigError::EnvError)?;
        }

        if let Ok(cloud) = self.get_env_var("CLOUD") {
            config.cloud = cloud
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid CLOUD: {}", e)))?;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
