//! Domain-driven configuration management for devhub migrations
//!
//! This crate provides configuration split by functional domains, with
//! validation, defaults, and environment variable support.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    deployment::{DeploymentConfig, DeploymentKind},
    logging::{LogFormat, LogLevel, LoggingConfig},
    migration::MigrationConfig,
    store::StoreConfig,
    DevhubConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration_option;
