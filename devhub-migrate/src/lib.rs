//! Versioned migration engine for devhub document stores
//!
//! Migrations are registered once into a [`MigrationRegistry`] and applied in
//! version order by a [`Runner`], which keeps a single version marker per
//! store. [`transforms`] holds the reusable transform patterns migrations are
//! built from, and [`TenantMigrator`] fans a run out over tenant databases.

pub mod context;
pub mod error;
pub mod gate;
pub mod marker;
pub mod migration;
pub mod registry;
pub mod report;
pub mod runner;
pub mod tenant;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transforms;

// Re-export core types for convenience
pub use context::MigrationContext;
pub use error::{MigrationError, MigrationResult, RegistrationError, TenantError, TransformError};
pub use gate::{DeploymentMode, EnvironmentGate, StaticGate};
pub use marker::{VersionMarker, MARKER_ID, MIGRATION_INFO_COLLECTION};
pub use migration::{Direction, Migration, TransformOutcome, TransformResult};
pub use registry::MigrationRegistry;
pub use report::{RunReport, StepReport};
pub use runner::{MigrationStatus, Runner};
pub use tenant::TenantMigrator;
pub use tokio_util::sync::CancellationToken;
