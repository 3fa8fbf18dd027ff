//! Migration error types

use devhub_store::StoreError;
use thiserror::Error;

use crate::{migration::Direction, report::RunReport};

/// Result type for migration runs
pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

/// Registry construction errors; raised before any data is touched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("migration version must be positive, got {version} ({description})")]
    NonPositiveVersion { version: i64, description: String },

    #[error("migration version {version} registered twice ({existing} / {duplicate})")]
    DuplicateVersion {
        version: i64,
        existing: String,
        duplicate: String,
    },
}

/// Failure inside a single transform
#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A document could not be decoded into the shape a transform expects
    #[error("cannot decode document {id} in {collection}: {source}")]
    Decode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid transform: {0}")]
    Invalid(String),
}

impl TransformError {
    /// Store decode failures surface as transform decode failures
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Decode {
                collection,
                id,
                source,
            } => TransformError::Decode {
                collection,
                id,
                source,
            },
            other => TransformError::Store(other),
        }
    }
}

/// Failure of a migration run
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid migration set: {0}")]
    Registration(#[from] RegistrationError),

    #[error("migration {version} {direction} failed (database left at version {left_at}): {source}")]
    Transform {
        version: i64,
        direction: Direction,
        left_at: i64,
        #[source]
        source: TransformError,
    },

    /// `left_at` is unknown when the marker could not be read at all
    #[error("version marker access failed: {source}")]
    Marker {
        left_at: Option<i64>,
        #[source]
        source: StoreError,
    },

    #[error("migration {version} cancelled (database left at version {left_at})")]
    Cancelled { version: i64, left_at: i64 },

    #[error("migration {version} exceeded its deadline (database left at version {left_at})")]
    DeadlineExceeded { version: i64, left_at: i64 },
}

impl MigrationError {
    /// Version the database was left at, if the run got far enough to read it
    pub fn database_version(&self) -> Option<i64> {
        match self {
            MigrationError::Registration(_) => None,
            MigrationError::Marker { left_at, .. } => *left_at,
            MigrationError::Transform { left_at, .. }
            | MigrationError::Cancelled { left_at, .. }
            | MigrationError::DeadlineExceeded { left_at, .. } => Some(*left_at),
        }
    }

    /// Short machine-readable code for log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            MigrationError::Registration(_) => "REGISTRATION",
            MigrationError::Transform { .. } => "TRANSFORM_FAILED",
            MigrationError::Marker { .. } => "MARKER_FAILED",
            MigrationError::Cancelled { .. } => "CANCELLED",
            MigrationError::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
        }
    }
}

/// Failure of a fan-out over tenant databases
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("cannot list tenant databases: {0}")]
    List(#[source] StoreError),

    #[error("cannot open database of tenant {tenant}: {source}")]
    Open {
        tenant: String,
        #[source]
        source: StoreError,
    },

    /// `completed` holds the reports of tenants migrated before the failure
    #[error("tenant {tenant}: {source}")]
    Migration {
        tenant: String,
        completed: Vec<RunReport>,
        #[source]
        source: MigrationError,
    },
}

impl TenantError {
    pub fn tenant(&self) -> Option<&str> {
        match self {
            TenantError::List(_) => None,
            TenantError::Open { tenant, .. } | TenantError::Migration { tenant, .. } => Some(tenant),
        }
    }
}
