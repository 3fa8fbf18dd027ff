//! Document store abstraction for devhub
//!
//! This crate provides the object-safe store handle the migration engine
//! runs against, plus an in-memory engine (with JSON snapshot persistence
//! and fault injection) that implements it.

pub mod client;
pub mod cursor;
pub mod document;
pub mod error;
pub mod fault;
pub mod filter;
pub mod index;
pub mod memory;
pub mod pipeline;
pub mod snapshot;
pub mod store;
pub mod update;

// Re-export core types for convenience
pub use client::InMemoryClient;
pub use cursor::{Cursor, DEFAULT_BATCH_SIZE};
pub use document::{Document, IdKey, ID_FIELD};
pub use error::{StoreError, StoreResult};
pub use fault::{FaultInjector, FaultPoint};
pub use filter::Filter;
pub use index::{IndexModel, IndexOrder};
pub use memory::{DatabaseSnapshot, InMemoryStore, InMemoryTransaction};
pub use pipeline::{Expr, Pipeline, Stage, WhenMatched, WhenNotMatched};
pub use snapshot::{load_client, save_client, ClientSnapshot};
pub use store::{tenant_database, tenant_from_database, DocumentStore, StoreClient, StoreTransaction};
pub use update::{Update, UpdateResult};
