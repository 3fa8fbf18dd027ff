//! Document store abstractions

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    document::Document, filter::Filter, index::IndexModel, pipeline::Pipeline,
    update::{Update, UpdateResult}, StoreResult,
};

/// Handle to one logical database (object-safe)
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of the collections holding data or indexes
    async fn list_collections(&self) -> StoreResult<Vec<String>>;

    /// First document matching the filter, in `_id` order
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// Up to `limit` matching documents with `_id` strictly greater than `after`,
    /// ascending by `_id`. Used for paging cursors.
    async fn find_batch(
        &self,
        collection: &str,
        filter: &Filter,
        after: Option<&Value>,
        limit: usize,
    ) -> StoreResult<Vec<Document>>;

    /// Number of matching documents
    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Insert a document, assigning an `_id` if missing
    async fn insert_one(&self, collection: &str, doc: Document) -> StoreResult<Value>;

    /// Insert several documents atomically
    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> StoreResult<Vec<Value>>;

    /// Apply an update to every matching document
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult>;

    /// Replace the first matching document, inserting when `upsert` is set
    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
        upsert: bool,
    ) -> StoreResult<UpdateResult>;

    /// Delete every matching document, returning the number deleted
    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Drop a collection and its indexes
    async fn drop_collection(&self, collection: &str) -> StoreResult<()>;

    /// Indexes defined on a collection
    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexModel>>;

    /// Create an index. Identical definitions are a no-op; a name clash with a
    /// different definition is `IndexConflict`.
    async fn create_index(&self, collection: &str, index: IndexModel) -> StoreResult<()>;

    /// Drop an index by name; `IndexNotFound` if it does not exist
    async fn drop_index(&self, collection: &str, name: &str) -> StoreResult<()>;

    /// Run a pipeline. A trailing merge stage writes its input into the target
    /// collection and the call returns no documents.
    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> StoreResult<Vec<Document>>;

    /// Begin a multi-statement transaction
    async fn begin_transaction(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// Multi-statement transaction (object-safe version)
///
/// Writes stay invisible outside the transaction until `commit`; dropping an
/// uncommitted transaction discards them.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    async fn find_one(&mut self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    async fn insert_one(&mut self, collection: &str, doc: Document) -> StoreResult<Value>;

    async fn update_many(
        &mut self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult>;

    async fn delete_many(&mut self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Access to the logical databases of a deployment
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Names of all databases
    async fn list_databases(&self) -> StoreResult<Vec<String>>;

    /// Handle to a database, created lazily on first write
    async fn database(&self, name: &str) -> StoreResult<Arc<dyn DocumentStore>>;
}

/// Database name for a tenant
pub fn tenant_database(prefix: &str, tenant_id: &str) -> String {
    format!("{}{}", prefix, tenant_id)
}

/// Tenant id encoded in a database name, if it carries the prefix
pub fn tenant_from_database<'a>(prefix: &str, database: &'a str) -> Option<&'a str> {
    database
        .strip_prefix(prefix)
        .filter(|tenant| !tenant.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_database_names() {
        let name = tenant_database("devhub-", "5f0c1a");
        assert_eq!(name, "devhub-5f0c1a");
        assert_eq!(tenant_from_database("devhub-", &name), Some("5f0c1a"));
        assert_eq!(tenant_from_database("devhub-", "devhub"), None);
        assert_eq!(tenant_from_database("devhub-", "devhub-"), None);
    }
}
