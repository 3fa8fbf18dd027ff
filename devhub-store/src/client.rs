//! In-memory deployment: a set of named databases

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    fault::FaultInjector,
    memory::InMemoryStore,
    snapshot::ClientSnapshot,
    store::{DocumentStore, StoreClient},
    StoreResult,
};

/// [`StoreClient`] over in-memory databases sharing one fault injector
#[derive(Debug, Clone, Default)]
pub struct InMemoryClient {
    databases: Arc<RwLock<BTreeMap<String, InMemoryStore>>>,
    faults: Arc<FaultInjector>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &Arc<FaultInjector> {
        &self.faults
    }

    /// Concrete handle to a database, created if missing
    pub async fn store(&self, name: &str) -> InMemoryStore {
        if let Some(store) = self.databases.read().await.get(name) {
            return store.clone();
        }
        let mut databases = self.databases.write().await;
        databases
            .entry(name.to_string())
            .or_insert_with(|| InMemoryStore::with_faults(self.faults.clone()))
            .clone()
    }

    /// Rebuild a client from a snapshot
    pub fn from_snapshot(snapshot: ClientSnapshot) -> StoreResult<Self> {
        let faults = Arc::new(FaultInjector::new());
        let mut databases = BTreeMap::new();
        for (name, database) in snapshot.databases {
            let store = InMemoryStore::from_snapshot(database, faults.clone())?;
            databases.insert(name, store);
        }
        Ok(Self {
            databases: Arc::new(RwLock::new(databases)),
            faults,
        })
    }

    /// Serializable copy of every non-empty database
    pub async fn snapshot(&self) -> ClientSnapshot {
        let databases = self.databases.read().await;
        let mut snapshot = ClientSnapshot::default();
        for (name, store) in databases.iter() {
            let database = store.snapshot().await;
            if !database.collections.is_empty() {
                snapshot.databases.insert(name.clone(), database);
            }
        }
        snapshot
    }
}

#[async_trait]
impl StoreClient for InMemoryClient {
    async fn list_databases(&self) -> StoreResult<Vec<String>> {
        let databases = self.databases.read().await;
        let mut names = Vec::new();
        for (name, store) in databases.iter() {
            if !store.is_empty().await {
                names.push(name.clone());
            }
        }
        Ok(names)
    }

    async fn database(&self, name: &str) -> StoreResult<Arc<dyn DocumentStore>> {
        Ok(Arc::new(self.store(name).await))
    }
}
