//! In-memory document engine
//!
//! Reference implementation of [`DocumentStore`] used by tests and by the CLI
//! (through JSON snapshots). Every operation holds the database lock for its
//! whole duration, so single operations are atomic; transactions stage their
//! writes per document and publish them under one write lock at commit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    document::{compare_values, get_path, Document, IdKey, ID_FIELD},
    fault::{FaultInjector, FaultPoint},
    filter::Filter,
    index::IndexModel,
    pipeline::{evaluate, Pipeline, Stage, WhenMatched, WhenNotMatched},
    store::{DocumentStore, StoreTransaction},
    update::{Update, UpdateResult},
    StoreError, StoreResult,
};

/// Serialized form of one collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub indexes: Vec<IndexModel>,
}

/// Serialized form of one database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionSnapshot>,
}

#[derive(Debug, Clone, Default)]
struct CollectionData {
    documents: BTreeMap<IdKey, Document>,
    indexes: Vec<IndexModel>,
    /// Database write sequence number of the last write
    version: u64,
}

fn find_duplicate<'a>(
    index: &IndexModel,
    docs: impl Iterator<Item = &'a Document>,
) -> Option<Vec<Value>> {
    let mut seen = HashSet::new();
    for doc in docs {
        let key = index.key_of(doc);
        if !seen.insert(Value::Array(key.clone()).to_string()) {
            return Some(key);
        }
    }
    None
}

fn duplicate_key(collection: &str, index: &str, key: Vec<Value>) -> StoreError {
    StoreError::DuplicateKey {
        collection: collection.to_string(),
        key: format!("{} {}", index, Value::Array(key)),
    }
}

impl CollectionData {
    fn from_snapshot(collection: &str, snapshot: CollectionSnapshot) -> StoreResult<Self> {
        let mut data = CollectionData {
            indexes: snapshot.indexes,
            ..Default::default()
        };
        for doc in snapshot.documents {
            data.insert(collection, doc)?;
        }
        Ok(data)
    }

    fn snapshot(&self) -> CollectionSnapshot {
        CollectionSnapshot {
            documents: self.documents.values().cloned().collect(),
            indexes: self.indexes.clone(),
        }
    }

    fn first_match(&self, filter: &Filter) -> Option<(&IdKey, &Document)> {
        self.documents.iter().find(|(_, doc)| filter.matches(doc))
    }

    /// Unique indexes must hold with `overrides` replacing or adding documents
    fn check_unique_with(
        &self,
        collection: &str,
        overrides: &BTreeMap<IdKey, Document>,
    ) -> StoreResult<()> {
        if overrides.is_empty() {
            return Ok(());
        }
        for index in self.indexes.iter().filter(|i| i.unique) {
            let docs = self
                .documents
                .iter()
                .filter(|(id, _)| !overrides.contains_key(*id))
                .map(|(_, doc)| doc)
                .chain(overrides.values());
            if let Some(key) = find_duplicate(index, docs) {
                return Err(duplicate_key(collection, &index.name, key));
            }
        }
        Ok(())
    }

    /// Unique indexes must hold once staged writes (`None` = delete) land
    fn check_unique_staged(
        &self,
        collection: &str,
        writes: &BTreeMap<IdKey, Option<Document>>,
    ) -> StoreResult<()> {
        for index in self.indexes.iter().filter(|i| i.unique) {
            let docs = self
                .documents
                .iter()
                .filter(|(id, _)| !writes.contains_key(*id))
                .map(|(_, doc)| doc)
                .chain(writes.values().flatten());
            if let Some(key) = find_duplicate(index, docs) {
                return Err(duplicate_key(collection, &index.name, key));
            }
        }
        Ok(())
    }

    fn insert(&mut self, collection: &str, mut doc: Document) -> StoreResult<Value> {
        let id = doc
            .entry(ID_FIELD)
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()))
            .clone();
        let key = IdKey(id.clone());
        if self.documents.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                key: format!("{} {}", ID_FIELD, id),
            });
        }
        let mut overrides = BTreeMap::new();
        overrides.insert(key, doc);
        self.check_unique_with(collection, &overrides)?;
        self.documents.extend(overrides);
        Ok(id)
    }

    fn update_many(
        &mut self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult> {
        if update.set.iter().any(|(field, _)| field == ID_FIELD)
            || update.unset.iter().any(|field| field == ID_FIELD)
        {
            return Err(StoreError::QueryFailed(format!(
                "{} is immutable in {}",
                ID_FIELD, collection
            )));
        }
        let mut matched = 0;
        let mut changed = BTreeMap::new();
        for (id, doc) in self.documents.iter().filter(|(_, doc)| filter.matches(doc)) {
            matched += 1;
            let mut next = doc.clone();
            if update.apply(&mut next) {
                changed.insert(id.clone(), next);
            }
        }
        self.check_unique_with(collection, &changed)?;
        let modified = changed.len() as u64;
        self.documents.extend(changed);
        Ok(UpdateResult { matched, modified })
    }

    fn replace_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        mut doc: Document,
        upsert: bool,
    ) -> StoreResult<UpdateResult> {
        let target = self.first_match(filter).map(|(id, _)| id.clone());
        match target {
            Some(id) => {
                if let Some(new_id) = doc.get(ID_FIELD) {
                    if compare_values(new_id, &id.0) != Ordering::Equal {
                        return Err(StoreError::QueryFailed(format!(
                            "replacement in {} cannot change {}",
                            collection, ID_FIELD
                        )));
                    }
                }
                doc.insert(ID_FIELD.to_string(), id.0.clone());
                let modified = self.documents.get(&id) != Some(&doc);
                let mut overrides = BTreeMap::new();
                overrides.insert(id, doc);
                self.check_unique_with(collection, &overrides)?;
                self.documents.extend(overrides);
                Ok(UpdateResult {
                    matched: 1,
                    modified: u64::from(modified),
                })
            }
            None if upsert => {
                if !doc.contains_key(ID_FIELD) {
                    if let Filter::Eq(field, value) = filter {
                        if field == ID_FIELD {
                            doc.insert(ID_FIELD.to_string(), value.clone());
                        }
                    }
                }
                self.insert(collection, doc)?;
                Ok(UpdateResult {
                    matched: 0,
                    modified: 1,
                })
            }
            None => Ok(UpdateResult::default()),
        }
    }

    fn delete_many(&mut self, filter: &Filter) -> u64 {
        let before = self.documents.len();
        self.documents.retain(|_, doc| !filter.matches(doc));
        (before - self.documents.len()) as u64
    }

    fn create_index(&mut self, collection: &str, index: IndexModel) -> StoreResult<()> {
        if let Some(existing) = self.indexes.iter().find(|i| i.name == index.name) {
            if existing.same_definition(&index) {
                return Ok(());
            }
            return Err(StoreError::IndexConflict {
                collection: collection.to_string(),
                name: index.name,
            });
        }
        if index.unique {
            if let Some(key) = find_duplicate(&index, self.documents.values()) {
                return Err(duplicate_key(collection, &index.name, key));
            }
        }
        self.indexes.push(index);
        Ok(())
    }

    fn drop_index(&mut self, collection: &str, name: &str) -> StoreResult<()> {
        let before = self.indexes.len();
        self.indexes.retain(|i| i.name != name);
        if self.indexes.len() == before {
            return Err(StoreError::IndexNotFound {
                collection: collection.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn find_target(&self, on: &str, key: &Value) -> Option<IdKey> {
        if on == ID_FIELD {
            let id = IdKey(key.clone());
            return self.documents.contains_key(&id).then_some(id);
        }
        self.documents
            .iter()
            .find(|(_, doc)| {
                get_path(doc, on).is_some_and(|v| compare_values(v, key) == Ordering::Equal)
            })
            .map(|(id, _)| id.clone())
    }

    /// Merge pipeline output into this collection
    fn merge(
        &mut self,
        collection: &str,
        input: Vec<Document>,
        on: &str,
        when_matched: WhenMatched,
        when_not_matched: WhenNotMatched,
    ) -> StoreResult<()> {
        for incoming in input {
            let key = get_path(&incoming, on).cloned().unwrap_or(Value::Null);
            match self.find_target(on, &key) {
                Some(id) => {
                    let next = match when_matched {
                        WhenMatched::KeepExisting => continue,
                        WhenMatched::Merge => {
                            let mut base = self.documents.get(&id).cloned().unwrap_or_default();
                            for (field, value) in incoming {
                                if field != ID_FIELD {
                                    base.insert(field, value);
                                }
                            }
                            base
                        }
                        WhenMatched::Replace => {
                            let mut next = incoming;
                            next.insert(ID_FIELD.to_string(), id.0.clone());
                            next
                        }
                    };
                    let mut overrides = BTreeMap::new();
                    overrides.insert(id, next);
                    self.check_unique_with(collection, &overrides)?;
                    self.documents.extend(overrides);
                }
                None => {
                    if when_not_matched == WhenNotMatched::Insert {
                        self.insert(collection, incoming)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DatabaseState {
    collections: BTreeMap<String, CollectionData>,
    write_seq: u64,
}

impl DatabaseState {
    fn version_of(&self, collection: &str) -> u64 {
        self.collections.get(collection).map_or(0, |c| c.version)
    }

    fn touch(&mut self, collection: &str) {
        self.write_seq += 1;
        let seq = self.write_seq;
        if let Some(data) = self.collections.get_mut(collection) {
            data.version = seq;
        }
    }

    /// Run a write against one collection.
    ///
    /// `op` must leave the collection unchanged when it fails. A collection
    /// created for a failed write is removed again; with `create` unset a
    /// missing collection yields `Ok(None)` without calling `op`.
    fn apply<T>(
        &mut self,
        collection: &str,
        create: bool,
        op: impl FnOnce(&mut CollectionData) -> StoreResult<T>,
    ) -> StoreResult<Option<T>> {
        let created = !self.collections.contains_key(collection);
        if created && !create {
            return Ok(None);
        }
        let data = self.collections.entry(collection.to_string()).or_default();
        match op(data) {
            Ok(value) => {
                self.touch(collection);
                Ok(Some(value))
            }
            Err(err) => {
                if created {
                    self.collections.remove(collection);
                }
                Err(err)
            }
        }
    }

    fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|c| c.documents.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// In-memory database handle; clones share the same data
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<DatabaseState>>,
    faults: Arc<FaultInjector>,
}

impl InMemoryStore {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty database sharing a fault injector
    pub fn with_faults(faults: Arc<FaultInjector>) -> Self {
        Self {
            state: Arc::default(),
            faults,
        }
    }

    /// Rebuild a database from its snapshot, validating ids and unique indexes
    pub fn from_snapshot(snapshot: DatabaseSnapshot, faults: Arc<FaultInjector>) -> StoreResult<Self> {
        let mut state = DatabaseState::default();
        for (name, collection) in snapshot.collections {
            let data = CollectionData::from_snapshot(&name, collection)?;
            state.collections.insert(name, data);
        }
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            faults,
        })
    }

    /// Serializable copy of the current contents
    pub async fn snapshot(&self) -> DatabaseSnapshot {
        let state = self.state.read().await;
        DatabaseSnapshot {
            collections: state
                .collections
                .iter()
                .map(|(name, data)| (name.clone(), data.snapshot()))
                .collect(),
        }
    }

    /// Fault injector consulted by every operation
    pub fn faults(&self) -> &Arc<FaultInjector> {
        &self.faults
    }

    /// Whether the database holds no collections
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.collections.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        Ok(self.state.read().await.collections.keys().cloned().collect())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        self.faults.check(FaultPoint::Find, collection)?;
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|c| c.first_match(filter))
            .map(|(_, doc)| doc.clone()))
    }

    async fn find_batch(
        &self,
        collection: &str,
        filter: &Filter,
        after: Option<&Value>,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        self.faults.check(FaultPoint::Find, collection)?;
        let state = self.state.read().await;
        let Some(data) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let lower = match after {
            Some(id) => Bound::Excluded(IdKey(id.clone())),
            None => Bound::Unbounded,
        };
        Ok(data
            .documents
            .range((lower, Bound::Unbounded))
            .map(|(_, doc)| doc)
            .filter(|doc| filter.matches(doc))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.faults.check(FaultPoint::Find, collection)?;
        let state = self.state.read().await;
        Ok(state.collections.get(collection).map_or(0, |c| {
            c.documents.values().filter(|doc| filter.matches(doc)).count() as u64
        }))
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> StoreResult<Value> {
        self.faults.check(FaultPoint::Insert, collection)?;
        let mut state = self.state.write().await;
        let id = state.apply(collection, true, |data| data.insert(collection, doc))?;
        id.ok_or_else(|| StoreError::NamespaceNotFound(collection.to_string()))
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> StoreResult<Vec<Value>> {
        self.faults.check(FaultPoint::Insert, collection)?;
        let mut state = self.state.write().await;
        let ids = state.apply(collection, true, |data| {
            let mut next = data.clone();
            let ids = docs
                .into_iter()
                .map(|doc| next.insert(collection, doc))
                .collect::<StoreResult<Vec<_>>>()?;
            *data = next;
            Ok(ids)
        })?;
        Ok(ids.unwrap_or_default())
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult> {
        self.faults.check(FaultPoint::Update, collection)?;
        let mut state = self.state.write().await;
        let result = state.apply(collection, false, |data| {
            data.update_many(collection, filter, update)
        })?;
        Ok(result.unwrap_or_default())
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
        upsert: bool,
    ) -> StoreResult<UpdateResult> {
        self.faults.check(FaultPoint::Replace, collection)?;
        let mut state = self.state.write().await;
        let result = state.apply(collection, upsert, |data| {
            data.replace_one(collection, filter, doc, upsert)
        })?;
        Ok(result.unwrap_or_default())
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.faults.check(FaultPoint::Delete, collection)?;
        let mut state = self.state.write().await;
        let deleted = state.apply(collection, false, |data| Ok(data.delete_many(filter)))?;
        Ok(deleted.unwrap_or(0))
    }

    async fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        self.faults.check(FaultPoint::Delete, collection)?;
        let mut state = self.state.write().await;
        state.collections.remove(collection);
        state.write_seq += 1;
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexModel>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default())
    }

    async fn create_index(&self, collection: &str, index: IndexModel) -> StoreResult<()> {
        self.faults.check(FaultPoint::CreateIndex, collection)?;
        let mut state = self.state.write().await;
        state.apply(collection, true, |data| data.create_index(collection, index))?;
        Ok(())
    }

    async fn drop_index(&self, collection: &str, name: &str) -> StoreResult<()> {
        self.faults.check(FaultPoint::DropIndex, collection)?;
        let mut state = self.state.write().await;
        state
            .apply(collection, false, |data| data.drop_index(collection, name))?
            .ok_or_else(|| StoreError::NamespaceNotFound(collection.to_string()))
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> StoreResult<Vec<Document>> {
        self.faults.check(FaultPoint::Aggregate, collection)?;
        let (stages, merge) = pipeline.split_merge()?;
        match merge {
            None => {
                let state = self.state.read().await;
                evaluate(state.documents(collection), stages)
            }
            Some(Stage::Merge {
                into,
                on,
                when_matched,
                when_not_matched,
            }) => {
                // Source read and merge happen under one write lock.
                let mut state = self.state.write().await;
                let output = evaluate(state.documents(collection), stages)?;
                let create = *when_not_matched == WhenNotMatched::Insert;
                state.apply(into, create, |data| {
                    let mut next = data.clone();
                    next.merge(into, output, on, *when_matched, *when_not_matched)?;
                    *data = next;
                    Ok(())
                })?;
                Ok(Vec::new())
            }
            Some(_) => Err(StoreError::QueryFailed(
                "unexpected trailing pipeline stage".to_string(),
            )),
        }
    }

    async fn begin_transaction(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            faults: self.faults.clone(),
            overlays: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }))
    }
}

/// `_id` a filter pins down, if it is a plain primary key lookup
fn id_of(filter: &Filter) -> Option<IdKey> {
    match filter {
        Filter::Eq(field, value) if field == ID_FIELD => Some(IdKey(value.clone())),
        _ => None,
    }
}

/// Writes a transaction staged against one collection
#[derive(Debug, Default)]
struct Overlay {
    /// Collection version when the transaction first touched it
    base_version: u64,
    /// Replaced or inserted documents; `None` marks a delete
    writes: BTreeMap<IdKey, Option<Document>>,
}

impl Overlay {
    fn get<'a>(&'a self, base: Option<&'a CollectionData>, id: &IdKey) -> Option<&'a Document> {
        match self.writes.get(id) {
            Some(staged) => staged.as_ref(),
            None => base.and_then(|data| data.documents.get(id)),
        }
    }

    /// Documents matching `filter` as the transaction sees them
    fn matching<'a>(
        &'a self,
        base: Option<&'a CollectionData>,
        filter: &Filter,
    ) -> Vec<(&'a IdKey, &'a Document)> {
        if let Some(id) = id_of(filter) {
            let key = base
                .and_then(|data| data.documents.get_key_value(&id))
                .map(|(key, _)| key)
                .or_else(|| self.writes.get_key_value(&id).map(|(key, _)| key));
            return key
                .and_then(|key| {
                    self.get(base, key)
                        .filter(|doc| filter.matches(doc))
                        .map(|doc| (key, doc))
                })
                .into_iter()
                .collect();
        }
        let committed = base
            .into_iter()
            .flat_map(|data| data.documents.iter())
            .filter(|(id, _)| !self.writes.contains_key(*id));
        let staged = self
            .writes
            .iter()
            .filter_map(|(id, doc)| doc.as_ref().map(|doc| (id, doc)));
        committed
            .chain(staged)
            .filter(|(_, doc)| filter.matches(doc))
            .collect()
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// Writes are staged per document and only read through to the shared
/// collections, so a transaction holds no more than what it wrote. The
/// version of every touched collection is recorded on first use; commit fails
/// if any of them was written by someone else since, and re-checks unique
/// indexes before publishing.
pub struct InMemoryTransaction {
    state: Arc<RwLock<DatabaseState>>,
    faults: Arc<FaultInjector>,
    overlays: BTreeMap<String, Overlay>,
    dirty: BTreeSet<String>,
}

impl InMemoryTransaction {
    async fn track(&mut self, collection: &str) {
        if !self.overlays.contains_key(collection) {
            let base_version = self.state.read().await.version_of(collection);
            self.overlays.insert(
                collection.to_string(),
                Overlay {
                    base_version,
                    writes: BTreeMap::new(),
                },
            );
        }
    }

    /// Stage `changes` and mark the collection dirty when there are any
    fn stage(&mut self, collection: &str, changes: Vec<(IdKey, Option<Document>)>) {
        if changes.is_empty() {
            return;
        }
        if let Some(overlay) = self.overlays.get_mut(collection) {
            overlay.writes.extend(changes);
            self.dirty.insert(collection.to_string());
        }
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_one(&mut self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        self.faults.check(FaultPoint::Find, collection)?;
        self.track(collection).await;
        let state = self.state.read().await;
        let Some(overlay) = self.overlays.get(collection) else {
            return Ok(None);
        };
        Ok(overlay
            .matching(state.collections.get(collection), filter)
            .into_iter()
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, doc)| doc.clone()))
    }

    async fn insert_one(&mut self, collection: &str, mut doc: Document) -> StoreResult<Value> {
        self.faults.check(FaultPoint::Insert, collection)?;
        self.track(collection).await;
        let id = doc
            .entry(ID_FIELD)
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()))
            .clone();
        let key = IdKey(id.clone());
        let exists = {
            let state = self.state.read().await;
            self.overlays
                .get(collection)
                .and_then(|overlay| overlay.get(state.collections.get(collection), &key))
                .is_some()
        };
        if exists {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                key: format!("{} {}", ID_FIELD, id),
            });
        }
        self.stage(collection, vec![(key, Some(doc))]);
        Ok(id)
    }

    async fn update_many(
        &mut self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateResult> {
        self.faults.check(FaultPoint::Update, collection)?;
        if update.set.iter().any(|(field, _)| field == ID_FIELD)
            || update.unset.iter().any(|field| field == ID_FIELD)
        {
            return Err(StoreError::QueryFailed(format!(
                "{} is immutable in {}",
                ID_FIELD, collection
            )));
        }
        self.track(collection).await;
        let (matched, changes) = {
            let state = self.state.read().await;
            let Some(overlay) = self.overlays.get(collection) else {
                return Ok(UpdateResult::default());
            };
            let matches = overlay.matching(state.collections.get(collection), filter);
            let matched = matches.len() as u64;
            let changes: Vec<(IdKey, Option<Document>)> = matches
                .into_iter()
                .filter_map(|(id, doc)| {
                    let mut next = doc.clone();
                    update.apply(&mut next).then(|| (id.clone(), Some(next)))
                })
                .collect();
            (matched, changes)
        };
        let modified = changes.len() as u64;
        self.stage(collection, changes);
        Ok(UpdateResult { matched, modified })
    }

    async fn delete_many(&mut self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.faults.check(FaultPoint::Delete, collection)?;
        self.track(collection).await;
        let changes: Vec<(IdKey, Option<Document>)> = {
            let state = self.state.read().await;
            let Some(overlay) = self.overlays.get(collection) else {
                return Ok(0);
            };
            overlay
                .matching(state.collections.get(collection), filter)
                .into_iter()
                .map(|(id, _)| (id.clone(), None))
                .collect()
        };
        let deleted = changes.len() as u64;
        self.stage(collection, changes);
        Ok(deleted)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        let label = this
            .dirty
            .iter()
            .next()
            .cloned()
            .unwrap_or_else(|| "transaction".to_string());
        this.faults.check(FaultPoint::Commit, &label)?;

        let mut state = this.state.write().await;
        for (collection, overlay) in &this.overlays {
            if state.version_of(collection) != overlay.base_version {
                return Err(StoreError::TransactionFailed(format!(
                    "write conflict on {}",
                    collection
                )));
            }
        }
        for collection in &this.dirty {
            if let (Some(data), Some(overlay)) =
                (state.collections.get(collection), this.overlays.get(collection))
            {
                data.check_unique_staged(collection, &overlay.writes)?;
            }
        }
        for collection in &this.dirty {
            let Some(overlay) = this.overlays.get(collection) else {
                continue;
            };
            let inserts = overlay.writes.values().any(Option::is_some);
            if !inserts && !state.collections.contains_key(collection) {
                continue;
            }
            let data = state.collections.entry(collection.clone()).or_default();
            for (id, staged) in &overlay.writes {
                match staged {
                    Some(doc) => {
                        data.documents.insert(id.clone(), doc.clone());
                    }
                    None => {
                        data.documents.remove(id);
                    }
                }
            }
            state.touch(collection);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        tracing::debug!(collections = self.dirty.len(), "rolling back in-memory transaction");
        Ok(())
    }
}
