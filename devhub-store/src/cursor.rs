//! Paging cursor with bounded memory

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;

use crate::{
    document::{id_string, Document, ID_FIELD},
    filter::Filter,
    store::DocumentStore,
    StoreError, StoreResult,
};

/// Default number of documents fetched per page
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Streams matching documents in `_id` order, one page at a time.
///
/// Every page is a fresh query for documents after the last `_id` seen, so
/// documents written behind the cursor are not revisited and the memory held
/// is one page.
pub struct Cursor<'a> {
    store: &'a dyn DocumentStore,
    collection: String,
    filter: Filter,
    batch_size: usize,
    last_id: Option<Value>,
    buffer: VecDeque<Document>,
    exhausted: bool,
}

impl<'a> Cursor<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: impl Into<String>, filter: Filter) -> Self {
        Self {
            store,
            collection: collection.into(),
            filter,
            batch_size: DEFAULT_BATCH_SIZE,
            last_id: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next raw document
    pub async fn next(&mut self) -> StoreResult<Option<Document>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        Ok(self.buffer.pop_front())
    }

    /// Next page of raw documents; empty once the cursor is drained
    pub async fn next_batch(&mut self) -> StoreResult<Vec<Document>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        Ok(self.buffer.drain(..).collect())
    }

    /// Next document decoded into `T`, failing on the first malformed record
    pub async fn next_as<T: DeserializeOwned>(&mut self) -> StoreResult<Option<T>> {
        match self.next().await? {
            None => Ok(None),
            Some(doc) => {
                let id = id_string(&doc);
                serde_json::from_value(Value::Object(doc))
                    .map(Some)
                    .map_err(|source| StoreError::Decode {
                        collection: self.collection.clone(),
                        id,
                        source,
                    })
            }
        }
    }

    async fn fill(&mut self) -> StoreResult<()> {
        let page = self
            .store
            .find_batch(&self.collection, &self.filter, self.last_id.as_ref(), self.batch_size)
            .await?;
        if page.len() < self.batch_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.last_id = last.get(ID_FIELD).cloned();
        }
        self.buffer.extend(page);
        Ok(())
    }
}
