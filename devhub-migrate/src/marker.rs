//! Persistent version marker

use chrono::{DateTime, Utc};
use devhub_store::{document::from_value, DocumentStore, Filter, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Collection holding the marker
pub const MIGRATION_INFO_COLLECTION: &str = "migration_info";
/// `_id` of the marker document
pub const MARKER_ID: &str = "version";

/// Stored marker document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMarker {
    pub current_version: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn marker_filter() -> Filter {
    Filter::by_id(MARKER_ID)
}

/// Full marker document, if one was ever written
pub async fn read_marker(store: &dyn DocumentStore) -> StoreResult<Option<VersionMarker>> {
    let Some(doc) = store.find_one(MIGRATION_INFO_COLLECTION, &marker_filter()).await? else {
        return Ok(None);
    };
    serde_json::from_value(serde_json::Value::Object(doc))
        .map(Some)
        .map_err(|source| StoreError::Decode {
            collection: MIGRATION_INFO_COLLECTION.to_string(),
            id: MARKER_ID.to_string(),
            source,
        })
}

/// Current version; 0 when no marker exists
pub async fn current_version(store: &dyn DocumentStore) -> StoreResult<i64> {
    Ok(read_marker(store)
        .await?
        .map_or(0, |marker| marker.current_version))
}

/// Record `version` as the current one with a single-document upsert
pub async fn write_version(
    store: &dyn DocumentStore,
    version: i64,
    description: &str,
) -> StoreResult<()> {
    let doc = from_value(json!({
        "_id": MARKER_ID,
        "current_version": version,
        "description": description,
        "updated_at": Utc::now(),
    }))
    .ok_or_else(|| StoreError::QueryFailed("marker document is not an object".to_string()))?;
    store
        .replace_one(MIGRATION_INFO_COLLECTION, &marker_filter(), doc, true)
        .await?;
    Ok(())
}
