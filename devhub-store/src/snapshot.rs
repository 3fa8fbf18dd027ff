//! JSON snapshot persistence for in-memory deployments

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{client::InMemoryClient, memory::DatabaseSnapshot, StoreResult};

/// Serialized form of a whole deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseSnapshot>,
}

/// Load a deployment from `path`; a missing file is an empty deployment
pub async fn load_client(path: &Path) -> StoreResult<InMemoryClient> {
    if !tokio::fs::try_exists(path).await? {
        tracing::info!(path = %path.display(), "no data file, starting empty");
        return Ok(InMemoryClient::new());
    }
    let raw = tokio::fs::read_to_string(path).await?;
    let snapshot: ClientSnapshot = serde_json::from_str(&raw)?;
    tracing::debug!(
        path = %path.display(),
        databases = snapshot.databases.len(),
        "loaded data file"
    );
    InMemoryClient::from_snapshot(snapshot)
}

/// Write a deployment to `path` through a temporary sibling and a rename
pub async fn save_client(client: &InMemoryClient, path: &Path) -> StoreResult<()> {
    let snapshot = client.snapshot().await;
    let raw = serde_json::to_string_pretty(&snapshot)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, raw).await?;
    tokio::fs::rename(&tmp, path).await?;
    tracing::debug!(path = %path.display(), "saved data file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::from_value;
    use crate::filter::Filter;
    use crate::index::IndexModel;
    use crate::store::StoreClient;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let client = load_client(&dir.path().join("data.json")).await.unwrap();
        assert!(client.list_databases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let client = InMemoryClient::new();
        let db = client.database("devhub").await.unwrap();
        db.insert_one("users", from_value(json!({"_id": "u1", "email": "a@x.io"})).unwrap())
            .await
            .unwrap();
        db.create_index("users", IndexModel::new("email").asc("email").unique())
            .await
            .unwrap();
        save_client(&client, &path).await.unwrap();
        assert!(!dir.path().join("data.json.tmp").exists());

        let reloaded = load_client(&path).await.unwrap();
        let db = reloaded.database("devhub").await.unwrap();
        assert_eq!(db.count("users", &Filter::All).await.unwrap(), 1);
        assert_eq!(db.list_indexes("users").await.unwrap().len(), 1);
        assert_eq!(reloaded.snapshot().await, client.snapshot().await);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        assert!(load_client(&path).await.is_err());
    }
}
