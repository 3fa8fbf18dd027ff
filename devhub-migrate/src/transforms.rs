//! Reusable transform patterns
//!
//! Building blocks for migration steps. Field, index and reconciliation
//! helpers are idempotent so an interrupted step can simply be run again; the
//! transactional swap relies on its filter excluding documents it already
//! rewrote.

use devhub_store::{
    document::id_string, Cursor, Document, DocumentStore, Filter, IndexModel, Pipeline, Stage,
    Update, ID_FIELD,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    context::MigrationContext,
    error::TransformError,
    gate::EnvironmentGate,
    migration::{TransformOutcome, TransformResult},
};

/// Set `field` to `default` on every document that lacks it.
///
/// Returns the number of documents written.
pub async fn add_field(
    store: &dyn DocumentStore,
    collection: &str,
    field: &str,
    default: impl Into<Value>,
) -> TransformResult<u64> {
    let result = store
        .update_many(collection, &Filter::missing(field), &Update::new().set(field, default))
        .await?;
    debug!(collection, field, modified = result.modified, "added field");
    Ok(result.modified)
}

/// Remove `field` from every document that has it
pub async fn remove_field(
    store: &dyn DocumentStore,
    collection: &str,
    field: &str,
) -> TransformResult<u64> {
    let result = store
        .update_many(collection, &Filter::exists(field), &Update::new().unset(field))
        .await?;
    debug!(collection, field, modified = result.modified, "removed field");
    Ok(result.modified)
}

/// What an index helper did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Created,
    /// An identical index was already there
    AlreadyPresent,
    /// An index with the same name but other keys was replaced
    Recreated,
    Dropped,
    /// Nothing to drop
    Absent,
}

/// Make sure `model` exists on `collection`
pub async fn ensure_index(
    store: &dyn DocumentStore,
    collection: &str,
    model: IndexModel,
) -> TransformResult<IndexAction> {
    let existing = store.list_indexes(collection).await?;
    let action = match existing.iter().find(|index| index.name == model.name) {
        Some(index) if index.same_definition(&model) => IndexAction::AlreadyPresent,
        Some(_) => {
            store.drop_index(collection, &model.name).await?;
            store.create_index(collection, model.clone()).await?;
            IndexAction::Recreated
        }
        None => {
            store.create_index(collection, model.clone()).await?;
            IndexAction::Created
        }
    };
    debug!(collection, index = %model.name, ?action, "ensured index");
    Ok(action)
}

/// Drop an index by name; a missing index or collection is fine
pub async fn drop_index_if_exists(
    store: &dyn DocumentStore,
    collection: &str,
    name: &str,
) -> TransformResult<IndexAction> {
    match store.drop_index(collection, name).await {
        Ok(()) => Ok(IndexAction::Dropped),
        Err(err) if err.is_not_found() => {
            debug!(collection, index = name, "index already absent");
            Ok(IndexAction::Absent)
        }
        Err(err) => Err(err.into()),
    }
}

/// Recompute fields of `collection` in place.
///
/// `stages` run over the collection and their output is merged back by `_id`;
/// documents the stages drop are left untouched.
pub async fn aggregate_replace(
    store: &dyn DocumentStore,
    collection: &str,
    stages: Vec<Stage>,
) -> TransformResult<()> {
    if stages.iter().any(|s| matches!(s, Stage::Merge { .. })) {
        return Err(TransformError::Invalid(
            "aggregate_replace adds its own merge stage".to_string(),
        ));
    }
    let pipeline = Pipeline::from(stages).stage(Stage::merge_into(collection));
    store.aggregate(collection, &pipeline).await?;
    debug!(collection, "replaced aggregated fields");
    Ok(())
}

/// Denormalized child count kept on parent documents
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileSpec {
    pub parent: String,
    pub child: String,
    /// Field of the child holding the parent's `_id`
    pub foreign_key: String,
    /// Field of the parent receiving the count
    pub count_field: String,
    /// Which children count
    pub child_filter: Filter,
}

impl ReconcileSpec {
    pub fn new(
        parent: impl Into<String>,
        child: impl Into<String>,
        foreign_key: impl Into<String>,
        count_field: impl Into<String>,
    ) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            foreign_key: foreign_key.into(),
            count_field: count_field.into(),
            child_filter: Filter::All,
        }
    }

    pub fn with_child_filter(mut self, filter: Filter) -> Self {
        self.child_filter = filter;
        self
    }
}

/// Two-phase count reconciliation.
///
/// Phase one stamps 0 on every parent so parents without children carry an
/// explicit zero. Phase two groups matching children by foreign key and merges
/// the counts into existing parents; children of unknown parents are ignored.
/// Returns the number of parents.
pub async fn reconcile_counts(
    store: &dyn DocumentStore,
    spec: &ReconcileSpec,
) -> TransformResult<u64> {
    let reset = store
        .update_many(&spec.parent, &Filter::All, &Update::new().set(&spec.count_field, 0))
        .await?;

    let pipeline = Pipeline::new()
        .stage(Stage::Match(spec.child_filter.clone()))
        .stage(Stage::group_count(&spec.foreign_key, &spec.count_field))
        .stage(Stage::merge_into(&spec.parent));
    store.aggregate(&spec.child, &pipeline).await?;

    info!(
        parent = %spec.parent,
        child = %spec.child,
        count_field = %spec.count_field,
        parents = reset.matched,
        "reconciled counts"
    );
    Ok(reset.matched)
}

/// Remove the count field written by [`reconcile_counts`]
pub async fn unreconcile_counts(
    store: &dyn DocumentStore,
    spec: &ReconcileSpec,
) -> TransformResult<u64> {
    remove_field(store, &spec.parent, &spec.count_field).await
}

/// How the swap treats a document the rewrite cannot decode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Abort the step
    #[default]
    FailFast,
    /// Leave the document as it is, log it and continue
    SkipAndLog,
}

/// Input of [`swap_in_transaction`]
#[derive(Debug, Clone, PartialEq)]
pub struct SwapSpec {
    pub collection: String,
    /// Documents still to rewrite; must not match rewritten ones
    pub filter: Filter,
    pub decode_policy: DecodePolicy,
}

impl SwapSpec {
    pub fn new(collection: impl Into<String>, filter: Filter) -> Self {
        Self {
            collection: collection.into(),
            filter,
            decode_policy: DecodePolicy::default(),
        }
    }

    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }
}

/// Counters reported by [`swap_in_transaction`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapStats {
    pub swapped: u64,
    pub skipped: u64,
    pub batches: u64,
}

/// Replace documents page by page, one transaction per page.
///
/// Each matching document is decoded into `T` and handed to `rewrite`, whose
/// result replaces the original (delete then insert) inside the page's
/// transaction. A failed page leaves every document of that page untouched;
/// committed pages stay committed, and a rerun picks up the remainder through
/// `spec.filter`.
pub async fn swap_in_transaction<T, F>(
    ctx: &MigrationContext,
    store: &dyn DocumentStore,
    spec: &SwapSpec,
    rewrite: F,
) -> TransformResult<SwapStats>
where
    T: DeserializeOwned + Send,
    F: Fn(T) -> TransformResult<Document> + Send + Sync,
{
    let collection = spec.collection.as_str();
    let mut stats = SwapStats::default();
    let mut cursor =
        Cursor::new(store, collection, spec.filter.clone()).with_batch_size(ctx.batch_size);

    loop {
        let page = cursor.next_batch().await.map_err(TransformError::from_store)?;
        if page.is_empty() {
            break;
        }

        let mut replacements = Vec::with_capacity(page.len());
        for doc in page {
            let id = doc.get(ID_FIELD).cloned().unwrap_or(Value::Null);
            let rendered = id_string(&doc);
            let rewritten = serde_json::from_value::<T>(Value::Object(doc))
                .map_err(|source| TransformError::Decode {
                    collection: collection.to_string(),
                    id: rendered.clone(),
                    source,
                })
                .and_then(&rewrite);
            match rewritten {
                Ok(next) => replacements.push((id, next)),
                Err(err @ TransformError::Decode { .. })
                    if spec.decode_policy == DecodePolicy::SkipAndLog =>
                {
                    warn!(collection, id = %rendered, error = %err, "skipping undecodable document");
                    stats.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        if replacements.is_empty() {
            continue;
        }

        let count = replacements.len() as u64;
        let mut tx = store.begin_transaction().await?;
        for (id, next) in replacements {
            tx.delete_many(collection, &Filter::by_id(id)).await?;
            tx.insert_one(collection, next).await?;
        }
        tx.commit().await?;

        stats.swapped += count;
        stats.batches += 1;
        debug!(collection, batch = stats.batches, documents = count, "swapped page");
    }

    info!(
        collection,
        swapped = stats.swapped,
        skipped = stats.skipped,
        batches = stats.batches,
        "swap finished"
    );
    Ok(stats)
}

/// Short-circuit a step that does not apply to this deployment.
///
/// Returns `None` when `applies` holds for the context's gate, otherwise the
/// `NotApplicable` outcome the step should return.
pub fn gated(
    ctx: &MigrationContext,
    applies: impl FnOnce(&dyn EnvironmentGate) -> bool,
    reason: &str,
) -> Option<TransformOutcome> {
    if applies(ctx.gate.as_ref()) {
        None
    } else {
        debug!(reason, "step not applicable to this deployment");
        Some(TransformOutcome::not_applicable(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{MockEnvironmentGate, StaticGate};
    use devhub_store::{document::from_value, FaultPoint, InMemoryStore, StoreError};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        from_value(value).unwrap()
    }

    async fn store_with(collection: &str, docs: Vec<Value>) -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_many(collection, docs.into_iter().map(doc).collect())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_add_field_is_idempotent() {
        let store = store_with(
            "users",
            vec![json!({"_id": 1}), json!({"_id": 2, "origin": "sso"})],
        )
        .await;
        assert_eq!(add_field(&store, "users", "origin", "local").await.unwrap(), 1);
        assert_eq!(add_field(&store, "users", "origin", "local").await.unwrap(), 0);

        let sso = store.find_one("users", &Filter::by_id(2)).await.unwrap().unwrap();
        assert_eq!(sso.get("origin"), Some(&json!("sso")));

        assert_eq!(remove_field(&store, "users", "origin").await.unwrap(), 2);
        assert_eq!(remove_field(&store, "users", "origin").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ensure_index_actions() {
        let store = InMemoryStore::new();
        let email = IndexModel::new("email").asc("email").unique();
        assert_eq!(
            ensure_index(&store, "users", email.clone()).await.unwrap(),
            IndexAction::Created
        );
        assert_eq!(
            ensure_index(&store, "users", email).await.unwrap(),
            IndexAction::AlreadyPresent
        );
        assert_eq!(
            ensure_index(&store, "users", IndexModel::new("email").asc("email").asc("tenant"))
                .await
                .unwrap(),
            IndexAction::Recreated
        );
        let indexes = store.list_indexes("users").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].keys.len(), 2);
    }

    #[tokio::test]
    async fn test_drop_index_if_exists() {
        let store = InMemoryStore::new();
        assert_eq!(
            drop_index_if_exists(&store, "devices", "identity_data").await.unwrap(),
            IndexAction::Absent
        );
        store
            .create_index("devices", IndexModel::new("identity_data").asc("identity_data"))
            .await
            .unwrap();
        assert_eq!(
            drop_index_if_exists(&store, "devices", "identity_data").await.unwrap(),
            IndexAction::Dropped
        );
        assert_eq!(
            drop_index_if_exists(&store, "devices", "identity_data").await.unwrap(),
            IndexAction::Absent
        );
    }

    #[tokio::test]
    async fn test_aggregate_replace() {
        let store = store_with(
            "users",
            vec![
                json!({"_id": 1, "email": "Ana@X.io"}),
                json!({"_id": 2, "email": "bo@x.io"}),
                json!({"_id": 3}),
            ],
        )
        .await;
        aggregate_replace(
            &store,
            "users",
            vec![
                Stage::Match(Filter::exists("email")),
                Stage::set(
                    "email_normalized",
                    devhub_store::Expr::lowercase(devhub_store::Expr::field("email")),
                ),
            ],
        )
        .await
        .unwrap();

        let ana = store.find_one("users", &Filter::by_id(1)).await.unwrap().unwrap();
        assert_eq!(ana.get("email_normalized"), Some(&json!("ana@x.io")));
        assert_eq!(ana.get("email"), Some(&json!("Ana@X.io")));
        let third = store.find_one("users", &Filter::by_id(3)).await.unwrap().unwrap();
        assert!(!third.contains_key("email_normalized"));
        assert_eq!(store.count("users", &Filter::All).await.unwrap(), 3);

        let err = aggregate_replace(&store, "users", vec![Stage::merge_into("users")])
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_reconcile_counts_with_zero_parents() {
        let store = store_with(
            "devices",
            vec![json!({"_id": "d1"}), json!({"_id": "d2"}), json!({"_id": "d3"})],
        )
        .await;
        store
            .insert_many(
                "auth_sets",
                vec![
                    doc(json!({"device_id": "d1"})),
                    doc(json!({"device_id": "d1"})),
                    doc(json!({"device_id": "d2"})),
                    doc(json!({"device_id": "d2", "status": "rejected"})),
                    doc(json!({"device_id": "gone"})),
                ],
            )
            .await
            .unwrap();
        let spec = ReconcileSpec::new("devices", "auth_sets", "device_id", "auth_sets_count")
            .with_child_filter(Filter::ne("status", "rejected"));

        for _ in 0..2 {
            assert_eq!(reconcile_counts(&store, &spec).await.unwrap(), 3);
            let mut counts = Vec::new();
            let mut cursor = Cursor::new(&store, "devices", Filter::All);
            while let Some(d) = cursor.next().await.unwrap() {
                counts.push(d.get("auth_sets_count").cloned().unwrap());
            }
            assert_eq!(counts, vec![json!(2), json!(1), json!(0)]);
        }
        assert_eq!(store.count("devices", &Filter::All).await.unwrap(), 3);

        assert_eq!(unreconcile_counts(&store, &spec).await.unwrap(), 3);
        assert_eq!(
            store.count("devices", &Filter::exists("auth_sets_count")).await.unwrap(),
            0
        );
    }

    #[derive(Debug, Deserialize)]
    struct Token {
        #[serde(rename = "_id")]
        id: String,
        token: String,
    }

    fn mark_swapped(token: Token) -> TransformResult<Document> {
        Ok(doc(json!({
            "_id": token.id,
            "token": token.token.to_uppercase(),
            "swapped": true,
        })))
    }

    async fn token_store(count: usize) -> InMemoryStore {
        let docs = (0..count)
            .map(|i| json!({"_id": format!("t{:02}", i), "token": format!("secret-{}", i)}))
            .collect();
        store_with("tokens", docs).await
    }

    #[tokio::test]
    async fn test_swap_in_pages() {
        let store = token_store(5).await;
        let ctx = MigrationContext::default().with_batch_size(2);
        let spec = SwapSpec::new("tokens", Filter::missing("swapped"));

        let stats = swap_in_transaction(&ctx, &store, &spec, mark_swapped).await.unwrap();
        assert_eq!(stats, SwapStats { swapped: 5, skipped: 0, batches: 3 });
        assert_eq!(store.count("tokens", &Filter::eq("swapped", true)).await.unwrap(), 5);

        let again = swap_in_transaction(&ctx, &store, &spec, mark_swapped).await.unwrap();
        assert_eq!(again, SwapStats::default());
        assert_eq!(store.count("tokens", &Filter::All).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_swap_failed_page_is_rolled_back_and_resumable() {
        let store = token_store(6).await;
        store.faults().fail_after(FaultPoint::Commit, 1);
        let ctx = MigrationContext::default().with_batch_size(2);
        let spec = SwapSpec::new("tokens", Filter::missing("swapped"));

        let err = swap_in_transaction(&ctx, &store, &spec, mark_swapped).await.unwrap_err();
        assert!(matches!(err, TransformError::Store(StoreError::Injected(_))));
        assert_eq!(store.count("tokens", &Filter::eq("swapped", true)).await.unwrap(), 2);
        assert_eq!(store.count("tokens", &Filter::All).await.unwrap(), 6);

        let stats = swap_in_transaction(&ctx, &store, &spec, mark_swapped).await.unwrap();
        assert_eq!(stats.swapped, 4);
        assert_eq!(store.count("tokens", &Filter::eq("swapped", true)).await.unwrap(), 6);
        assert_eq!(store.count("tokens", &Filter::All).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_swap_decode_policies() {
        let store = token_store(2).await;
        store
            .insert_one("tokens", doc(json!({"_id": "t99", "token": 42})))
            .await
            .unwrap();
        let ctx = MigrationContext::default();

        let strict = SwapSpec::new("tokens", Filter::missing("swapped"));
        let err = swap_in_transaction(&ctx, &store, &strict, mark_swapped).await.unwrap_err();
        assert!(matches!(err, TransformError::Decode { ref id, .. } if id == "t99"));
        assert_eq!(store.count("tokens", &Filter::eq("swapped", true)).await.unwrap(), 0);

        let lenient = strict.with_decode_policy(DecodePolicy::SkipAndLog);
        let stats = swap_in_transaction(&ctx, &store, &lenient, mark_swapped).await.unwrap();
        assert_eq!(stats, SwapStats { swapped: 2, skipped: 1, batches: 1 });
        let bad = store.find_one("tokens", &Filter::by_id("t99")).await.unwrap().unwrap();
        assert_eq!(bad.get("token"), Some(&json!(42)));
    }

    #[test]
    fn test_gated_uses_context_gate() {
        let mut gate = MockEnvironmentGate::new();
        gate.expect_is_enterprise().times(1).return_const(false);
        let ctx = MigrationContext::new(Arc::new(gate));
        let outcome = gated(&ctx, |g| g.is_enterprise(), "enterprise only");
        assert_eq!(outcome, Some(TransformOutcome::not_applicable("enterprise only")));

        let ctx = MigrationContext::new(Arc::new(StaticGate::enterprise()));
        assert_eq!(gated(&ctx, |g| g.is_enterprise(), "enterprise only"), None);
    }
}
