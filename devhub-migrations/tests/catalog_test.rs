use devhub_migrate::{
    Direction, Migration, MigrationContext, MigrationError, MigrationRegistry, Runner, StaticGate,
    TransformOutcome,
};
use devhub_migrations::{
    collections::{AUTH_SETS, DEVICES, TENANTS, TOKENS, USERS},
    registry,
    v0001_users_email_index::UsersEmailIndex,
    v0002_users_origin::UsersOrigin,
    v0003_devices_auth_sets_count::COUNT_FIELD,
    v0005_tokens_hashed::{hash_token, HASHED_FORMAT, TOKEN_FORMAT_FIELD},
    v0010_devices_drop_identity_index::{legacy_index, LEGACY_INDEX},
};
use devhub_store::{
    document::from_value, Cursor, Document, DocumentStore, FaultPoint, Filter, InMemoryStore,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn doc(value: Value) -> Document {
    from_value(value).unwrap()
}

fn catalog_runner(store: &InMemoryStore) -> Runner {
    Runner::new(Arc::new(store.clone()), Arc::new(registry().unwrap()))
}

async fn all(store: &InMemoryStore, collection: &str) -> Vec<Document> {
    let mut cursor = Cursor::new(store, collection, Filter::All);
    let mut docs = Vec::new();
    while let Some(d) = cursor.next().await.unwrap() {
        docs.push(d);
    }
    docs
}

async fn seed_users(store: &InMemoryStore) {
    store
        .insert_many(
            USERS,
            vec![
                doc(json!({"_id": "u1", "email": "Ana@Example.com"})),
                doc(json!({"_id": "u2", "email": "bo@example.com", "origin": "sso"})),
                doc(json!({"_id": "u3", "email": "cy@example.com"})),
                doc(json!({"_id": "u4", "email": "di@example.com", "origin": "ldap"})),
                doc(json!({"_id": "u5", "email": "ed@example.com"})),
            ],
        )
        .await
        .unwrap();
}

async fn seed_tokens(store: &InMemoryStore, count: usize) {
    let tokens = (0..count)
        .map(|i| doc(json!({"_id": format!("tok{:02}", i), "token": format!("plain-{}", i), "tenant_id": "t1"})))
        .collect();
    store.insert_many(TOKENS, tokens).await.unwrap();
}

#[tokio::test]
async fn test_scenario_a_origin_defaults_once() {
    let store = InMemoryStore::new();
    seed_users(&store).await;
    let runner = catalog_runner(&store);
    let ctx = MigrationContext::default();

    runner.apply_up(&ctx, Some(2)).await.unwrap();
    let users = all(&store, USERS).await;
    let local = users
        .iter()
        .filter(|u| u.get("origin") == Some(&json!("local")))
        .count();
    assert_eq!(local, 3);
    assert_eq!(users[1].get("origin"), Some(&json!("sso")));

    let before = store.snapshot().await;
    let outcome = UsersOrigin.up(&ctx, &store).await.unwrap();
    assert_eq!(outcome, TransformOutcome::Applied);
    let report = runner.apply_up(&ctx, Some(2)).await.unwrap();
    assert!(report.is_noop());
    assert_eq!(store.snapshot().await.collections[USERS], before.collections[USERS]);
}

#[tokio::test]
async fn test_scenario_b_existing_email_index() {
    let store = InMemoryStore::new();
    seed_users(&store).await;
    let ctx = MigrationContext::default();

    UsersEmailIndex.up(&ctx, &store).await.unwrap();
    UsersEmailIndex.up(&ctx, &store).await.unwrap();
    catalog_runner(&store).apply_up(&ctx, Some(1)).await.unwrap();

    let indexes = store.list_indexes(USERS).await.unwrap();
    let email: Vec<_> = indexes.iter().filter(|i| i.name == "email").collect();
    assert_eq!(email.len(), 1);
    assert!(email[0].unique);
}

#[tokio::test]
async fn test_scenario_c_token_swap_survives_crash() {
    let store = InMemoryStore::new();
    seed_tokens(&store, 10).await;
    let ctx = MigrationContext::default().with_batch_size(3);
    // Two pages commit, the third dies.
    store.faults().fail_after(FaultPoint::Commit, 2);

    let err = catalog_runner(&store).apply_up(&ctx, None).await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Transform { version: 5, direction: Direction::Up, left_at: 4, .. }
    ));
    assert_eq!(store.count(TOKENS, &Filter::All).await.unwrap(), 10);
    assert_eq!(
        store.count(TOKENS, &Filter::eq(TOKEN_FORMAT_FIELD, HASHED_FORMAT)).await.unwrap(),
        6
    );

    let report = catalog_runner(&store).apply_up(&ctx, None).await.unwrap();
    assert_eq!(report.from_version, 4);
    assert_eq!(report.to_version, 10);

    let tokens = all(&store, TOKENS).await;
    assert_eq!(tokens.len(), 10);
    for (i, token) in tokens.iter().enumerate() {
        assert_eq!(token.get("token"), Some(&json!(hash_token(&format!("plain-{}", i)))));
        assert_eq!(token.get(TOKEN_FORMAT_FIELD), Some(&json!(HASHED_FORMAT)));
        assert_eq!(token.get("tenant_id"), Some(&json!("t1")));
    }
}

#[tokio::test]
async fn test_reconciliation_totals() {
    let store = InMemoryStore::new();
    store
        .insert_many(
            DEVICES,
            vec![
                doc(json!({"_id": "d1", "auth_sets_count": 17})),
                doc(json!({"_id": "d2"})),
                doc(json!({"_id": "d3"})),
            ],
        )
        .await
        .unwrap();
    let sets = [("d1", 3), ("d2", 1), ("removed", 2)];
    for (device, n) in sets {
        for _ in 0..n {
            store
                .insert_one(AUTH_SETS, doc(json!({"device_id": device})))
                .await
                .unwrap();
        }
    }

    catalog_runner(&store)
        .apply_up(&MigrationContext::default(), Some(3))
        .await
        .unwrap();

    let counts: Vec<i64> = all(&store, DEVICES)
        .await
        .iter()
        .map(|d| d.get(COUNT_FIELD).and_then(Value::as_i64).unwrap())
        .collect();
    assert_eq!(counts, vec![3, 1, 0]);
    assert_eq!(counts.iter().sum::<i64>(), 4);
}

#[tokio::test]
async fn test_gated_step_depends_on_deployment() {
    for (gate, expected) in [
        (StaticGate::community(), None),
        (StaticGate::enterprise(), Some(json!("os"))),
    ] {
        let store = InMemoryStore::new();
        store
            .insert_one(TENANTS, doc(json!({"_id": "t1", "name": "acme"})))
            .await
            .unwrap();
        let ctx = MigrationContext::new(Arc::new(gate));

        let report = catalog_runner(&store).apply_up(&ctx, None).await.unwrap();
        let v6 = report.steps.iter().find(|s| s.version == 6).unwrap();
        let tenant = store.find_one(TENANTS, &Filter::by_id("t1")).await.unwrap().unwrap();
        assert_eq!(tenant.get("plan").cloned(), expected);
        if expected.is_none() {
            assert!(matches!(v6.outcome, TransformOutcome::NotApplicable { .. }));
        }
        assert_eq!(report.to_version, 10);
    }
}

#[tokio::test]
async fn test_full_round_trip() {
    let store = InMemoryStore::new();
    seed_users(&store).await;
    seed_tokens(&store, 4).await;
    store
        .insert_many(DEVICES, vec![doc(json!({"_id": "d1", "identity_data": {"mac": "00:11"}}))])
        .await
        .unwrap();
    store.create_index(DEVICES, legacy_index()).await.unwrap();
    store
        .insert_one(AUTH_SETS, doc(json!({"device_id": "d1"})))
        .await
        .unwrap();

    let runner = catalog_runner(&store);
    let ctx = MigrationContext::new(Arc::new(StaticGate::enterprise()));
    runner.apply_up(&ctx, None).await.unwrap();
    assert!(store.list_indexes(DEVICES).await.unwrap().is_empty());

    let report = runner.apply_down(&ctx, 0).await.unwrap();
    assert_eq!(report.to_version, 0);
    let irreversible: Vec<i64> = report
        .steps
        .iter()
        .filter(|s| matches!(s.outcome, TransformOutcome::Irreversible { .. }))
        .map(|s| s.version)
        .collect();
    assert_eq!(irreversible, vec![5, 2]);

    let indexes = store.list_indexes(DEVICES).await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, LEGACY_INDEX);
    assert!(store.list_indexes(USERS).await.unwrap().is_empty());
    assert_eq!(store.count(USERS, &Filter::exists("email_normalized")).await.unwrap(), 0);
    assert_eq!(store.count(DEVICES, &Filter::exists(COUNT_FIELD)).await.unwrap(), 0);
    assert_eq!(store.count(TENANTS, &Filter::exists("plan")).await.unwrap(), 0);

    // Going up again must not hash tokens twice.
    runner.apply_up(&ctx, None).await.unwrap();
    let tokens = all(&store, TOKENS).await;
    assert_eq!(tokens[0].get("token"), Some(&json!(hash_token("plain-0"))));
    let users = all(&store, USERS).await;
    assert_eq!(users[0].get("email_normalized"), Some(&json!("ana@example.com")));
}

#[tokio::test]
async fn test_catalog_versions_are_ordered() {
    let registry: MigrationRegistry = registry().unwrap();
    let versions: Vec<i64> = registry.list_ordered().iter().map(|m| m.version()).collect();
    assert!(versions.windows(2).all(|w| w[0] < w[1]));
}
