use async_trait::async_trait;
use devhub_migrate::{
    marker,
    testing::{RecordMigration, APPLIED_STEPS},
    Migration, MigrationContext, MigrationError, MigrationRegistry, Runner, TransformOutcome,
    TransformResult, MIGRATION_INFO_COLLECTION,
};
use devhub_store::{DocumentStore, FaultPoint, InMemoryStore};
use std::sync::Arc;
use std::time::Duration;

fn records(versions: &[i64]) -> Arc<MigrationRegistry> {
    let registry = MigrationRegistry::from_migrations(
        versions
            .iter()
            .map(|v| Arc::new(RecordMigration::new(*v)) as Arc<dyn Migration>),
    )
    .unwrap();
    Arc::new(registry)
}

fn runner(store: &InMemoryStore, registry: Arc<MigrationRegistry>) -> Runner {
    Runner::new(Arc::new(store.clone()), registry)
}

#[tokio::test]
async fn test_up_then_down_round_trip() {
    let store = InMemoryStore::new();
    let runner = runner(&store, records(&[1, 2, 3]));
    let ctx = MigrationContext::default();

    runner.apply_up(&ctx, None).await.unwrap();
    assert_eq!(RecordMigration::applied(&store).await, vec![1, 2, 3]);

    let report = runner.apply_down(&ctx, 0).await.unwrap();
    assert_eq!(report.steps.len(), 3);
    assert!(RecordMigration::applied(&store).await.is_empty());
    assert_eq!(runner.current_version().await.unwrap(), 0);

    let report = runner.apply_up(&ctx, None).await.unwrap();
    assert_eq!(report.applied_versions(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_resume_after_crash_inside_step() {
    let store = InMemoryStore::new();
    let registry = records(&[1, 2, 3]);
    store.faults().fail_after_on(FaultPoint::Replace, APPLIED_STEPS, 1);

    let err = runner(&store, registry.clone())
        .apply_up(&MigrationContext::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Transform { version: 2, .. }));
    assert_eq!(err.database_version(), Some(1));

    // Restart with a fresh runner over the same data.
    let report = runner(&store, registry)
        .apply_up(&MigrationContext::default(), None)
        .await
        .unwrap();
    assert_eq!(report.from_version, 1);
    assert_eq!(report.applied_versions(), vec![2, 3]);
    assert_eq!(RecordMigration::applied(&store).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_resume_after_crash_before_marker_write() {
    let store = InMemoryStore::new();
    let registry = records(&[1, 2, 3]);
    store
        .faults()
        .fail_after_on(FaultPoint::Replace, MIGRATION_INFO_COLLECTION, 1);

    let err = runner(&store, registry.clone())
        .apply_up(&MigrationContext::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Marker { left_at: Some(1), .. }));
    // Step 2 finished but was never recorded.
    assert_eq!(RecordMigration::applied(&store).await, vec![1, 2]);
    assert_eq!(marker::current_version(&store).await.unwrap(), 1);

    let report = runner(&store, registry)
        .apply_up(&MigrationContext::default(), None)
        .await
        .unwrap();
    assert_eq!(report.applied_versions(), vec![2, 3]);
    assert_eq!(RecordMigration::applied(&store).await, vec![1, 2, 3]);
}

/// Cancels the run from inside its own step, then never finishes
struct CancelsItself;

#[async_trait]
impl Migration for CancelsItself {
    fn version(&self) -> i64 {
        2
    }

    fn description(&self) -> &str {
        "cancels the run"
    }

    async fn up(&self, ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        ctx.cancel.cancel();
        std::future::pending().await
    }

    async fn down(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Ok(TransformOutcome::Applied)
    }
}

/// Sleeps far longer than any test deadline
struct Sleeper;

#[async_trait]
impl Migration for Sleeper {
    fn version(&self) -> i64 {
        2
    }

    fn description(&self) -> &str {
        "sleeps"
    }

    async fn up(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(TransformOutcome::Applied)
    }

    async fn down(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Ok(TransformOutcome::Applied)
    }
}

fn with_second_step(second: Arc<dyn Migration>) -> Arc<MigrationRegistry> {
    let migrations: Vec<Arc<dyn Migration>> = vec![
        Arc::new(RecordMigration::new(1)),
        second,
        Arc::new(RecordMigration::new(3)),
    ];
    Arc::new(MigrationRegistry::from_migrations(migrations).unwrap())
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_step() {
    let store = InMemoryStore::new();
    let runner = runner(&store, with_second_step(Arc::new(CancelsItself)));

    let err = runner
        .apply_up(&MigrationContext::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Cancelled { version: 2, left_at: 1 }));
    assert_eq!(runner.current_version().await.unwrap(), 1);
    assert_eq!(RecordMigration::applied(&store).await, vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_step_timeout() {
    let store = InMemoryStore::new();
    let runner = runner(&store, with_second_step(Arc::new(Sleeper)));
    let ctx = MigrationContext::default().with_step_timeout(Duration::from_secs(30));

    let err = runner.apply_up(&ctx, None).await.unwrap_err();
    assert!(matches!(err, MigrationError::DeadlineExceeded { version: 2, left_at: 1 }));
    assert_eq!(err.database_version(), Some(1));
    assert_eq!(RecordMigration::applied(&store).await, vec![1]);
}
