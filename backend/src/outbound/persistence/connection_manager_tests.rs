//! Tests for the connection manager using in-memory pools.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rstest::{fixture, rstest};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::outbound::persistence::Endpoint;

#[derive(Clone)]
struct FakePool {
    id: usize,
    label: &'static str,
    reachable: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
    scripts: Arc<AtomicUsize>,
    schema_ok: bool,
    close_ok: bool,
}

#[async_trait]
impl ManagedPool for FakePool {
    async fn ping(&self) -> Result<(), PoolError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PoolError::query("connection refused"))
        }
    }

    async fn execute_script(&self, _sql: &str) -> Result<(), PoolError> {
        self.scripts.fetch_add(1, Ordering::SeqCst);
        if self.schema_ok {
            Ok(())
        } else {
            Err(PoolError::query("permission denied for schema public"))
        }
    }

    async fn close(&self) -> Result<(), PoolError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.close_ok {
            Ok(())
        } else {
            Err(PoolError::release("still checked out"))
        }
    }
}

/// Connector whose primary refuses the first `refusals` connection attempts.
struct FakeConnector {
    refusals: usize,
    primary_connects: AtomicUsize,
    replica_reachable: bool,
    schema_ok: bool,
    close_ok: bool,
    created: Mutex<Vec<FakePool>>,
}

impl FakeConnector {
    fn refusing(refusals: usize) -> Self {
        Self {
            refusals,
            primary_connects: AtomicUsize::new(0),
            replica_reachable: true,
            schema_ok: true,
            close_ok: true,
            created: Mutex::new(Vec::new()),
        }
    }

    fn pools(&self) -> Vec<FakePool> {
        self.created.lock().expect("pool list lock").clone()
    }
}

#[async_trait]
impl PoolConnector for FakeConnector {
    type Pool = FakePool;

    async fn connect(&self, config: &PoolConfig) -> Result<FakePool, PoolError> {
        if config.label() == PRIMARY_POOL {
            let previous = self.primary_connects.fetch_add(1, Ordering::SeqCst);
            if previous < self.refusals {
                return Err(PoolError::build("connection refused"));
            }
        } else if !self.replica_reachable {
            return Err(PoolError::build("replica unreachable"));
        }

        let mut created = self.created.lock().expect("pool list lock");
        let pool = FakePool {
            id: created.len(),
            label: config.label(),
            reachable: Arc::new(AtomicBool::new(true)),
            closes: Arc::new(AtomicUsize::new(0)),
            scripts: Arc::new(AtomicUsize::new(0)),
            schema_ok: self.schema_ok,
            close_ok: self.close_ok,
        };
        created.push(pool.clone());
        Ok(pool)
    }
}

#[fixture]
fn shared_settings() -> DatabaseSettings {
    DatabaseSettings::default()
}

#[fixture]
fn replica_settings() -> DatabaseSettings {
    DatabaseSettings {
        read_replica: Some(Endpoint {
            host: "replica".into(),
            port: 5432,
        }),
        ..DatabaseSettings::default()
    }
}

fn manager(
    connector: FakeConnector,
    settings: &DatabaseSettings,
) -> ConnectionManager<FakeConnector> {
    ConnectionManager::with_connector(connector, settings)
}

#[rstest]
#[tokio::test]
async fn pools_are_unavailable_before_initialization(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &shared_settings);

    assert!(matches!(
        manager.get_write_pool(),
        Err(DatabaseError::NotInitialized)
    ));
    assert!(matches!(
        manager.get_read_pool(),
        Err(DatabaseError::NotInitialized)
    ));
    assert_eq!(manager.check_health().await, DatabaseHealth::new(false, false));
}

#[rstest]
#[tokio::test]
async fn shared_topology_aliases_the_read_pool(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &shared_settings);
    manager
        .initialize(&CancellationToken::new())
        .await
        .expect("initialization succeeds");

    let write = manager.get_write_pool().expect("write pool");
    let read = manager.get_read_pool().expect("read pool");
    assert_eq!(write.id, read.id);
    assert_eq!(manager.connector.pools().len(), 1);
    assert_eq!(write.scripts.load(Ordering::SeqCst), 1);
    assert_eq!(
        manager.check_health().await,
        DatabaseHealth {
            primary: true,
            read_replica: true
        }
    );
}

#[rstest]
#[tokio::test]
async fn distinct_topology_routes_reads_to_the_replica(replica_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &replica_settings);
    manager
        .initialize(&CancellationToken::new())
        .await
        .expect("initialization succeeds");

    let write = manager.get_write_pool().expect("write pool");
    let read = manager.get_read_pool().expect("read pool");
    assert_eq!(write.label, PRIMARY_POOL);
    assert_eq!(read.label, READ_REPLICA_POOL);
    assert_ne!(write.id, read.id);
    assert_eq!(read.scripts.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn health_reports_each_pool_without_failing(replica_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &replica_settings);
    manager
        .initialize(&CancellationToken::new())
        .await
        .expect("initialization succeeds");

    let read = manager.get_read_pool().expect("read pool");
    read.reachable.store(false, Ordering::SeqCst);
    assert_eq!(manager.check_health().await, DatabaseHealth::new(true, false));

    let write = manager.get_write_pool().expect("write pool");
    write.reachable.store(false, Ordering::SeqCst);
    assert_eq!(manager.check_health().await, DatabaseHealth::new(false, false));
}

#[rstest]
#[tokio::test]
async fn shared_health_mirrors_the_primary(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &shared_settings);
    manager
        .initialize(&CancellationToken::new())
        .await
        .expect("initialization succeeds");

    let pool = manager.get_write_pool().expect("write pool");
    pool.reachable.store(false, Ordering::SeqCst);
    assert_eq!(manager.check_health().await, DatabaseHealth::shared(false));
}

#[rstest]
#[tokio::test]
async fn repeated_health_checks_agree(replica_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &replica_settings);
    manager
        .initialize(&CancellationToken::new())
        .await
        .expect("initialization succeeds");

    let first = manager.check_health().await;
    let second = manager.check_health().await;
    let via_port = DatabaseHealthProbe::check_health(&manager).await;
    assert_eq!(first, second);
    assert_eq!(first, via_port);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn succeeds_on_third_attempt_after_two_delays(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(2), &shared_settings);
    let started = Instant::now();

    manager
        .initialize(&CancellationToken::new())
        .await
        .expect("third attempt succeeds");

    let elapsed = started.elapsed();
    assert_eq!(manager.connector.primary_connects.load(Ordering::SeqCst), 3);
    assert!(elapsed >= Duration::from_secs(10), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_secs(15), "waited {elapsed:?}");
    assert!(manager.get_write_pool().is_ok());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn gives_up_after_the_retry_budget(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(usize::MAX), &shared_settings);
    let started = Instant::now();

    let error = manager
        .initialize(&CancellationToken::new())
        .await
        .expect_err("unreachable store exhausts retries");

    assert!(matches!(
        error,
        DatabaseError::RetriesExhausted { attempts: 6, .. }
    ));
    assert_eq!(manager.connector.primary_connects.load(Ordering::SeqCst), 6);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(25), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_secs(26), "waited {elapsed:?}");
    assert!(matches!(
        manager.get_write_pool(),
        Err(DatabaseError::NotInitialized)
    ));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn schema_failures_release_pools_before_retrying(replica_settings: DatabaseSettings) {
    let connector = FakeConnector {
        schema_ok: false,
        ..FakeConnector::refusing(0)
    };
    let manager = manager(connector, &replica_settings)
        .with_retry_policy(RetryPolicy::new(1, Duration::from_secs(1)));

    let error = manager
        .initialize(&CancellationToken::new())
        .await
        .expect_err("schema failure is fatal after retries");

    match error {
        DatabaseError::RetriesExhausted { attempts, source } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*source, DatabaseError::Schema { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let pools = manager.connector.pools();
    assert_eq!(pools.len(), 4);
    assert!(pools.iter().all(|pool| pool.closes.load(Ordering::SeqCst) == 1));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unreachable_replica_releases_the_primary(replica_settings: DatabaseSettings) {
    let connector = FakeConnector {
        replica_reachable: false,
        ..FakeConnector::refusing(0)
    };
    let manager =
        manager(connector, &replica_settings).with_retry_policy(RetryPolicy::new(0, Duration::ZERO));

    let error = manager
        .initialize(&CancellationToken::new())
        .await
        .expect_err("replica required when configured");

    match error {
        DatabaseError::RetriesExhausted { source, .. } => assert!(matches!(
            *source,
            DatabaseError::Connect {
                pool: READ_REPLICA_POOL,
                ..
            }
        )),
        other => panic!("unexpected error: {other:?}"),
    }
    let pools = manager.connector.pools();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].closes.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn initialize_is_idempotent_on_success(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &shared_settings);
    let cancel = CancellationToken::new();

    manager.initialize(&cancel).await.expect("first call");
    manager.initialize(&cancel).await.expect("second call");

    assert_eq!(manager.connector.primary_connects.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn cancelled_token_stops_initialization(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &shared_settings);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let error = manager
        .initialize(&cancel)
        .await
        .expect_err("cancelled before first attempt");

    assert!(matches!(error, DatabaseError::Cancelled));
    assert_eq!(manager.connector.primary_connects.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_retry_delay(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(usize::MAX), &shared_settings);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        trigger.cancel();
    });
    let started = Instant::now();

    let error = manager
        .initialize(&cancel)
        .await
        .expect_err("shutdown cancels start-up");

    assert!(matches!(error, DatabaseError::Cancelled));
    assert_eq!(manager.connector.primary_connects.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[rstest]
#[tokio::test]
async fn close_releases_a_shared_pool_once(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &shared_settings);
    manager
        .initialize(&CancellationToken::new())
        .await
        .expect("initialization succeeds");

    manager.close().await.expect("first close");
    manager.close().await.expect("second close is a no-op");

    let pools = manager.connector.pools();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].closes.load(Ordering::SeqCst), 1);
    assert!(matches!(manager.get_read_pool(), Err(DatabaseError::Closed)));
    assert_eq!(manager.check_health().await, DatabaseHealth::default());
    assert!(matches!(
        manager.initialize(&CancellationToken::new()).await,
        Err(DatabaseError::Closed)
    ));
}

#[rstest]
#[tokio::test]
async fn close_releases_both_distinct_pools(replica_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &replica_settings);
    manager
        .initialize(&CancellationToken::new())
        .await
        .expect("initialization succeeds");

    manager.close().await.expect("close succeeds");

    let pools = manager.connector.pools();
    assert_eq!(pools.len(), 2);
    assert!(pools.iter().all(|pool| pool.closes.load(Ordering::SeqCst) == 1));
}

#[rstest]
#[tokio::test]
async fn close_surfaces_release_failures(replica_settings: DatabaseSettings) {
    let connector = FakeConnector {
        close_ok: false,
        ..FakeConnector::refusing(0)
    };
    let manager = manager(connector, &replica_settings);
    manager
        .initialize(&CancellationToken::new())
        .await
        .expect("initialization succeeds");

    let error = manager.close().await.expect_err("release failure surfaces");

    assert!(matches!(
        error,
        DatabaseError::Release {
            pool: PRIMARY_POOL,
            ..
        }
    ));
    let pools = manager.connector.pools();
    assert!(pools.iter().all(|pool| pool.closes.load(Ordering::SeqCst) == 1));
}

#[rstest]
#[tokio::test]
async fn close_before_initialization_is_harmless(shared_settings: DatabaseSettings) {
    let manager = manager(FakeConnector::refusing(0), &shared_settings);
    manager.close().await.expect("nothing to release");
    assert!(manager.is_closed());
}

#[rstest]
fn default_retry_policy_allows_six_attempts() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts(), 6);
    assert_eq!(policy.delay(), Duration::from_secs(5));
}
