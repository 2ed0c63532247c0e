//! Connection pool construction and leasing.
//!
//! Both backends share one [`PoolPolicy`]; the profile decides connect
//! options and statement caching. Leased connections are watched for leaks
//! but never reclaimed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use sea_orm::{DatabaseConnection, SqlxPostgresConnector, SqlxSqliteConnector};
use sqlx::pool::{PoolConnection, PoolOptions};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqliteSynchronous,
};
use sqlx::{Postgres, Sqlite};
use tokio::task::JoinHandle;

use crate::error::{StorageError, Unavailable};
use crate::storage::profile::{BackendKind, BackendProfile, StatementCache};

/// Lock wait on the embedded database file.
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long shutdown waits for leased connections to come back.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Pool sizing, timeouts, validation and leak detection.
///
/// `Default` is the production policy; it is not read from the
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolPolicy {
    pub max_size: u32,
    pub min_idle: u32,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub acquire_timeout: Duration,
    /// Run on an idle connection before it is leased
    pub validation_query: &'static str,
    pub validation_timeout: Duration,
    /// Lease duration after which a probable leak is logged
    pub leak_detection_threshold: Duration,
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: 2,
            idle_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(1800),
            acquire_timeout: Duration::from_secs(30),
            validation_query: "SELECT 1",
            validation_timeout: Duration::from_secs(5),
            leak_detection_threshold: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Point-in-time pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub kind: BackendKind,
    /// Open connections, leased or idle
    pub size: u32,
    pub idle: usize,
    pub leaks_detected: u64,
    pub closed: bool,
}

#[derive(Debug)]
pub struct ConnectionPool {
    backend: Backend,
    policy: PoolPolicy,
    statement_cache: Option<StatementCache>,
    closed: AtomicBool,
    leaks: Arc<AtomicU64>,
}

fn pool_options<DB: sqlx::Database>(policy: &PoolPolicy) -> PoolOptions<DB> {
    PoolOptions::new()
        .max_connections(policy.max_size)
        .min_connections(policy.min_idle)
        .idle_timeout(policy.idle_timeout)
        .max_lifetime(policy.max_lifetime)
        .acquire_timeout(policy.acquire_timeout)
        // Validation runs in before_acquire with its own timeout
        .test_before_acquire(false)
}

/// `Ok(false)` makes the pool discard the connection and try another.
fn validation_outcome<T>(
    result: Result<Result<T, sqlx::Error>, tokio::time::error::Elapsed>,
    timeout: Duration,
) -> Result<bool, sqlx::Error> {
    match result {
        Ok(Ok(_)) => Ok(true),
        Ok(Err(e)) => {
            tracing::warn!("Connection failed validation, discarding: {}", e);
            Ok(false)
        }
        Err(_) => {
            tracing::warn!(
                "Connection validation timed out after {:?}, discarding",
                timeout
            );
            Ok(false)
        }
    }
}

impl ConnectionPool {
    /// Build the pool for `profile`, opening at least one connection.
    ///
    /// Fails with [`StorageError::PoolInit`] if the backend cannot be reached
    /// with the profile's settings at all.
    pub async fn build(profile: &BackendProfile, policy: &PoolPolicy) -> Result<Self, StorageError> {
        let query = policy.validation_query;
        let timeout = policy.validation_timeout;

        let backend = match profile {
            BackendProfile::Primary {
                host,
                port,
                database,
                credentials,
                statement_cache,
            } => {
                let connect = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .database(database)
                    .username(&credentials.username)
                    .password(credentials.password())
                    .statement_cache_capacity(statement_cache.capacity)
                    .application_name("price-storage");

                let pool = pool_options::<Postgres>(policy)
                    .before_acquire(move |conn, _meta| {
                        Box::pin(async move {
                            let result =
                                tokio::time::timeout(timeout, sqlx::query(query).execute(conn))
                                    .await;
                            validation_outcome(result, timeout)
                        })
                    })
                    .connect_with(connect)
                    .await
                    .map_err(|source| StorageError::PoolInit {
                        backend: BackendKind::Primary,
                        source,
                    })?;

                Backend::Postgres(pool)
            }
            BackendProfile::Fallback { .. } => {
                let file = profile.database_file().unwrap_or_default();
                let connect = SqliteConnectOptions::new()
                    .filename(&file)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
                    .foreign_keys(true)
                    .busy_timeout(SQLITE_BUSY_TIMEOUT)
                    // No prepared statement cache on the embedded store
                    .statement_cache_capacity(0);

                let pool = pool_options::<Sqlite>(policy)
                    .before_acquire(move |conn, _meta| {
                        Box::pin(async move {
                            let result =
                                tokio::time::timeout(timeout, sqlx::query(query).execute(conn))
                                    .await;
                            validation_outcome(result, timeout)
                        })
                    })
                    .connect_with(connect)
                    .await
                    .map_err(|source| StorageError::PoolInit {
                        backend: BackendKind::Fallback,
                        source,
                    })?;

                Backend::Sqlite(pool)
            }
        };

        tracing::info!(
            "Connection pool ready for {} (max {}, min idle {})",
            profile.connection_url(),
            policy.max_size,
            policy.min_idle
        );

        Ok(Self {
            backend,
            policy: policy.clone(),
            statement_cache: profile.statement_cache(),
            closed: AtomicBool::new(false),
            leaks: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn kind(&self) -> BackendKind {
        match self.backend {
            Backend::Postgres(_) => BackendKind::Primary,
            Backend::Sqlite(_) => BackendKind::Fallback,
        }
    }

    pub fn policy(&self) -> &PoolPolicy {
        &self.policy
    }

    /// SeaORM handle over the same pool, used for migrations.
    pub fn database(&self) -> DatabaseConnection {
        match &self.backend {
            Backend::Postgres(pool) => SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone()),
            Backend::Sqlite(pool) => SqlxSqliteConnector::from_sqlx_sqlite_pool(pool.clone()),
        }
    }

    /// Lease a connection, waiting at most the policy's acquire timeout.
    pub async fn acquire(&self) -> Result<LeasedConnection, StorageError> {
        if self.is_closed() {
            return Err(StorageError::ConnectionUnavailable(Unavailable::Closed));
        }

        let conn = match &self.backend {
            Backend::Postgres(pool) => pool.acquire().await.map(PooledConnection::Postgres),
            Backend::Sqlite(pool) => pool.acquire().await.map(PooledConnection::Sqlite),
        }
        .map_err(|e| match e {
            sqlx::Error::PoolTimedOut => {
                tracing::warn!(
                    "No connection available within {:?}, all {} connections leased",
                    self.policy.acquire_timeout,
                    self.policy.max_size
                );
                StorageError::ConnectionUnavailable(Unavailable::TimedOut(
                    self.policy.acquire_timeout,
                ))
            }
            sqlx::Error::PoolClosed => StorageError::ConnectionUnavailable(Unavailable::Closed),
            other => StorageError::Database(other),
        })?;

        Ok(LeasedConnection::new(
            conn,
            self.statement_cache,
            self.policy.leak_detection_threshold,
            Arc::clone(&self.leaks),
        ))
    }

    /// Close the pool. Further acquisitions fail; calling again is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Connection pool already closed");
            return;
        }

        // close() marks the pool closed before it starts waiting, so giving up
        // on the wait still rejects new leases.
        let drained = match &self.backend {
            Backend::Postgres(pool) => tokio::time::timeout(SHUTDOWN_GRACE, pool.close()).await,
            Backend::Sqlite(pool) => tokio::time::timeout(SHUTDOWN_GRACE, pool.close()).await,
        };

        match drained {
            Ok(()) => tracing::info!("Connection pool closed"),
            Err(_) => tracing::warn!(
                "Connection pool closed with leased connections still outstanding after {:?}",
                SHUTDOWN_GRACE
            ),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PoolStatus {
        let (size, idle) = match &self.backend {
            Backend::Postgres(pool) => (pool.size(), pool.num_idle()),
            Backend::Sqlite(pool) => (pool.size(), pool.num_idle()),
        };

        PoolStatus {
            kind: self.kind(),
            size,
            idle,
            leaks_detected: self.leaks.load(Ordering::Relaxed),
            closed: self.is_closed(),
        }
    }
}

pub enum PooledConnection {
    Postgres(PoolConnection<Postgres>),
    Sqlite(PoolConnection<Sqlite>),
}

/// A connection borrowed from the pool; returned when dropped.
pub struct LeasedConnection {
    conn: PooledConnection,
    statement_cache: Option<StatementCache>,
    leased_at: Instant,
    leak_watch: JoinHandle<()>,
}

impl LeasedConnection {
    fn new(
        conn: PooledConnection,
        statement_cache: Option<StatementCache>,
        threshold: Duration,
        leaks: Arc<AtomicU64>,
    ) -> Self {
        let kind = match conn {
            PooledConnection::Postgres(_) => BackendKind::Primary,
            PooledConnection::Sqlite(_) => BackendKind::Fallback,
        };

        let leak_watch = tokio::spawn(async move {
            tokio::time::sleep(threshold).await;
            leaks.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                "Connection leak detection triggered: {} connection held for more than {:?} without being returned",
                kind,
                threshold
            );
        });

        tracing::debug!("Leased {} connection", kind);

        Self {
            conn,
            statement_cache,
            leased_at: Instant::now(),
            leak_watch,
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self.conn {
            PooledConnection::Postgres(_) => BackendKind::Primary,
            PooledConnection::Sqlite(_) => BackendKind::Fallback,
        }
    }

    pub fn held_for(&self) -> Duration {
        self.leased_at.elapsed()
    }

    /// Whether `sql` would be kept in the prepared statement cache.
    pub fn caches(&self, sql: &str) -> bool {
        self.statement_cache.is_some_and(|cache| cache.admits(sql))
    }

    /// Execute a statement without parameters, returning rows affected.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, StorageError> {
        let persistent = self.caches(sql);
        let rows = match &mut self.conn {
            PooledConnection::Postgres(conn) => {
                sqlx::query(sql)
                    .persistent(persistent)
                    .execute(&mut **conn)
                    .await?
                    .rows_affected()
            }
            PooledConnection::Sqlite(conn) => {
                sqlx::query(sql)
                    .persistent(persistent)
                    .execute(&mut **conn)
                    .await?
                    .rows_affected()
            }
        };
        Ok(rows)
    }

    pub fn as_postgres(&mut self) -> Option<&mut PgConnection> {
        match &mut self.conn {
            PooledConnection::Postgres(conn) => Some(&mut **conn),
            PooledConnection::Sqlite(_) => None,
        }
    }

    pub fn as_sqlite(&mut self) -> Option<&mut SqliteConnection> {
        match &mut self.conn {
            PooledConnection::Sqlite(conn) => Some(&mut **conn),
            PooledConnection::Postgres(_) => None,
        }
    }
}

impl std::fmt::Debug for LeasedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeasedConnection")
            .field("kind", &self.kind())
            .field("held_for", &self.held_for())
            .finish_non_exhaustive()
    }
}

impl Drop for LeasedConnection {
    fn drop(&mut self) {
        self.leak_watch.abort();
        tracing::debug!("Returned {} connection after {:?}", self.kind(), self.held_for());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn fallback_in(dir: &std::path::Path) -> BackendProfile {
        BackendProfile::fallback(&StorageConfig {
            data_dir: dir.to_path_buf(),
            ..StorageConfig::default()
        })
    }

    #[test]
    fn test_default_policy() {
        let policy = PoolPolicy::default();
        assert_eq!(policy.max_size, 10);
        assert_eq!(policy.min_idle, 2);
        assert_eq!(policy.idle_timeout, Duration::from_secs(30));
        assert_eq!(policy.max_lifetime, Duration::from_secs(1800));
        assert_eq!(policy.acquire_timeout, Duration::from_secs(30));
        assert_eq!(policy.validation_query, "SELECT 1");
        assert_eq!(policy.validation_timeout, Duration::from_secs(5));
        assert_eq!(policy.leak_detection_threshold, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_sqlite_pool_build_and_lease() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::build(&fallback_in(dir.path()), &PoolPolicy::default())
            .await
            .unwrap();
        assert_eq!(pool.kind(), BackendKind::Fallback);
        assert!(dir.path().join("runescape_prices.db").exists());

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(conn.kind(), BackendKind::Fallback);
        assert!(!conn.caches("SELECT 1"), "SQLite leases run unprepared");

        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(conn.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(one, 1);
        assert!(conn.as_postgres().is_none());

        drop(conn);
        pool.close().await;
        assert!(pool.status().closed);
    }

    #[tokio::test]
    async fn test_sqlite_connections_keep_no_statements() {
        use sqlx::Connection;

        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::build(&fallback_in(dir.path()), &PoolPolicy::default())
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        for value in [1_i64, 2] {
            let echoed: i64 = sqlx::query_scalar("SELECT ?")
                .bind(value)
                .fetch_one(conn.as_sqlite().unwrap())
                .await
                .unwrap();
            assert_eq!(echoed, value);
        }
        assert_eq!(conn.as_sqlite().unwrap().cached_statements_size(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::build(&fallback_in(dir.path()), &PoolPolicy::default())
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(conn.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[tokio::test]
    async fn test_pool_build_fails_on_unusable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let result =
            ConnectionPool::build(&fallback_in(&blocker.join("data")), &PoolPolicy::default())
                .await;

        assert!(matches!(
            result,
            Err(StorageError::PoolInit {
                backend: BackendKind::Fallback,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_leak_detection_counts_long_leases() {
        let dir = tempfile::tempdir().unwrap();
        let policy = PoolPolicy {
            leak_detection_threshold: Duration::from_millis(50),
            ..PoolPolicy::default()
        };
        let pool = ConnectionPool::build(&fallback_in(dir.path()), &policy)
            .await
            .unwrap();

        let quick = pool.acquire().await.unwrap();
        drop(quick);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.status().leaks_detected, 0);

        let held = pool.acquire().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.status().leaks_detected, 1);

        // Detected, not reclaimed
        assert!(held.held_for() >= Duration::from_millis(150));
        drop(held);
    }

    #[test]
    fn test_validation_keeps_healthy_connection() {
        let outcome = validation_outcome::<()>(Ok(Ok(())), Duration::from_secs(5));
        assert!(matches!(outcome, Ok(true)));
    }

    #[test]
    fn test_validation_discards_failed_connection() {
        let outcome = validation_outcome::<()>(
            Ok(Err(sqlx::Error::Protocol("connection reset".into()))),
            Duration::from_secs(5),
        );
        assert!(matches!(outcome, Ok(false)));
    }

    #[tokio::test]
    async fn test_validation_discards_slow_connection() {
        let elapsed = tokio::time::timeout(
            Duration::ZERO,
            std::future::pending::<Result<(), sqlx::Error>>(),
        )
        .await;
        assert!(elapsed.is_err());

        let outcome = validation_outcome(elapsed, Duration::ZERO);
        assert!(matches!(outcome, Ok(false)));
    }
}
