//! Storage handle and its one-time initialization.
//!
//! The application's composition root owns a [`StorageCell`] and hands the
//! resulting [`Storage`] to every component that needs the database.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::storage::pool::{ConnectionPool, LeasedConnection, PoolStatus};
use crate::storage::prober::{BackendProber, TcpProber};
use crate::storage::profile::BackendProfile;
use crate::storage::schema;

/// Initialized storage: chosen profile plus a pool over a migrated schema.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

#[derive(Debug)]
struct StorageInner {
    profile: BackendProfile,
    pool: ConnectionPool,
}

impl Storage {
    /// Probe, build the pool and ensure the schema, in that order.
    ///
    /// Any error here is fatal for the process.
    pub async fn initialize(
        config: &StorageConfig,
        prober: &dyn BackendProber,
    ) -> Result<Self, StorageError> {
        let profile = BackendProfile::select(config, prober).await;
        let pool = ConnectionPool::build(&profile, &config.pool).await?;

        if let Err(e) = schema::ensure_schema(&pool.database()).await {
            tracing::error!("Failed to initialize database schema: {}", e);
            pool.close().await;
            return Err(e);
        }

        tracing::info!("Storage ready on {}", profile.kind());
        Ok(Self {
            inner: Arc::new(StorageInner { profile, pool }),
        })
    }

    /// Borrow a connection. Fails with `ConnectionUnavailable` when the pool
    /// stays exhausted past the acquire timeout or has been shut down.
    pub async fn acquire(&self) -> Result<LeasedConnection, StorageError> {
        self.inner.pool.acquire().await
    }

    /// Close the pool. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.inner.pool.close().await;
    }

    pub fn profile(&self) -> &BackendProfile {
        &self.inner.profile
    }

    pub fn status(&self) -> PoolStatus {
        self.inner.pool.status()
    }
}

/// Initializes [`Storage`] at most once, however many callers race for it.
pub struct StorageCell {
    config: StorageConfig,
    prober: Box<dyn BackendProber>,
    cell: OnceCell<Storage>,
}

impl StorageCell {
    pub fn new(config: StorageConfig) -> Self {
        Self::with_prober(config, TcpProber)
    }

    pub fn with_prober(config: StorageConfig, prober: impl BackendProber + 'static) -> Self {
        Self {
            config,
            prober: Box::new(prober),
            cell: OnceCell::new(),
        }
    }

    /// The storage, initializing it on first call.
    ///
    /// A failed initialization leaves the cell empty, so every caller waiting
    /// on it, and every later call, runs the whole selection, pool and schema
    /// sequence again. Callers are expected to abort rather than retry.
    pub async fn get_instance(&self) -> Result<&Storage, StorageError> {
        self.cell
            .get_or_try_init(|| Storage::initialize(&self.config, self.prober.as_ref()))
            .await
    }

    /// The storage if it has already been initialized.
    pub fn get(&self) -> Option<&Storage> {
        self.cell.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingProber {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BackendProber for CountingProber {
        async fn probe(&self, _host: &str, _port: u16, _timeout: Duration) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Widen the window for racing first callers
            tokio::time::sleep(Duration::from_millis(50)).await;
            false
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_initializes_once() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let config = StorageConfig {
            data_dir: dir.path().join("data"),
            ..StorageConfig::default()
        };
        let cell = Arc::new(StorageCell::with_prober(
            config,
            CountingProber {
                calls: Arc::clone(&calls),
            },
        ));
        assert!(cell.get().is_none());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cell = Arc::clone(&cell);
            handles.push(tokio::spawn(async move {
                let storage = cell.get_instance().await.unwrap();
                Arc::as_ptr(&storage.inner) as usize
            }));
        }

        let mut instances = Vec::new();
        for handle in handles {
            instances.push(handle.await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(instances.len(), 16);
        assert!(instances.iter().all(|p| *p == instances[0]));

        let storage = cell.get().unwrap();
        storage.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_initialization_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let config = StorageConfig {
            data_dir: blocker.join("data"),
            ..StorageConfig::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let cell = StorageCell::with_prober(
            config,
            CountingProber {
                calls: Arc::clone(&calls),
            },
        );

        let result = cell.get_instance().await;

        assert!(matches!(result, Err(StorageError::PoolInit { .. })));
        assert!(cell.get().is_none());

        // Nothing is cached after a failure; the next call starts over
        let result = cell.get_instance().await;
        assert!(matches!(result, Err(StorageError::PoolInit { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
