#![allow(dead_code)]

use async_trait::async_trait;
use price_storage::{BackendProber, PoolPolicy, Storage, StorageConfig};
use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Prober with a fixed answer that counts how often it was asked.
#[derive(Default)]
pub struct FixedProber {
    pub reachable: bool,
    pub calls: AtomicUsize,
}

impl FixedProber {
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendProber for FixedProber {
    async fn probe(&self, _host: &str, _port: u16, _timeout: Duration) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reachable
    }
}

/// Config whose fallback database lives under `dir/data`.
pub fn fallback_config(dir: &Path) -> StorageConfig {
    StorageConfig {
        data_dir: dir.join("data"),
        ..StorageConfig::default()
    }
}

/// Set up storage on the embedded backend inside `dir`
pub async fn setup_fallback_storage(dir: &Path, pool: PoolPolicy) -> Storage {
    let config = StorageConfig {
        pool,
        ..fallback_config(dir)
    };
    Storage::initialize(&config, &FixedProber::unreachable())
        .await
        .expect("Failed to initialize fallback storage")
}

/// Config for a PostgreSQL test server, from TEST_DB_HOST / TEST_DB_PORT.
/// Returns None when no test server is configured.
pub fn postgres_config() -> Option<StorageConfig> {
    let host = env::var("TEST_DB_HOST").ok()?;
    let port = env::var("TEST_DB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5432);

    Some(StorageConfig {
        host,
        port,
        ..StorageConfig::default()
    })
}
