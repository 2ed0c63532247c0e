//! Backend selection.
//!
//! The prober's answer picks exactly one [`BackendProfile`] per process.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{DB_NAME, StorageConfig};
use crate::storage::prober::BackendProber;

/// Service account on the primary backend.
const PRIMARY_USERNAME: &str = "admin";
const PRIMARY_PASSWORD: &str = "elfe";

/// Prepared statement cache used on the primary backend.
pub const PRIMARY_STATEMENT_CACHE: StatementCache = StatementCache {
    capacity: 250,
    max_sql_len: 2048,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// PostgreSQL server
    Primary,
    /// Embedded SQLite file
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Primary => write!(f, "PostgreSQL"),
            BackendKind::Fallback => write!(f, "SQLite"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Bounds for server-side prepared statement caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementCache {
    /// Statements kept per connection
    pub capacity: usize,
    /// Longer statements are executed unprepared
    pub max_sql_len: usize,
}

impl StatementCache {
    pub fn admits(&self, sql: &str) -> bool {
        sql.len() <= self.max_sql_len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendProfile {
    Primary {
        host: String,
        port: u16,
        database: String,
        credentials: Credentials,
        statement_cache: StatementCache,
    },
    Fallback {
        data_dir: PathBuf,
        database: String,
    },
}

impl BackendProfile {
    pub fn primary(config: &StorageConfig) -> Self {
        Self::Primary {
            host: config.host.clone(),
            port: config.port,
            database: DB_NAME.to_string(),
            credentials: Credentials::new(PRIMARY_USERNAME, PRIMARY_PASSWORD),
            statement_cache: PRIMARY_STATEMENT_CACHE,
        }
    }

    pub fn fallback(config: &StorageConfig) -> Self {
        Self::Fallback {
            data_dir: config.data_dir.clone(),
            database: DB_NAME.to_string(),
        }
    }

    /// Probe the primary backend once and pick the matching profile.
    ///
    /// On fallback the data directory is created if missing. A creation
    /// failure is logged, not returned; opening the pool will report it.
    pub async fn select(config: &StorageConfig, prober: &dyn BackendProber) -> Self {
        if prober
            .probe(&config.host, config.port, config.probe_timeout)
            .await
        {
            let profile = Self::primary(config);
            tracing::info!("Using PostgreSQL database at {}", profile.connection_url());
            profile
        } else {
            tracing::info!("PostgreSQL not available, falling back to SQLite database");
            ensure_data_dir(&config.data_dir).await;
            Self::fallback(config)
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            BackendProfile::Primary { .. } => BackendKind::Primary,
            BackendProfile::Fallback { .. } => BackendKind::Fallback,
        }
    }

    /// Connection URL without credentials, safe to log.
    pub fn connection_url(&self) -> String {
        match self {
            BackendProfile::Primary {
                host,
                port,
                database,
                ..
            } => format!("postgres://{host}:{port}/{database}"),
            BackendProfile::Fallback { .. } => {
                // database_file() is always Some for the fallback variant
                let file = self.database_file().unwrap_or_default();
                format!("sqlite://{}?mode=rwc", file.display())
            }
        }
    }

    /// Database file of the embedded backend.
    pub fn database_file(&self) -> Option<PathBuf> {
        match self {
            BackendProfile::Fallback { data_dir, database } => {
                Some(data_dir.join(format!("{database}.db")))
            }
            BackendProfile::Primary { .. } => None,
        }
    }

    pub fn statement_cache(&self) -> Option<StatementCache> {
        match self {
            BackendProfile::Primary {
                statement_cache, ..
            } => Some(*statement_cache),
            BackendProfile::Fallback { .. } => None,
        }
    }
}

async fn ensure_data_dir(dir: &Path) {
    if tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
        return;
    }

    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => tracing::info!("Created data directory for SQLite: {}", dir.display()),
        Err(e) => tracing::error!(
            "Failed to create data directory for SQLite {}: {}",
            dir.display(),
            e
        ),
    }
}
