//! Storage error types.
//!
//! Startup failures (`PoolInit`, `SchemaInit`) are fatal to the process;
//! `ConnectionUnavailable` is recoverable and left to the caller to retry.

use std::time::Duration;

use thiserror::Error;

use crate::storage::profile::BackendKind;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No connection could be established for the selected backend.
    #[error("failed to build connection pool for {backend} backend: {source}")]
    PoolInit {
        backend: BackendKind,
        #[source]
        source: sqlx::Error,
    },

    /// A schema statement failed.
    #[error("failed to initialize database schema: {0}")]
    SchemaInit(#[source] sea_orm::DbErr),

    /// The pool could not hand out a connection.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(Unavailable),

    /// Statement execution on a leased connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Why a connection could not be leased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unavailable {
    #[error("pool exhausted, no connection returned within {0:?}")]
    TimedOut(Duration),

    #[error("pool is shut down")]
    Closed,
}
