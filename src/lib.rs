// src/lib.rs

//! Storage bootstrap for the price tracker.
//!
//! Picks PostgreSQL when it answers and an embedded SQLite file otherwise,
//! builds the connection pool and brings the schema up to date before anyone
//! else touches the database.

pub mod config;
pub mod error;

pub mod storage {
    pub mod facade;
    pub mod pool;
    pub mod prober;
    pub mod profile;
    pub mod schema;
}

pub use config::StorageConfig;
pub use error::{StorageError, Unavailable};
pub use storage::facade::{Storage, StorageCell};
pub use storage::pool::{LeasedConnection, PoolPolicy, PoolStatus};
pub use storage::prober::{BackendProber, TcpProber};
pub use storage::profile::{BackendKind, BackendProfile};
