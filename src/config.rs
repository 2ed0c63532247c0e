//! Storage configuration.
//!
//! Only the probe target and the fallback location come from the environment.
//! Database name, credentials and pool policy are fixed.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::storage::pool::PoolPolicy;

/// Database name on both backends.
pub const DB_NAME: &str = "runescape_prices";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Primary backend host, also the probe target
    pub host: String,
    pub port: u16,
    /// Directory holding the embedded fallback database
    pub data_dir: PathBuf,
    pub probe_timeout: Duration,
    pub pool: PoolPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            pool: PoolPolicy::default(),
        }
    }
}

impl StorageConfig {
    /// Read `DB_HOST`, `DB_PORT`, `DB_DATA_DIR` and `DB_PROBE_TIMEOUT_MS`.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = env::var("DB_HOST").unwrap_or(defaults.host);
        let port = parse_or("DB_PORT", env::var("DB_PORT").ok(), defaults.port);
        let data_dir = env::var("DB_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let probe_timeout_ms = parse_or(
            "DB_PROBE_TIMEOUT_MS",
            env::var("DB_PROBE_TIMEOUT_MS").ok(),
            DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
        );

        Self {
            host,
            port,
            data_dir,
            probe_timeout: Duration::from_millis(probe_timeout_ms),
            pool: defaults.pool,
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match raw {
        None => default,
        Some(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Invalid {} value '{}', using {}", key, value, default);
                default
            }
        },
    }
}
