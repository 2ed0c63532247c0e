//! Schema bootstrap.
//!
//! Runs the migration set from the `migration` crate. Every migration is
//! itself idempotent, so a database created without the migration
//! bookkeeping table is adopted rather than rejected.

use migration::{Migrator, TABLES};
use sea_orm::{DatabaseConnection, DbErr};
use sea_orm_migration::{MigratorTrait, SchemaManager};

use crate::error::StorageError;

/// Create or migrate the schema. Safe to run against a database holding
/// some, all or none of the tables.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), StorageError> {
    tracing::info!("Initializing database schema");

    Migrator::up(db, None)
        .await
        .map_err(StorageError::SchemaInit)?;

    let missing = missing_tables(db).await.map_err(StorageError::SchemaInit)?;
    if !missing.is_empty() {
        return Err(StorageError::SchemaInit(DbErr::Custom(format!(
            "tables missing after migration: {}",
            missing.join(", ")
        ))));
    }

    tracing::info!("Database schema initialized successfully");
    Ok(())
}

/// Required tables not present in the database.
pub async fn missing_tables(db: &DatabaseConnection) -> Result<Vec<&'static str>, DbErr> {
    let manager = SchemaManager::new(db);
    let mut missing = Vec::new();
    for table in TABLES {
        if !manager.has_table(table).await? {
            missing.push(table);
        }
    }
    Ok(missing)
}
