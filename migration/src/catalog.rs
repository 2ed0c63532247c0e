//! Catalog probes used by migrations that must check before they apply.
//!
//! Neither backend supports `ADD CONSTRAINT IF NOT EXISTS`, so additive fixes
//! look the object up first and only then issue the DDL.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, DbBackend, Statement};

/// Returns true if `table` carries a unique constraint (PostgreSQL) or unique
/// index (SQLite) named `name`.
pub async fn has_unique_constraint(
    manager: &SchemaManager<'_>,
    table: &str,
    name: &str,
) -> Result<bool, DbErr> {
    let backend = manager.get_database_backend();
    let stmt = match backend {
        DbBackend::Postgres => Statement::from_sql_and_values(
            backend,
            r#"
            SELECT 1 FROM information_schema.table_constraints
            WHERE table_schema = current_schema()
              AND table_name = $1
              AND constraint_name = $2
              AND constraint_type = 'UNIQUE'
            "#,
            [table.into(), name.into()],
        ),
        DbBackend::Sqlite => Statement::from_sql_and_values(
            backend,
            "SELECT 1 FROM sqlite_master WHERE type = 'index' AND tbl_name = ? AND name = ?",
            [table.into(), name.into()],
        ),
        other => return Err(unsupported(other)),
    };

    Ok(manager.get_connection().query_one(stmt).await?.is_some())
}

/// Declared data type of `table.column` as PostgreSQL reports it
/// (e.g. `double precision`, `integer`), or `None` if the column is absent.
pub async fn postgres_column_type(
    manager: &SchemaManager<'_>,
    table: &str,
    column: &str,
) -> Result<Option<String>, DbErr> {
    let backend = manager.get_database_backend();
    if backend != DbBackend::Postgres {
        return Err(unsupported(backend));
    }

    let stmt = Statement::from_sql_and_values(
        backend,
        r#"
        SELECT data_type FROM information_schema.columns
        WHERE table_schema = current_schema()
          AND table_name = $1
          AND column_name = $2
        "#,
        [table.into(), column.into()],
    );

    match manager.get_connection().query_one(stmt).await? {
        Some(row) => Ok(Some(row.try_get::<String>("", "data_type")?)),
        None => Ok(None),
    }
}

pub(crate) fn unsupported(backend: DbBackend) -> DbErr {
    DbErr::Custom(format!("catalog probe not supported on {backend:?}"))
}
