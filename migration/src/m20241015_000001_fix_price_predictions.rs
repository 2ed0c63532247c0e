use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

use crate::catalog;

/// Name of the (item_id, prediction_type) uniqueness constraint.
pub const UNIQUE_ITEM_PREDICTION_TYPE: &str = "uq_price_predictions_item_type";

const TABLE: &str = "price_predictions";

/// Price columns that early deployments created as INTEGER.
const PRICE_COLUMNS: [&str; 5] = [
    "predicted_high_price",
    "predicted_low_price",
    "actual_high_price",
    "actual_low_price",
    "accuracy_percent",
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();

        // Step 1: broaden integer price columns to double precision.
        // SQLite stores REAL values in any column affinity without truncation,
        // so only PostgreSQL needs the rewrite.
        if backend == DbBackend::Postgres {
            for column in PRICE_COLUMNS {
                match catalog::postgres_column_type(manager, TABLE, column).await? {
                    Some(data_type) if data_type == "double precision" => {}
                    Some(data_type) => {
                        tracing::info!(
                            "Broadening {}.{} from {} to double precision",
                            TABLE,
                            column,
                            data_type
                        );
                        manager
                            .get_connection()
                            .execute_unprepared(&format!(
                                "ALTER TABLE {TABLE} ALTER COLUMN {column} TYPE DOUBLE PRECISION"
                            ))
                            .await?;
                    }
                    None => {
                        return Err(DbErr::Custom(format!(
                            "column {TABLE}.{column} is missing"
                        )));
                    }
                }
            }
        }

        // Step 2: at most one prediction per item per horizon
        if catalog::has_unique_constraint(manager, TABLE, UNIQUE_ITEM_PREDICTION_TYPE).await? {
            tracing::debug!("{} already present", UNIQUE_ITEM_PREDICTION_TYPE);
            return Ok(());
        }

        match backend {
            DbBackend::Postgres => {
                manager
                    .get_connection()
                    .execute_unprepared(&format!(
                        "ALTER TABLE {TABLE} ADD CONSTRAINT {UNIQUE_ITEM_PREDICTION_TYPE} \
                         UNIQUE (item_id, prediction_type)"
                    ))
                    .await?;
            }
            DbBackend::Sqlite => {
                // SQLite cannot add table constraints after creation; a unique
                // index enforces the same rule.
                manager
                    .create_index(
                        Index::create()
                            .name(UNIQUE_ITEM_PREDICTION_TYPE)
                            .table(PricePredictions::Table)
                            .col(PricePredictions::ItemId)
                            .col(PricePredictions::PredictionType)
                            .unique()
                            .to_owned(),
                    )
                    .await?;
            }
            other => return Err(catalog::unsupported(other)),
        }

        tracing::info!("Added {} on {}", UNIQUE_ITEM_PREDICTION_TYPE, TABLE);
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Column types stay broadened; narrowing would truncate stored prices
        match manager.get_database_backend() {
            DbBackend::Postgres => {
                manager
                    .get_connection()
                    .execute_unprepared(&format!(
                        "ALTER TABLE {TABLE} DROP CONSTRAINT IF EXISTS {UNIQUE_ITEM_PREDICTION_TYPE}"
                    ))
                    .await?;
            }
            _ => {
                manager
                    .drop_index(
                        Index::drop()
                            .name(UNIQUE_ITEM_PREDICTION_TYPE)
                            .table(PricePredictions::Table)
                            .if_exists()
                            .to_owned(),
                    )
                    .await?;
            }
        }

        Ok(())
    }
}

#[derive(DeriveIden)]
enum PricePredictions {
    Table,
    ItemId,
    PredictionType,
}
