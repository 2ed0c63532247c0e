use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per item per fetch; `timestamp` is the fetch time
        manager
            .create_table(
                Table::create()
                    .table(LatestPrices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LatestPrices::ItemId).integer().not_null())
                    .col(ColumnDef::new(LatestPrices::HighPrice).big_integer())
                    .col(ColumnDef::new(LatestPrices::HighPriceTime).big_integer())
                    .col(ColumnDef::new(LatestPrices::LowPrice).big_integer())
                    .col(ColumnDef::new(LatestPrices::LowPriceTime).big_integer())
                    .col(ColumnDef::new(LatestPrices::HighPriceVolume).big_integer())
                    .col(ColumnDef::new(LatestPrices::LowPriceVolume).big_integer())
                    .col(
                        ColumnDef::new(LatestPrices::Timestamp)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(LatestPrices::ItemId)
                            .col(LatestPrices::Timestamp),
                    )
                    .to_owned(),
            )
            .await?;

        tracing::info!("latest_prices table ready");
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(LatestPrices::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum LatestPrices {
    Table,
    ItemId,
    HighPrice,
    HighPriceTime,
    LowPrice,
    LowPriceTime,
    HighPriceVolume,
    LowPriceVolume,
    Timestamp,
}
