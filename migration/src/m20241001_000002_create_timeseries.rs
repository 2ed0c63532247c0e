use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Raw timeseries as reported by the price feed (whole coins)
        manager
            .create_table(
                Table::create()
                    .table(Timeseries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Timeseries::ItemId).integer().not_null())
                    .col(
                        ColumnDef::new(Timeseries::TimestampSeconds)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Timeseries::AverageHighPrice).big_integer())
                    .col(ColumnDef::new(Timeseries::AverageLowPrice).big_integer())
                    .col(ColumnDef::new(Timeseries::HighPriceVolume).big_integer())
                    .col(ColumnDef::new(Timeseries::LowPriceVolume).big_integer())
                    .primary_key(
                        Index::create()
                            .col(Timeseries::ItemId)
                            .col(Timeseries::TimestampSeconds),
                    )
                    .to_owned(),
            )
            .await?;

        tracing::info!("timeseries table ready");
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Timeseries::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Timeseries {
    Table,
    ItemId,
    TimestampSeconds,
    AverageHighPrice,
    AverageLowPrice,
    HighPriceVolume,
    LowPriceVolume,
}
