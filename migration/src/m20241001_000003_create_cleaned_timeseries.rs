use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Averages after outlier removal are fractional, hence double precision
        manager
            .create_table(
                Table::create()
                    .table(CleanedTimeseries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CleanedTimeseries::ItemId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CleanedTimeseries::TimestampSeconds)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CleanedTimeseries::AverageHighPrice).double())
                    .col(ColumnDef::new(CleanedTimeseries::AverageLowPrice).double())
                    .col(ColumnDef::new(CleanedTimeseries::HighPriceVolume).big_integer())
                    .col(ColumnDef::new(CleanedTimeseries::LowPriceVolume).big_integer())
                    .primary_key(
                        Index::create()
                            .col(CleanedTimeseries::ItemId)
                            .col(CleanedTimeseries::TimestampSeconds),
                    )
                    .to_owned(),
            )
            .await?;

        tracing::info!("cleaned_timeseries table ready");
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(CleanedTimeseries::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum CleanedTimeseries {
    Table,
    ItemId,
    TimestampSeconds,
    AverageHighPrice,
    AverageLowPrice,
    HighPriceVolume,
    LowPriceVolume,
}
