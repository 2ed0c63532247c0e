use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Predictions written by the forecasting pipeline and verified later.
        // The (item_id, prediction_type) uniqueness is added by the fix migration
        // so that tables created before it get the same constraint.
        manager
            .create_table(
                Table::create()
                    .table(PricePredictions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PricePredictions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PricePredictions::ItemId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePredictions::PredictionType)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePredictions::PredictedHighPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePredictions::PredictedLowPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePredictions::PredictionTime)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PricePredictions::ActualHighPrice).double())
                    .col(ColumnDef::new(PricePredictions::ActualLowPrice).double())
                    .col(ColumnDef::new(PricePredictions::VerificationTime).timestamp())
                    .col(ColumnDef::new(PricePredictions::AccuracyPercent).double())
                    .col(
                        ColumnDef::new(PricePredictions::IsVerified)
                            .boolean()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        tracing::info!("price_predictions table ready");
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(PricePredictions::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum PricePredictions {
    Table,
    Id,
    ItemId,
    PredictionType,
    PredictedHighPrice,
    PredictedLowPrice,
    PredictionTime,
    ActualHighPrice,
    ActualLowPrice,
    VerificationTime,
    AccuracyPercent,
    IsVerified,
}
