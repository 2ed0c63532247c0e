use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Item catalogue; other tables reference it by id but carry no foreign keys
        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Items::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Items::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Items::Description).text())
                    .col(ColumnDef::new(Items::IconUrl).string_len(255))
                    .col(ColumnDef::new(Items::IsMembersOnly).boolean())
                    .col(ColumnDef::new(Items::LowAlchemyValue).integer())
                    .col(ColumnDef::new(Items::HighAlchemyValue).integer())
                    .col(ColumnDef::new(Items::ShopValue).integer())
                    .col(ColumnDef::new(Items::GrandExchangeLimit).integer())
                    .col(
                        ColumnDef::new(Items::LastUpdated)
                            .timestamp()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        tracing::info!("items table ready");
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Items::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Items {
    Table,
    Id,
    Name,
    Description,
    IconUrl,
    IsMembersOnly,
    LowAlchemyValue,
    HighAlchemyValue,
    ShopValue,
    GrandExchangeLimit,
    LastUpdated,
}
