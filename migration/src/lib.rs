pub use sea_orm_migration::prelude::*;

pub mod catalog;
mod m20241001_000001_create_items;
mod m20241001_000002_create_timeseries;
mod m20241001_000003_create_cleaned_timeseries;
mod m20241001_000004_create_latest_prices;
mod m20241001_000005_create_price_predictions;
mod m20241015_000001_fix_price_predictions;

pub use m20241015_000001_fix_price_predictions::UNIQUE_ITEM_PREDICTION_TYPE;

/// Tables every deployment must have once `Migrator::up` has run.
pub const TABLES: [&str; 5] = [
    "items",
    "timeseries",
    "cleaned_timeseries",
    "latest_prices",
    "price_predictions",
];

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241001_000001_create_items::Migration),
            Box::new(m20241001_000002_create_timeseries::Migration),
            Box::new(m20241001_000003_create_cleaned_timeseries::Migration),
            Box::new(m20241001_000004_create_latest_prices::Migration),
            Box::new(m20241001_000005_create_price_predictions::Migration),
            Box::new(m20241015_000001_fix_price_predictions::Migration),
        ]
    }
}
