pub mod m000001_create_guild_table;
pub mod m000002_create_filter_lists;
pub mod m000003_create_filters;
pub mod m000004_create_infractions;

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m000001_create_guild_table::Migration),
            Box::new(m000002_create_filter_lists::Migration),
            Box::new(m000003_create_filters::Migration),
            Box::new(m000004_create_infractions::Migration),
        ]
    }
}
