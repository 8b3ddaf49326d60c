use super::m000002_create_filter_lists::FilterLists;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Filters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Filters::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Filters::FilterListId).integer().not_null())
                    .col(ColumnDef::new(Filters::Content).string().not_null())
                    .col(ColumnDef::new(Filters::Description).string())
                    .col(
                        ColumnDef::new(Filters::Settings)
                            .json()
                            .not_null()
                            .default("{}"),
                    )
                    .col(ColumnDef::new(Filters::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Filters::UpdatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-filters-filter-list")
                            .from(Filters::Table, Filters::FilterListId)
                            .to(FilterLists::Table, FilterLists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-filters-list-content-unique")
                    .table(Filters::Table)
                    .col(Filters::FilterListId)
                    .col(Filters::Content)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Filters::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Filters {
    Table,
    Id,
    FilterListId,
    Content,
    Description,
    Settings,
    CreatedAt,
    UpdatedAt,
}
