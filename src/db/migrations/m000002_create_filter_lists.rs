use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FilterLists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FilterLists::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FilterLists::GuildId).big_integer().not_null())
                    .col(ColumnDef::new(FilterLists::Name).string_len(32).not_null())
                    .col(ColumnDef::new(FilterLists::ListType).string_len(16).not_null())
                    .col(
                        ColumnDef::new(FilterLists::Settings)
                            .json()
                            .not_null()
                            .default("{}"),
                    )
                    .col(ColumnDef::new(FilterLists::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(FilterLists::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        // One list of each type per guild and filter kind
        manager
            .create_index(
                Index::create()
                    .name("idx-filter-lists-guild-name-type-unique")
                    .table(FilterLists::Table)
                    .col(FilterLists::GuildId)
                    .col(FilterLists::Name)
                    .col(FilterLists::ListType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FilterLists::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum FilterLists {
    Table,
    Id,
    GuildId,
    Name,
    ListType,
    Settings,
    CreatedAt,
    UpdatedAt,
}
