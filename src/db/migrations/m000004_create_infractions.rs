use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Infractions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Infractions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Infractions::GuildId).big_integer().not_null())
                    .col(ColumnDef::new(Infractions::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Infractions::ActorId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Infractions::InfractionType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Infractions::Reason).text())
                    .col(ColumnDef::new(Infractions::InsertedAt).date_time().not_null())
                    .col(ColumnDef::new(Infractions::LastApplied).date_time().not_null())
                    .col(ColumnDef::new(Infractions::ExpiresAt).date_time())
                    .col(
                        ColumnDef::new(Infractions::Active)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Infractions::Hidden)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Infractions::DmSent).boolean())
                    .col(ColumnDef::new(Infractions::JumpUrl).string())
                    .to_owned(),
            )
            .await?;

        // Index for the expiry runner
        manager
            .create_index(
                Index::create()
                    .name("idx-infractions-active-expires-at")
                    .table(Infractions::Table)
                    .col(Infractions::Active)
                    .col(Infractions::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-infractions-guild-user")
                    .table(Infractions::Table)
                    .col(Infractions::GuildId)
                    .col(Infractions::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Infractions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Infractions {
    Table,
    Id,
    GuildId,
    UserId,
    ActorId,
    InfractionType,
    Reason,
    InsertedAt,
    LastApplied,
    ExpiresAt,
    Active,
    Hidden,
    DmSent,
    JumpUrl,
}
