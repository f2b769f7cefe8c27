use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Members::Table)
                .if_not_exists()
                .col(ColumnDef::new(Members::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Members::TelegramId).big_integer().not_null())
                .col(ColumnDef::new(Members::FirstName).string().not_null())
                .col(ColumnDef::new(Members::LastName).string().null())
                .col(ColumnDef::new(Members::Username).string().null())
                .col(
                    ColumnDef::new(Members::JoinedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        // One row per Telegram account
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_members_telegram_id")
                .table(Members::Table)
                .col(Members::TelegramId)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Members::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Members {
    Table,
    Id,
    TelegramId,
    FirstName,
    LastName,
    Username,
    JoinedAt,
}
