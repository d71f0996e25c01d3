//! Audit history and the restore bin.
//!
//! `history` is append-only; delete entries stay `pending` while their
//! entity sits in `restore_bin` and settle on restore or purge.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum History {
    Table,
    Id,
    Timestamp,
    Action,
    Entity,
    EntityId,
    Description,
    Context,
    OldValue,
    NewValue,
    Changes,
    Status,
    RestoreId,
}

#[derive(Iden)]
enum RestoreBin {
    Table,
    Id,
    Entity,
    EntityId,
    DeletedAt,
    Payload,
    OriginActionId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(History::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(History::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(History::Timestamp).timestamp().not_null())
                    .col(ColumnDef::new(History::Action).string().not_null())
                    .col(ColumnDef::new(History::Entity).string().not_null())
                    .col(ColumnDef::new(History::EntityId).string().not_null())
                    .col(ColumnDef::new(History::Description).string().not_null())
                    .col(ColumnDef::new(History::Context).string().not_null())
                    .col(ColumnDef::new(History::OldValue).string())
                    .col(ColumnDef::new(History::NewValue).string())
                    .col(ColumnDef::new(History::Changes).string())
                    .col(ColumnDef::new(History::Status).string().not_null())
                    .col(ColumnDef::new(History::RestoreId).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-history-timestamp")
                    .table(History::Table)
                    .col(History::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-history-action")
                    .table(History::Table)
                    .col(History::Action)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-history-entity")
                    .table(History::Table)
                    .col(History::Entity)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-history-restore_id")
                    .table(History::Table)
                    .col(History::RestoreId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RestoreBin::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RestoreBin::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RestoreBin::Entity).string().not_null())
                    .col(ColumnDef::new(RestoreBin::EntityId).string().not_null())
                    .col(ColumnDef::new(RestoreBin::DeletedAt).timestamp().not_null())
                    .col(ColumnDef::new(RestoreBin::Payload).string().not_null())
                    .col(
                        ColumnDef::new(RestoreBin::OriginActionId)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-restore_bin-deleted_at")
                    .table(RestoreBin::Table)
                    .col(RestoreBin::DeletedAt)
                    .to_owned(),
            )
            .await?;

        // Transfer pairs share an origin action; this is the sibling lookup.
        manager
            .create_index(
                Index::create()
                    .name("idx-restore_bin-origin_action_id")
                    .table(RestoreBin::Table)
                    .col(RestoreBin::OriginActionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RestoreBin::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(History::Table).to_owned())
            .await?;
        Ok(())
    }
}
