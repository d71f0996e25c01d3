//! Scheduled transactions.
//!
//! One row per recurrence definition; the catch-up pass reads rows due
//! by `next_due_date` and `status`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum ScheduledTransactions {
    Table,
    Id,
    Name,
    AmountMinor,
    Kind,
    WalletId,
    CategoryId,
    StartDate,
    Time,
    Frequency,
    EndDate,
    NextDueDate,
    LastRun,
    Status,
    Locked,
    Notify,
    Notes,
    Tags,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // No FK on wallet_id or category_id: a schedule may outlive its
        // wallet or category, and the catch-up pass reports the miss.
        manager
            .create_table(
                Table::create()
                    .table(ScheduledTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::Name)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::Kind)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::WalletId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::CategoryId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::StartDate)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::Time)
                            .time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::Frequency)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduledTransactions::EndDate).date())
                    .col(ColumnDef::new(ScheduledTransactions::NextDueDate).date())
                    .col(ColumnDef::new(ScheduledTransactions::LastRun).date())
                    .col(
                        ColumnDef::new(ScheduledTransactions::Status)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::Locked)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledTransactions::Notify)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduledTransactions::Notes).string())
                    .col(
                        ColumnDef::new(ScheduledTransactions::Tags)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-scheduled_transactions-next_due_date")
                    .table(ScheduledTransactions::Table)
                    .col(ScheduledTransactions::NextDueDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-scheduled_transactions-status")
                    .table(ScheduledTransactions::Table)
                    .col(ScheduledTransactions::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduledTransactions::Table).to_owned())
            .await?;
        Ok(())
    }
}
