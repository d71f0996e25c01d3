//! Debts and loans.
//!
//! Creates the `debts` table, adds the loose `debt_id` reference to
//! `transactions`, and seeds the `Debts` system category group with its
//! four subcategories (`debt`, `loan`, `debt_payment`, `loan_payment`).

use sea_orm::{ConnectionTrait, DbBackend};
use sea_orm_migration::prelude::*;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Debts {
    Table,
    Id,
    Person,
    Kind,
    InitialAmountMinor,
    PaidAmountMinor,
    StartDate,
    DueDate,
    Status,
    WalletId,
    SourceTransactionId,
    Tags,
    Attachments,
}

#[derive(Iden)]
enum Transactions {
    Table,
    DebtId,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
    NameNorm,
    Icon,
    ParentId,
    SystemKind,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1) Debts table. No FK on wallet_id or source_transaction_id:
        //    both may point at rows that live only in the restore bin.
        manager
            .create_table(
                Table::create()
                    .table(Debts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Debts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Debts::Person).string().not_null())
                    .col(ColumnDef::new(Debts::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Debts::InitialAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Debts::PaidAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Debts::StartDate).timestamp().not_null())
                    .col(ColumnDef::new(Debts::DueDate).date())
                    .col(ColumnDef::new(Debts::Status).string().not_null())
                    .col(ColumnDef::new(Debts::WalletId).string().not_null())
                    .col(
                        ColumnDef::new(Debts::SourceTransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Debts::Tags).string().not_null())
                    .col(ColumnDef::new(Debts::Attachments).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-debts-status")
                    .table(Debts::Table)
                    .col(Debts::Status)
                    .to_owned(),
            )
            .await?;

        // 2) Loose debt reference on transactions. No FK: linked
        //    transactions survive a keep-policy debt delete.
        manager
            .alter_table(
                Table::alter()
                    .table(Transactions::Table)
                    .add_column(ColumnDef::new(Transactions::DebtId).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-debt_id")
                    .table(Transactions::Table)
                    .col(Transactions::DebtId)
                    .to_owned(),
            )
            .await?;

        // 3) Seed the Debts group and its system subcategories.
        let db = manager.get_connection();
        let backend = db.get_database_backend();

        let group_id = Uuid::new_v4().to_string();
        let group = Query::insert()
            .into_table(Categories::Table)
            .columns([
                Categories::Id,
                Categories::Name,
                Categories::NameNorm,
                Categories::Icon,
                Categories::ParentId,
                Categories::SystemKind,
            ])
            .values_panic([
                group_id.clone().into(),
                "Debts".into(),
                normalize_key("Debts").into(),
                "handshake".into(),
                None::<String>.into(),
                "debts".into(),
            ])
            .to_owned();
        db.execute(backend.build(&group)).await?;

        for (name, icon, system_kind) in [
            ("Debt", "arrow-down-circle", "debt"),
            ("Loan", "arrow-up-circle", "loan"),
            ("Debt Payment", "arrow-up", "debt_payment"),
            ("Loan Payment", "arrow-down", "loan_payment"),
        ] {
            let stmt = Query::insert()
                .into_table(Categories::Table)
                .columns([
                    Categories::Id,
                    Categories::Name,
                    Categories::NameNorm,
                    Categories::Icon,
                    Categories::ParentId,
                    Categories::SystemKind,
                ])
                .values_panic([
                    Uuid::new_v4().to_string().into(),
                    name.into(),
                    normalize_key(name).into(),
                    icon.into(),
                    group_id.clone().into(),
                    system_kind.into(),
                ])
                .to_owned();
            db.execute(backend.build(&stmt)).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        if db.get_database_backend() == DbBackend::Sqlite {
            return Err(DbErr::Custom(
                "m20260718_000002_debts is irreversible on SQLite".to_string(),
            ));
        }

        manager
            .alter_table(
                Table::alter()
                    .table(Transactions::Table)
                    .drop_column(Transactions::DebtId)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Debts::Table).to_owned())
            .await?;

        Ok(())
    }
}

fn normalize_key(input: &str) -> String {
    let mut out = String::new();
    let mut prev_space = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    out.trim().to_string()
}
