use chrono::{Days, Utc};
use sea_orm::Database;

use ledger::{
    BudgetCmd, BudgetKind, CategoryCmd, DebtCmd, DebtDeletePolicy, DebtKind, DebtPaymentCmd,
    EntityKind, Frequency, HistoryAction, HistoryFilter, Ledger, ScheduleCmd, Settings,
    TransactionCmd, TransferCmd, TxKind, TxSource, WalletCmd,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn ledger_with_db() -> Ledger {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Ledger::builder().database(db).build().await.unwrap()
}

async fn new_wallet(ledger: &Ledger, name: &str, opening_minor: i64) -> Uuid {
    let type_id = ledger
        .list_wallet_types()
        .await
        .unwrap()
        .into_iter()
        .find(|ty| ty.name == "Cash")
        .expect("seeded wallet type Cash missing")
        .id;
    ledger
        .create_wallet(WalletCmd::new(name, type_id, "#3f51b5").opening_balance_minor(opening_minor))
        .await
        .unwrap()
}

/// A ledger exercising every table: wallets, a category tree, tags,
/// manual and transfer transactions, a budget, a debt with a payment,
/// a materialized schedule, one binned row, and non-default settings.
async fn populated_ledger() -> Ledger {
    let ledger = ledger_with_db().await;
    let main_id = new_wallet(&ledger, "Main", 1000).await;
    let side_id = new_wallet(&ledger, "Side", 100).await;
    let food_id = ledger.create_category(CategoryCmd::new("Food")).await.unwrap();
    ledger
        .create_sub_category(food_id, CategoryCmd::new("Groceries"))
        .await
        .unwrap();
    let tag_id = ledger.create_tag("Vacation".to_string()).await.unwrap();

    ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 120, main_id, food_id, Utc::now())
                .tags(vec![tag_id])
                .notes("groceries run"),
            TxSource::Manual,
        )
        .await
        .unwrap();
    ledger
        .add_transfer(TransferCmd::new(main_id, side_id, 150, Utc::now()))
        .await
        .unwrap();
    ledger
        .create_budget(BudgetCmd::new("Eating", 500, BudgetKind::Periodic).category_ids(vec![food_id]))
        .await
        .unwrap();
    let debt_id = ledger
        .create_debt(DebtCmd::new("Alice", DebtKind::Debt, 300, main_id, Utc::now()))
        .await
        .unwrap();
    ledger
        .add_debt_payment(debt_id, DebtPaymentCmd::new(100, Utc::now()))
        .await
        .unwrap();

    let now = Utc::now();
    let start = now.date_naive().checked_sub_days(Days::new(2)).unwrap();
    ledger
        .create_schedule(
            ScheduleCmd::new(
                "Rent",
                TxKind::Expense,
                50,
                main_id,
                food_id,
                start,
                Frequency::Daily,
            ),
            now,
        )
        .await
        .unwrap();

    let binned_id = ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 30, side_id, food_id, Utc::now()),
            TxSource::Manual,
        )
        .await
        .unwrap();
    ledger.delete_transaction(binned_id).await.unwrap();

    ledger
        .update_settings(Settings {
            debt_delete_policy: DebtDeletePolicy::Cascade,
        })
        .await
        .unwrap();

    ledger
}

#[tokio::test]
async fn export_import_round_trip() {
    let source = populated_ledger().await;
    let snapshot = source.export_state().await.unwrap();
    assert!(!snapshot.restore_bin.is_empty());

    let target = ledger_with_db().await;
    target.set_state(snapshot.clone()).await.unwrap();
    let round_tripped = target.export_state().await.unwrap();

    assert_eq!(round_tripped.wallet_types, snapshot.wallet_types);
    assert_eq!(round_tripped.wallets, snapshot.wallets);
    assert_eq!(round_tripped.categories, snapshot.categories);
    assert_eq!(round_tripped.tags, snapshot.tags);
    assert_eq!(round_tripped.transactions, snapshot.transactions);
    assert_eq!(round_tripped.budgets, snapshot.budgets);
    assert_eq!(round_tripped.debts, snapshot.debts);
    assert_eq!(round_tripped.schedules, snapshot.schedules);
    assert_eq!(round_tripped.settings, snapshot.settings);
    assert_eq!(round_tripped.restore_bin, snapshot.restore_bin);

    // Import appends exactly one entry on top of the carried history.
    assert_eq!(round_tripped.history.len(), snapshot.history.len() + 1);
    assert_eq!(round_tripped.history[..snapshot.history.len()], snapshot.history[..]);
    assert_eq!(
        round_tripped.history.last().unwrap().action,
        HistoryAction::Import
    );

    // Imported balances line up with the carried transactions.
    assert!(target.verify_balances().await.unwrap().is_empty());
}

#[tokio::test]
async fn import_replaces_existing_content() {
    let source = populated_ledger().await;
    let snapshot = source.export_state().await.unwrap();

    let target = ledger_with_db().await;
    let doomed_id = new_wallet(&target, "Doomed", 7777).await;
    target.create_tag("Doomed tag".to_string()).await.unwrap();

    target.set_state(snapshot.clone()).await.unwrap();

    assert!(target.wallet(doomed_id).await.is_err());
    let names: Vec<String> = target
        .list_wallets()
        .await
        .unwrap()
        .into_iter()
        .map(|wallet| wallet.name)
        .collect();
    assert_eq!(names, vec!["Main".to_string(), "Side".to_string()]);
    let tags = target.list_tags().await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "Vacation");
}

#[tokio::test]
async fn import_records_a_history_entry() {
    let source = populated_ledger().await;
    let snapshot = source.export_state().await.unwrap();

    let target = ledger_with_db().await;
    target.set_state(snapshot.clone()).await.unwrap();

    let imports = target
        .list_history(
            &HistoryFilter {
                entity: None,
                action: Some(HistoryAction::Import),
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].entity, EntityKind::State);
    assert_eq!(imports[0].context, "state");
    assert_eq!(
        imports[0].description,
        format!("imported state with {} transactions", snapshot.transactions.len())
    );
}

#[tokio::test]
async fn settings_persist_and_default() {
    let ledger = ledger_with_db().await;
    assert_eq!(
        ledger.settings().await.unwrap().debt_delete_policy,
        DebtDeletePolicy::Keep
    );

    ledger
        .update_settings(Settings {
            debt_delete_policy: DebtDeletePolicy::Cascade,
        })
        .await
        .unwrap();
    assert_eq!(
        ledger.settings().await.unwrap().debt_delete_policy,
        DebtDeletePolicy::Cascade
    );

    let entries = ledger
        .list_history(
            &HistoryFilter {
                entity: Some(EntityKind::Settings),
                action: Some(HistoryAction::Update),
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn export_timestamps_each_snapshot() {
    let ledger = ledger_with_db().await;
    let first = ledger.export_state().await.unwrap();
    let second = ledger.export_state().await.unwrap();
    assert!(second.exported_at >= first.exported_at);
    // Snapshot content of an untouched ledger is stable.
    assert_eq!(first.wallet_types, second.wallet_types);
    assert_eq!(first.categories, second.categories);
    assert_eq!(first.history, second.history);
}
