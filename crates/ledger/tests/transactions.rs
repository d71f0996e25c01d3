use chrono::{Days, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use ledger::{
    Ledger, LedgerError, SystemCategory, TransactionCmd, TransactionListFilter, TransferCmd,
    TxKind, TxSource, UpdateTransactionCmd, WalletCmd,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn ledger_with_db() -> (Ledger, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder().database(db.clone()).build().await.unwrap();
    (ledger, db)
}

async fn ledger_with_file_db() -> (Ledger, DatabaseConnection, String, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("ledger_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder().database(db.clone()).build().await.unwrap();

    (ledger, db, url, path)
}

async fn cash_type_id(ledger: &Ledger) -> Uuid {
    ledger
        .list_wallet_types()
        .await
        .unwrap()
        .into_iter()
        .find(|ty| ty.name == "Cash")
        .expect("seeded wallet type Cash missing")
        .id
}

async fn uncategorized_id(ledger: &Ledger) -> Uuid {
    ledger
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .find(|category| category.system_kind == Some(SystemCategory::Uncategorized))
        .expect("seeded uncategorized category missing")
        .id
}

async fn new_wallet(ledger: &Ledger, name: &str, opening_minor: i64) -> Uuid {
    let type_id = cash_type_id(ledger).await;
    ledger
        .create_wallet(WalletCmd::new(name, type_id, "#4caf50").opening_balance_minor(opening_minor))
        .await
        .unwrap()
}

#[tokio::test]
async fn migration_seeds_wallet_types_and_system_categories() {
    let (ledger, _db) = ledger_with_db().await;

    let types = ledger.list_wallet_types().await.unwrap();
    assert_eq!(types.len(), 5);
    assert!(types.iter().any(|ty| ty.name == "Cash"));

    let categories = ledger.list_categories().await.unwrap();
    assert!(categories
        .iter()
        .any(|c| c.system_kind == Some(SystemCategory::Transfer)));
    assert!(categories
        .iter()
        .any(|c| c.system_kind == Some(SystemCategory::Uncategorized)));

    // The debt group root carries the four payment/origin subcategories.
    let group = categories
        .iter()
        .find(|c| c.system_kind == Some(SystemCategory::Debts))
        .expect("debts group missing");
    let children: Vec<_> = categories
        .iter()
        .filter(|c| c.parent_id == Some(group.id))
        .collect();
    assert_eq!(children.len(), 4);
    assert!(children
        .iter()
        .any(|c| c.system_kind == Some(SystemCategory::DebtPayment)));
}

#[tokio::test]
async fn opening_balance_becomes_system_transaction() {
    let (ledger, _db) = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main", 1000).await;

    let wallet = ledger.wallet(wallet_id).await.unwrap();
    assert_eq!(wallet.balance, 1000);

    let transactions = ledger
        .list_transactions(&TransactionListFilter::default(), 10)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].kind, TxKind::Income);
    assert_eq!(transactions[0].amount_minor, 1000);
    assert_eq!(transactions[0].source, TxSource::System);
    assert_eq!(transactions[0].notes.as_deref(), Some("Opening balance"));
}

#[tokio::test]
async fn expense_moves_balance_and_delete_restore_round_trips() {
    let (ledger, _db) = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main", 1000).await;
    let category_id = uncategorized_id(&ledger).await;

    let tx_id = ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 200, wallet_id, category_id, Utc::now())
                .notes("Lunch"),
            TxSource::Manual,
        )
        .await
        .unwrap();
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 800);

    let before = ledger.transaction(tx_id).await.unwrap();

    // Soft delete reverts the balance effect and stages the row.
    let restore_id = ledger.delete_transaction(tx_id).await.unwrap();
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 1000);
    assert_eq!(ledger.list_bin().await.unwrap().len(), 1);
    assert_eq!(
        ledger.transaction(tx_id).await.unwrap_err(),
        LedgerError::NotFound("transaction not exists".to_string())
    );

    // Restore re-applies it unchanged.
    let entity_id = ledger.restore_from_bin(restore_id).await.unwrap();
    assert_eq!(entity_id, tx_id);
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 800);
    assert!(ledger.list_bin().await.unwrap().is_empty());
    assert_eq!(ledger.transaction(tx_id).await.unwrap(), before);
}

#[tokio::test]
async fn transfer_creates_symmetric_pair() {
    let (ledger, _db) = ledger_with_db().await;
    let from_id = new_wallet(&ledger, "Main", 500).await;
    let to_id = new_wallet(&ledger, "Savings", 100).await;

    let (outgoing_id, incoming_id) = ledger
        .add_transfer(TransferCmd::new(from_id, to_id, 150, Utc::now()))
        .await
        .unwrap();

    assert_eq!(ledger.wallet(from_id).await.unwrap().balance, 350);
    assert_eq!(ledger.wallet(to_id).await.unwrap().balance, 250);

    let outgoing = ledger.transaction(outgoing_id).await.unwrap();
    let incoming = ledger.transaction(incoming_id).await.unwrap();
    assert_eq!(outgoing.kind, TxKind::Expense);
    assert_eq!(incoming.kind, TxKind::Income);
    assert_eq!(outgoing.amount_minor, incoming.amount_minor);
    assert_eq!(outgoing.transfer_id, Some(incoming_id));
    assert_eq!(incoming.transfer_id, Some(outgoing_id));

    let transfer_category = ledger
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.system_kind == Some(SystemCategory::Transfer))
        .unwrap();
    assert_eq!(outgoing.category_id, transfer_category.id);
    assert_eq!(incoming.category_id, transfer_category.id);
}

#[tokio::test]
async fn transfer_to_same_wallet_rejected() {
    let (ledger, _db) = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main", 500).await;

    let err = ledger
        .add_transfer(TransferCmd::new(wallet_id, wallet_id, 10, Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Validation("from_wallet_id and to_wallet_id must differ".to_string())
    );
}

#[tokio::test]
async fn transfer_sides_reject_structural_edits() {
    let (ledger, _db) = ledger_with_db().await;
    let from_id = new_wallet(&ledger, "Main", 500).await;
    let to_id = new_wallet(&ledger, "Savings", 0).await;
    let (outgoing_id, _incoming_id) = ledger
        .add_transfer(TransferCmd::new(from_id, to_id, 150, Utc::now()))
        .await
        .unwrap();

    let err = ledger
        .update_transaction(outgoing_id, UpdateTransactionCmd::new().amount_minor(200))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Validation("transfer sides cannot change amount, kind or wallet".to_string())
    );

    // Neutral fields stay editable.
    ledger
        .update_transaction(outgoing_id, UpdateTransactionCmd::new().notes("moved savings"))
        .await
        .unwrap();
    let outgoing = ledger.transaction(outgoing_id).await.unwrap();
    assert_eq!(outgoing.notes.as_deref(), Some("moved savings"));
    assert_eq!(outgoing.amount_minor, 150);
}

#[tokio::test]
async fn deleting_one_transfer_side_stages_both() {
    let (ledger, _db) = ledger_with_db().await;
    let from_id = new_wallet(&ledger, "Main", 500).await;
    let to_id = new_wallet(&ledger, "Savings", 100).await;
    let (outgoing_id, incoming_id) = ledger
        .add_transfer(TransferCmd::new(from_id, to_id, 150, Utc::now()))
        .await
        .unwrap();

    let restore_id = ledger.delete_transaction(outgoing_id).await.unwrap();
    assert_eq!(ledger.wallet(from_id).await.unwrap().balance, 500);
    assert_eq!(ledger.wallet(to_id).await.unwrap().balance, 100);
    assert_eq!(ledger.list_bin().await.unwrap().len(), 2);

    // One restore call brings the pair back together.
    ledger.restore_from_bin(restore_id).await.unwrap();
    assert_eq!(ledger.wallet(from_id).await.unwrap().balance, 350);
    assert_eq!(ledger.wallet(to_id).await.unwrap().balance, 250);
    assert!(ledger.list_bin().await.unwrap().is_empty());
    assert!(ledger.transaction(incoming_id).await.is_ok());
}

#[tokio::test]
async fn update_transaction_rebalances_both_wallets() {
    let (ledger, _db) = ledger_with_db().await;
    let first_id = new_wallet(&ledger, "Main", 1000).await;
    let second_id = new_wallet(&ledger, "Savings", 0).await;
    let category_id = uncategorized_id(&ledger).await;

    let tx_id = ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 100, first_id, category_id, Utc::now()),
            TxSource::Manual,
        )
        .await
        .unwrap();
    assert_eq!(ledger.wallet(first_id).await.unwrap().balance, 900);

    ledger
        .update_transaction(
            tx_id,
            UpdateTransactionCmd::new().amount_minor(250).wallet_id(second_id),
        )
        .await
        .unwrap();

    assert_eq!(ledger.wallet(first_id).await.unwrap().balance, 1000);
    assert_eq!(ledger.wallet(second_id).await.unwrap().balance, -250);
    let transaction = ledger.transaction(tx_id).await.unwrap();
    assert_eq!(transaction.amount_minor, 250);
    assert_eq!(transaction.wallet_id, second_id);
}

#[tokio::test]
async fn non_positive_amounts_rejected() {
    let (ledger, _db) = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main", 100).await;
    let category_id = uncategorized_id(&ledger).await;

    let err = ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 0, wallet_id, category_id, Utc::now()),
            TxSource::Manual,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Validation("amount_minor must be > 0".to_string())
    );

    let tx_id = ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 10, wallet_id, category_id, Utc::now()),
            TxSource::Manual,
        )
        .await
        .unwrap();
    let err = ledger
        .update_transaction(tx_id, UpdateTransactionCmd::new().amount_minor(-5))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Validation("amount_minor must be > 0".to_string())
    );
}

#[tokio::test]
async fn duplicate_wallet_name_is_case_insensitive() {
    let (ledger, _db) = ledger_with_db().await;
    new_wallet(&ledger, "Cash Box", 0).await;

    let type_id = cash_type_id(&ledger).await;
    let err = ledger
        .create_wallet(WalletCmd::new("cash  box", type_id, "#ff0000"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Duplicate("wallet already exists".to_string())
    );
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let (ledger, _db) = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main", 100).await;
    let category_id = uncategorized_id(&ledger).await;

    let err = ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 10, Uuid::new_v4(), category_id, Utc::now()),
            TxSource::Manual,
        )
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("wallet not exists".to_string()));

    let err = ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 10, wallet_id, Uuid::new_v4(), Utc::now()),
            TxSource::Manual,
        )
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("category not exists".to_string()));

    let err = ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 10, wallet_id, category_id, Utc::now())
                .tags(vec![Uuid::new_v4()]),
            TxSource::Manual,
        )
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("tag not exists".to_string()));
}

#[tokio::test]
async fn list_filters_by_wallet_kind_and_range() {
    let (ledger, _db) = ledger_with_db().await;
    let first_id = new_wallet(&ledger, "Main", 0).await;
    let second_id = new_wallet(&ledger, "Savings", 0).await;
    let category_id = uncategorized_id(&ledger).await;

    let now = Utc::now();
    let old = now.checked_sub_days(Days::new(10)).unwrap();
    for (kind, wallet_id, occurred_at) in [
        (TxKind::Expense, first_id, now),
        (TxKind::Income, first_id, now),
        (TxKind::Expense, second_id, now),
        (TxKind::Expense, first_id, old),
    ] {
        ledger
            .add_transaction(
                TransactionCmd::new(kind, 10, wallet_id, category_id, occurred_at),
                TxSource::Manual,
            )
            .await
            .unwrap();
    }

    let filter = TransactionListFilter {
        wallet_id: Some(first_id),
        ..Default::default()
    };
    assert_eq!(ledger.list_transactions(&filter, 50).await.unwrap().len(), 3);

    let filter = TransactionListFilter {
        wallet_id: Some(first_id),
        kind: Some(TxKind::Expense),
        ..Default::default()
    };
    assert_eq!(ledger.list_transactions(&filter, 50).await.unwrap().len(), 2);

    let filter = TransactionListFilter {
        from: Some(now.checked_sub_days(Days::new(1)).unwrap()),
        to: Some(now.checked_add_days(Days::new(1)).unwrap()),
        ..Default::default()
    };
    assert_eq!(ledger.list_transactions(&filter, 50).await.unwrap().len(), 3);

    let filter = TransactionListFilter {
        from: Some(now),
        to: Some(old),
        ..Default::default()
    };
    let err = ledger.list_transactions(&filter, 50).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::Validation("invalid range: from must be < to".to_string())
    );
}

#[tokio::test]
async fn pages_walk_newest_to_oldest() {
    let (ledger, _db) = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main", 0).await;
    let category_id = uncategorized_id(&ledger).await;

    let now = Utc::now();
    let mut ids = Vec::new();
    for day in 0..5u64 {
        let occurred_at = now.checked_sub_days(Days::new(day)).unwrap();
        let id = ledger
            .add_transaction(
                TransactionCmd::new(TxKind::Expense, 10, wallet_id, category_id, occurred_at),
                TxSource::Manual,
            )
            .await
            .unwrap();
        ids.push(id);
    }

    let filter = TransactionListFilter::default();
    let (page, cursor) = ledger.list_transactions_page(&filter, 2, None).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, ids[0]);
    assert_eq!(page[1].id, ids[1]);
    let cursor = cursor.expect("more pages expected");

    let (page, cursor) = ledger
        .list_transactions_page(&filter, 2, Some(&cursor))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, ids[2]);
    let cursor = cursor.expect("last page still pending");

    let (page, cursor) = ledger
        .list_transactions_page(&filter, 2, Some(&cursor))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, ids[4]);
    assert!(cursor.is_none());
}

#[tokio::test]
async fn verify_reports_and_recompute_repairs_corruption() {
    let (ledger, db) = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main", 700).await;
    assert!(ledger.verify_balances().await.unwrap().is_empty());

    // Corrupt the denormalized balance directly in the DB.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE wallets SET balance = ? WHERE id = ?;",
        vec![999i64.into(), wallet_id.to_string().into()],
    ))
    .await
    .unwrap();

    let mismatches = ledger.verify_balances().await.unwrap();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].wallet_id, wallet_id);
    assert_eq!(mismatches[0].stored_minor, 999);
    assert_eq!(mismatches[0].computed_minor, 700);
    // Verification alone never writes.
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 999);

    let repaired = ledger.recompute_balances().await.unwrap();
    assert_eq!(repaired.len(), 1);
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 700);
    assert!(ledger.verify_balances().await.unwrap().is_empty());
}

#[tokio::test]
async fn restart_reads_same_state() {
    let (ledger, db, url, path) = ledger_with_file_db().await;
    let wallet_id = new_wallet(&ledger, "Main", 1000).await;
    let category_id = uncategorized_id(&ledger).await;
    ledger
        .add_transaction(
            TransactionCmd::new(TxKind::Expense, 200, wallet_id, category_id, Utc::now()),
            TxSource::Manual,
        )
        .await
        .unwrap();

    drop(ledger);
    drop(db);

    let db2 = Database::connect(&url).await.unwrap();
    let ledger2 = Ledger::builder().database(db2.clone()).build().await.unwrap();

    assert_eq!(ledger2.wallet(wallet_id).await.unwrap().balance, 800);
    let transactions = ledger2
        .list_transactions(&TransactionListFilter::default(), 10)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 2);

    drop(db2);
    let _ = std::fs::remove_file(path);
}
