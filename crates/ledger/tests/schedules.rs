use chrono::{Days, Utc};
use sea_orm::Database;

use ledger::{
    CatchUpSummary, CategoryCmd, Frequency, Ledger, LedgerError, ScheduleCmd, ScheduleStatus,
    TransactionListFilter, TxKind, TxSource, UpdateScheduleCmd, WalletCmd,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn ledger_with_db() -> Ledger {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Ledger::builder().database(db).build().await.unwrap()
}

async fn new_wallet(ledger: &Ledger, name: &str) -> Uuid {
    let type_id = ledger
        .list_wallet_types()
        .await
        .unwrap()
        .into_iter()
        .find(|ty| ty.name == "Cash")
        .expect("seeded wallet type Cash missing")
        .id;
    ledger
        .create_wallet(WalletCmd::new(name, type_id, "#9c27b0"))
        .await
        .unwrap()
}

async fn new_category(ledger: &Ledger, name: &str) -> Uuid {
    ledger.create_category(CategoryCmd::new(name)).await.unwrap()
}

#[tokio::test]
async fn backdated_schedule_catches_up_at_creation() {
    let ledger = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main").await;
    let category_id = new_category(&ledger, "Bills").await;

    let now = Utc::now();
    let start = now.date_naive().checked_sub_days(Days::new(5)).unwrap();
    let schedule_id = ledger
        .create_schedule(
            ScheduleCmd::new(
                "Rent",
                TxKind::Expense,
                50,
                wallet_id,
                category_id,
                start,
                Frequency::Daily,
            ),
            now,
        )
        .await
        .unwrap();

    // Five missed days plus today, all materialized inside creation.
    let transactions = ledger
        .list_transactions(&TransactionListFilter::default(), 50)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 6);
    for tx in &transactions {
        assert_eq!(tx.source, TxSource::Scheduled);
        assert_eq!(tx.amount_minor, 50);
    }
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, -300);

    let schedule = ledger.schedule(schedule_id).await.unwrap();
    assert!(schedule.locked);
    assert_eq!(schedule.last_run, Some(now.date_naive()));
    assert_eq!(
        schedule.next_due_date,
        now.date_naive().checked_add_days(Days::new(1))
    );

    // Nothing further is due today.
    let summary = ledger.run_due_schedules(now).await.unwrap().unwrap();
    assert_eq!(summary, CatchUpSummary::default());
}

#[tokio::test]
async fn future_schedule_waits_for_start() {
    let ledger = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main").await;
    let category_id = new_category(&ledger, "Bills").await;

    let now = Utc::now();
    let start = now.date_naive().checked_add_days(Days::new(3)).unwrap();
    let schedule_id = ledger
        .create_schedule(
            ScheduleCmd::new(
                "Internet",
                TxKind::Expense,
                40,
                wallet_id,
                category_id,
                start,
                Frequency::Monthly,
            ),
            now,
        )
        .await
        .unwrap();

    let schedule = ledger.schedule(schedule_id).await.unwrap();
    assert!(!schedule.locked);
    assert_eq!(schedule.last_run, None);
    assert_eq!(schedule.next_due_date, Some(start));
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 0);

    let summary = ledger.run_due_schedules(now).await.unwrap().unwrap();
    assert_eq!(summary.schedules, 0);

    let later = now.checked_add_days(Days::new(3)).unwrap();
    let summary = ledger.run_due_schedules(later).await.unwrap().unwrap();
    assert_eq!(summary.schedules, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, -40);
}

#[tokio::test]
async fn once_schedule_completes_after_single_occurrence() {
    let ledger = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main").await;
    let category_id = new_category(&ledger, "Bills").await;

    let now = Utc::now();
    let schedule_id = ledger
        .create_schedule(
            ScheduleCmd::new(
                "Deposit",
                TxKind::Income,
                900,
                wallet_id,
                category_id,
                now.date_naive(),
                Frequency::Once,
            ),
            now,
        )
        .await
        .unwrap();

    let schedule = ledger.schedule(schedule_id).await.unwrap();
    assert_eq!(schedule.status, ScheduleStatus::Completed);
    assert_eq!(schedule.next_due_date, None);
    assert!(schedule.locked);
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 900);

    let summary = ledger.run_due_schedules(now).await.unwrap().unwrap();
    assert_eq!(summary, CatchUpSummary::default());
}

#[tokio::test]
async fn end_date_caps_the_catch_up() {
    let ledger = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main").await;
    let category_id = new_category(&ledger, "Bills").await;

    let now = Utc::now();
    let start = now.date_naive().checked_sub_days(Days::new(10)).unwrap();
    let end = start.checked_add_days(Days::new(2)).unwrap();
    let schedule_id = ledger
        .create_schedule(
            ScheduleCmd::new(
                "Trial",
                TxKind::Expense,
                10,
                wallet_id,
                category_id,
                start,
                Frequency::Daily,
            )
            .end_date(end),
            now,
        )
        .await
        .unwrap();

    let transactions = ledger
        .list_transactions(&TransactionListFilter::default(), 50)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 3);

    let schedule = ledger.schedule(schedule_id).await.unwrap();
    assert_eq!(schedule.status, ScheduleStatus::Completed);
    assert_eq!(schedule.next_due_date, None);
    assert_eq!(schedule.last_run, Some(end));
}

#[tokio::test]
async fn locked_schedule_accepts_only_cosmetic_edits() {
    let ledger = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main").await;
    let category_id = new_category(&ledger, "Bills").await;

    let now = Utc::now();
    let schedule_id = ledger
        .create_schedule(
            ScheduleCmd::new(
                "Rent",
                TxKind::Expense,
                50,
                wallet_id,
                category_id,
                now.date_naive(),
                Frequency::Daily,
            ),
            now,
        )
        .await
        .unwrap();
    let before = ledger.schedule(schedule_id).await.unwrap();
    assert!(before.locked);

    let err = ledger
        .update_schedule(schedule_id, UpdateScheduleCmd::new().amount_minor(75))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::Locked("schedule is locked".to_string()));

    ledger
        .update_schedule(
            schedule_id,
            UpdateScheduleCmd::new()
                .name("Rent downtown")
                .notes("landlord changed")
                .notify(true),
        )
        .await
        .unwrap();

    let after = ledger.schedule(schedule_id).await.unwrap();
    assert_eq!(after.name, "Rent downtown");
    assert_eq!(after.notes.as_deref(), Some("landlord changed"));
    assert!(after.notify);
    assert_eq!(after.amount_minor, 50);
    assert_eq!(after.next_due_date, before.next_due_date);
}

#[tokio::test]
async fn unlocked_schedule_accepts_structural_edits() {
    let ledger = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main").await;
    let category_id = new_category(&ledger, "Bills").await;

    let now = Utc::now();
    let start = now.date_naive().checked_add_days(Days::new(3)).unwrap();
    let schedule_id = ledger
        .create_schedule(
            ScheduleCmd::new(
                "Gym",
                TxKind::Expense,
                30,
                wallet_id,
                category_id,
                start,
                Frequency::Monthly,
            ),
            now,
        )
        .await
        .unwrap();

    let moved = now.date_naive().checked_add_days(Days::new(5)).unwrap();
    ledger
        .update_schedule(
            schedule_id,
            UpdateScheduleCmd::new().amount_minor(35).start_date(moved),
        )
        .await
        .unwrap();

    let schedule = ledger.schedule(schedule_id).await.unwrap();
    assert_eq!(schedule.amount_minor, 35);
    assert_eq!(schedule.start_date, moved);
    // A structural edit re-derives the next candidate.
    assert_eq!(schedule.next_due_date, Some(moved));
}

#[tokio::test]
async fn a_broken_schedule_does_not_sink_the_pass() {
    let ledger = ledger_with_db().await;
    let good_wallet = new_wallet(&ledger, "Main").await;
    let doomed_wallet = new_wallet(&ledger, "Doomed").await;
    let category_id = new_category(&ledger, "Bills").await;

    let now = Utc::now();
    let start = now.date_naive().checked_add_days(Days::new(1)).unwrap();
    ledger
        .create_schedule(
            ScheduleCmd::new(
                "Healthy",
                TxKind::Expense,
                20,
                good_wallet,
                category_id,
                start,
                Frequency::Daily,
            ),
            now,
        )
        .await
        .unwrap();
    ledger
        .create_schedule(
            ScheduleCmd::new(
                "Broken",
                TxKind::Expense,
                20,
                doomed_wallet,
                category_id,
                start,
                Frequency::Daily,
            ),
            now,
        )
        .await
        .unwrap();

    // Pull the wallet out from under the second schedule.
    ledger.delete_wallet(doomed_wallet).await.unwrap();

    let later = now.checked_add_days(Days::new(1)).unwrap();
    let summary = ledger.run_due_schedules(later).await.unwrap().unwrap();
    assert_eq!(summary.schedules, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(ledger.wallet(good_wallet).await.unwrap().balance, -20);
}

#[tokio::test]
async fn deleted_schedule_keeps_its_transactions() {
    let ledger = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main").await;
    let category_id = new_category(&ledger, "Bills").await;

    let now = Utc::now();
    let start = now.date_naive().checked_sub_days(Days::new(2)).unwrap();
    let schedule_id = ledger
        .create_schedule(
            ScheduleCmd::new(
                "Rent",
                TxKind::Expense,
                50,
                wallet_id,
                category_id,
                start,
                Frequency::Daily,
            ),
            now,
        )
        .await
        .unwrap();
    let before = ledger.schedule(schedule_id).await.unwrap();

    let restore_id = ledger.delete_schedule(schedule_id).await.unwrap();
    assert_eq!(
        ledger.schedule(schedule_id).await.unwrap_err(),
        LedgerError::NotFound("schedule not exists".to_string())
    );
    // Materialized occurrences stay in the ledger.
    let transactions = ledger
        .list_transactions(&TransactionListFilter::default(), 50)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 3);
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, -150);

    ledger.restore_from_bin(restore_id).await.unwrap();
    let after = ledger.schedule(schedule_id).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn schedule_validation_rejects_bad_input() {
    let ledger = ledger_with_db().await;
    let wallet_id = new_wallet(&ledger, "Main").await;
    let category_id = new_category(&ledger, "Bills").await;

    let now = Utc::now();
    let start = now.date_naive();
    let end = start.checked_sub_days(Days::new(1)).unwrap();
    let err = ledger
        .create_schedule(
            ScheduleCmd::new(
                "Backwards",
                TxKind::Expense,
                50,
                wallet_id,
                category_id,
                start,
                Frequency::Daily,
            )
            .end_date(end),
            now,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Validation("end_date must not precede start_date".to_string())
    );

    let err = ledger
        .create_schedule(
            ScheduleCmd::new(
                "Zero",
                TxKind::Expense,
                0,
                wallet_id,
                category_id,
                start,
                Frequency::Daily,
            ),
            now,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Validation("amount_minor must be > 0".to_string())
    );
}
