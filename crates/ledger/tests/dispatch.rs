use chrono::{Days, Utc};
use sea_orm::Database;

use ledger::{
    BudgetCmd, BudgetKind, CategoryCmd, Command, DebtCmd, DebtDeletePolicy, DebtKind,
    DebtPaymentCmd, Dispatched, Frequency, Ledger, LedgerError, ScheduleCmd, Settings,
    SystemCategory, TransactionCmd, TransferCmd, TxKind, UpdateBudgetCmd, UpdateCategoryCmd,
    UpdateDebtCmd, UpdateScheduleCmd, UpdateTransactionCmd, UpdateWalletCmd, WalletCmd,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn ledger_with_db() -> Ledger {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Ledger::builder().database(db).build().await.unwrap()
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
        .find(|c| c.system_kind == Some(SystemCategory::Uncategorized))
        .expect("seeded uncategorized category missing")
        .id
}

#[tokio::test]
async fn wallet_and_transaction_commands_round_trip() {
    let ledger = ledger_with_db().await;
    let type_id = cash_type_id(&ledger).await;

    let dispatched = ledger
        .dispatch(Command::AddWallet(WalletCmd::new("Main", type_id, "#4caf50")))
        .await
        .unwrap();
    let Dispatched::Created { id: wallet_id } = dispatched else {
        panic!("expected Created, got {dispatched:?}");
    };

    assert_eq!(
        ledger
            .dispatch(Command::UpdateWallet {
                wallet_id,
                cmd: UpdateWalletCmd::new().name("Daily driver"),
            })
            .await
            .unwrap(),
        Dispatched::Updated
    );
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().name, "Daily driver");

    let category_id = uncategorized_id(&ledger).await;
    let dispatched = ledger
        .dispatch(Command::AddTransaction(TransactionCmd::new(
            TxKind::Expense,
            200,
            wallet_id,
            category_id,
            Utc::now(),
        )))
        .await
        .unwrap();
    let Dispatched::Created { id: tx_id } = dispatched else {
        panic!("expected Created, got {dispatched:?}");
    };
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, -200);

    assert_eq!(
        ledger
            .dispatch(Command::UpdateTransaction {
                transaction_id: tx_id,
                cmd: UpdateTransactionCmd::new().amount_minor(250),
            })
            .await
            .unwrap(),
        Dispatched::Updated
    );
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, -250);

    let dispatched = ledger
        .dispatch(Command::DeleteTransaction { transaction_id: tx_id })
        .await
        .unwrap();
    let Dispatched::Deleted { restore_id } = dispatched else {
        panic!("expected Deleted, got {dispatched:?}");
    };
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 0);

    assert_eq!(
        ledger
            .dispatch(Command::RestoreFromBin { restore_id })
            .await
            .unwrap(),
        Dispatched::Restored { entity_id: tx_id }
    );
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, -250);

    let dispatched = ledger
        .dispatch(Command::DeleteTransaction { transaction_id: tx_id })
        .await
        .unwrap();
    let Dispatched::Deleted { restore_id } = dispatched else {
        panic!("expected Deleted, got {dispatched:?}");
    };
    assert_eq!(
        ledger
            .dispatch(Command::PermanentDelete { restore_id })
            .await
            .unwrap(),
        Dispatched::Purged
    );
    assert!(ledger.transaction(tx_id).await.is_err());
    assert!(ledger.list_bin().await.unwrap().is_empty());

    let dispatched = ledger
        .dispatch(Command::DeleteWallet { wallet_id })
        .await
        .unwrap();
    assert!(matches!(dispatched, Dispatched::Deleted { .. }));
    assert!(ledger.wallet(wallet_id).await.is_err());
}

#[tokio::test]
async fn transfer_command_returns_both_halves() {
    let ledger = ledger_with_db().await;
    let type_id = cash_type_id(&ledger).await;
    let from_id = ledger
        .create_wallet(WalletCmd::new("Main", type_id, "#4caf50").opening_balance_minor(500))
        .await
        .unwrap();
    let to_id = ledger
        .create_wallet(WalletCmd::new("Savings", type_id, "#4caf50"))
        .await
        .unwrap();

    let dispatched = ledger
        .dispatch(Command::AddTransfer(TransferCmd::new(
            from_id,
            to_id,
            150,
            Utc::now(),
        )))
        .await
        .unwrap();
    let Dispatched::CreatedPair {
        outgoing_id,
        incoming_id,
    } = dispatched
    else {
        panic!("expected CreatedPair, got {dispatched:?}");
    };

    let outgoing = ledger.transaction(outgoing_id).await.unwrap();
    let incoming = ledger.transaction(incoming_id).await.unwrap();
    assert_eq!(outgoing.kind, TxKind::Expense);
    assert_eq!(incoming.kind, TxKind::Income);
    assert_eq!(outgoing.transfer_id, Some(incoming_id));
    assert_eq!(incoming.transfer_id, Some(outgoing_id));
    assert_eq!(ledger.wallet(from_id).await.unwrap().balance, 350);
    assert_eq!(ledger.wallet(to_id).await.unwrap().balance, 150);
}

#[tokio::test]
async fn classification_commands_round_trip() {
    let ledger = ledger_with_db().await;

    let dispatched = ledger
        .dispatch(Command::AddCategory(CategoryCmd::new("Food")))
        .await
        .unwrap();
    let Dispatched::Created { id: food_id } = dispatched else {
        panic!("expected Created, got {dispatched:?}");
    };
    let dispatched = ledger
        .dispatch(Command::AddSubCategory {
            parent_id: food_id,
            cmd: CategoryCmd::new("Groceries"),
        })
        .await
        .unwrap();
    let Dispatched::Created { id: sub_id } = dispatched else {
        panic!("expected Created, got {dispatched:?}");
    };
    assert_eq!(ledger.category(sub_id).await.unwrap().parent_id, Some(food_id));

    assert_eq!(
        ledger
            .dispatch(Command::UpdateCategory {
                category_id: food_id,
                cmd: UpdateCategoryCmd::new().name("Meals"),
            })
            .await
            .unwrap(),
        Dispatched::Updated
    );
    assert_eq!(ledger.category(food_id).await.unwrap().name, "Meals");

    let dispatched = ledger
        .dispatch(Command::AddTag {
            name: "Trips".to_string(),
        })
        .await
        .unwrap();
    let Dispatched::Created { id: tag_id } = dispatched else {
        panic!("expected Created, got {dispatched:?}");
    };
    assert_eq!(
        ledger
            .dispatch(Command::UpdateTag {
                tag_id,
                name: "Travel".to_string(),
            })
            .await
            .unwrap(),
        Dispatched::Updated
    );

    let dispatched = ledger
        .dispatch(Command::AddBudget(
            BudgetCmd::new("Eating", 500, BudgetKind::Periodic).category_ids(vec![food_id]),
        ))
        .await
        .unwrap();
    let Dispatched::Created { id: budget_id } = dispatched else {
        panic!("expected Created, got {dispatched:?}");
    };
    assert_eq!(
        ledger
            .dispatch(Command::UpdateBudget {
                budget_id,
                cmd: UpdateBudgetCmd::new().amount_minor(600),
            })
            .await
            .unwrap(),
        Dispatched::Updated
    );
    let budgets = ledger.list_budgets().await.unwrap();
    assert_eq!(budgets[0].0.amount_minor, 600);

    let dispatched = ledger
        .dispatch(Command::DeleteBudget { budget_id })
        .await
        .unwrap();
    assert!(matches!(dispatched, Dispatched::Deleted { .. }));
    let dispatched = ledger.dispatch(Command::DeleteTag { tag_id }).await.unwrap();
    assert!(matches!(dispatched, Dispatched::Deleted { .. }));
    let dispatched = ledger
        .dispatch(Command::DeleteCategory { category_id: food_id })
        .await
        .unwrap();
    assert!(matches!(dispatched, Dispatched::Deleted { .. }));
    assert!(ledger.category(food_id).await.is_err());
    assert!(ledger.category(sub_id).await.is_err());
    assert_eq!(ledger.list_bin().await.unwrap().len(), 3);
}

#[tokio::test]
async fn debt_schedule_and_settings_commands_round_trip() {
    let ledger = ledger_with_db().await;
    let type_id = cash_type_id(&ledger).await;
    let wallet_id = ledger
        .create_wallet(WalletCmd::new("Main", type_id, "#4caf50"))
        .await
        .unwrap();
    let category_id = uncategorized_id(&ledger).await;

    let dispatched = ledger
        .dispatch(Command::AddDebt(DebtCmd::new(
            "Alice",
            DebtKind::Debt,
            300,
            wallet_id,
            Utc::now(),
        )))
        .await
        .unwrap();
    let Dispatched::Created { id: debt_id } = dispatched else {
        panic!("expected Created, got {dispatched:?}");
    };
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 300);

    // The internal clock treats a future start as not yet due.
    let start = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(5))
        .unwrap();
    let dispatched = ledger
        .dispatch(Command::AddSchedule(ScheduleCmd::new(
            "Rent",
            TxKind::Expense,
            40,
            wallet_id,
            category_id,
            start,
            Frequency::Monthly,
        )))
        .await
        .unwrap();
    let Dispatched::Created { id: schedule_id } = dispatched else {
        panic!("expected Created, got {dispatched:?}");
    };
    assert_eq!(
        ledger
            .dispatch(Command::UpdateSchedule {
                schedule_id,
                cmd: UpdateScheduleCmd::new().amount_minor(45),
            })
            .await
            .unwrap(),
        Dispatched::Updated
    );

    let snapshot = ledger.export_state().await.unwrap();

    let dispatched = ledger
        .dispatch(Command::AddDebtPayment {
            debt_id,
            payment: DebtPaymentCmd::new(100, Utc::now()),
        })
        .await
        .unwrap();
    let Dispatched::Created { id: payment_id } = dispatched else {
        panic!("expected Created, got {dispatched:?}");
    };
    assert!(ledger.transaction(payment_id).await.is_ok());
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 200);

    assert_eq!(
        ledger
            .dispatch(Command::UpdateDebt {
                debt_id,
                cmd: UpdateDebtCmd::new().person("Alice B."),
            })
            .await
            .unwrap(),
        Dispatched::Updated
    );
    let dispatched = ledger
        .dispatch(Command::DeleteSchedule { schedule_id })
        .await
        .unwrap();
    assert!(matches!(dispatched, Dispatched::Deleted { .. }));
    assert_eq!(
        ledger
            .dispatch(Command::UpdateSettings(Settings {
                debt_delete_policy: DebtDeletePolicy::Cascade,
            }))
            .await
            .unwrap(),
        Dispatched::Updated
    );

    // Rolling the snapshot back in undoes everything since the export.
    assert_eq!(
        ledger.dispatch(Command::SetState(snapshot)).await.unwrap(),
        Dispatched::StateReplaced
    );
    assert_eq!(ledger.wallet(wallet_id).await.unwrap().balance, 300);
    let debt = ledger.debt(debt_id).await.unwrap();
    assert_eq!(debt.person, "Alice");
    assert_eq!(debt.paid_amount_minor, 0);
    assert_eq!(ledger.schedule(schedule_id).await.unwrap().amount_minor, 45);
    assert_eq!(
        ledger.settings().await.unwrap().debt_delete_policy,
        DebtDeletePolicy::Keep
    );

    let dispatched = ledger
        .dispatch(Command::DeleteDebt { debt_id })
        .await
        .unwrap();
    assert!(matches!(dispatched, Dispatched::Deleted { .. }));
    assert!(ledger.debt(debt_id).await.is_err());
}

#[tokio::test]
async fn errors_pass_through_dispatch() {
    let ledger = ledger_with_db().await;
    let category_id = uncategorized_id(&ledger).await;

    let err = ledger
        .dispatch(Command::AddTransaction(TransactionCmd::new(
            TxKind::Expense,
            100,
            Uuid::new_v4(),
            category_id,
            Utc::now(),
        )))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("wallet not exists".to_string()));
}
