use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{QueryOrder, TransactionTrait, prelude::*};
use serde_json::json;
use uuid::Uuid;

use crate::{
    Budget, Category, Debt, EntityKind, HistoryAction, HistoryLog, LedgerResult, RestoreBinItem,
    ScheduledTransaction, StateSnapshot, Tag, Transaction, Wallet, WalletType, budgets, categories,
    debts, history, restore_bin, schedules, settings, tags, transaction_tags, transactions,
    util::parse_uuid,
    wallet_types, wallets,
};

use super::{
    Ledger, history as history_ops, settings as settings_ops, transactions as tx_ops, with_tx,
};

impl Ledger {
    /// Read every table into a portable snapshot, all from one
    /// consistent view.
    pub async fn export_state(&self) -> LedgerResult<StateSnapshot> {
        with_tx!(self, |db_tx| {
            let wallet_type_models = wallet_types::Entity::find()
                .order_by_asc(wallet_types::Column::Name)
                .all(&db_tx)
                .await?;
            let mut wallet_type_out = Vec::with_capacity(wallet_type_models.len());
            for model in wallet_type_models {
                wallet_type_out.push(WalletType::try_from(model)?);
            }

            let wallet_models = wallets::Entity::find()
                .order_by_asc(wallets::Column::Name)
                .all(&db_tx)
                .await?;
            let mut wallet_out = Vec::with_capacity(wallet_models.len());
            for model in wallet_models {
                wallet_out.push(Wallet::try_from(model)?);
            }

            let category_models = categories::Entity::find()
                .order_by_asc(categories::Column::Name)
                .all(&db_tx)
                .await?;
            let mut category_out = Vec::with_capacity(category_models.len());
            for model in category_models {
                category_out.push(Category::try_from(model)?);
            }

            let tag_models = tags::Entity::find()
                .order_by_asc(tags::Column::Name)
                .all(&db_tx)
                .await?;
            let mut tag_out = Vec::with_capacity(tag_models.len());
            for model in tag_models {
                tag_out.push(Tag::try_from(model)?);
            }

            let mut tags_by_transaction: HashMap<String, Vec<Uuid>> = HashMap::new();
            for row in transaction_tags::Entity::find().all(&db_tx).await? {
                tags_by_transaction
                    .entry(row.transaction_id)
                    .or_default()
                    .push(parse_uuid(&row.tag_id, "tag")?);
            }
            let transaction_models = transactions::Entity::find()
                .order_by_asc(transactions::Column::OccurredAt)
                .order_by_asc(transactions::Column::Id)
                .all(&db_tx)
                .await?;
            let mut transaction_out = Vec::with_capacity(transaction_models.len());
            for model in transaction_models {
                let tag_ids = tags_by_transaction.remove(&model.id).unwrap_or_default();
                transaction_out.push(Transaction::from_model(model, tag_ids)?);
            }

            let mut linked_by_debt: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
            for transaction in &transaction_out {
                if let Some(debt_id) = transaction.debt_id {
                    linked_by_debt.entry(debt_id).or_default().push(transaction.id);
                }
            }
            let debt_models = debts::Entity::find()
                .order_by_asc(debts::Column::StartDate)
                .order_by_asc(debts::Column::Id)
                .all(&db_tx)
                .await?;
            let mut debt_out = Vec::with_capacity(debt_models.len());
            for model in debt_models {
                let debt_id = parse_uuid(&model.id, "debt")?;
                let linked = linked_by_debt.remove(&debt_id).unwrap_or_default();
                debt_out.push(Debt::from_model(model, linked)?);
            }

            let budget_models = budgets::Entity::find()
                .order_by_asc(budgets::Column::Name)
                .all(&db_tx)
                .await?;
            let mut budget_out = Vec::with_capacity(budget_models.len());
            for model in budget_models {
                budget_out.push(Budget::try_from(model)?);
            }

            let schedule_models = schedules::Entity::find()
                .order_by_asc(schedules::Column::Name)
                .all(&db_tx)
                .await?;
            let mut schedule_out = Vec::with_capacity(schedule_models.len());
            for model in schedule_models {
                schedule_out.push(ScheduledTransaction::try_from(model)?);
            }

            let settings_out = settings_ops::load(&db_tx).await?;

            let history_models = history::Entity::find()
                .order_by_asc(history::Column::Timestamp)
                .order_by_asc(history::Column::Id)
                .all(&db_tx)
                .await?;
            let mut history_out = Vec::with_capacity(history_models.len());
            for model in history_models {
                history_out.push(HistoryLog::try_from(model)?);
            }

            let bin_models = restore_bin::Entity::find()
                .order_by_asc(restore_bin::Column::DeletedAt)
                .order_by_asc(restore_bin::Column::Id)
                .all(&db_tx)
                .await?;
            let mut bin_out = Vec::with_capacity(bin_models.len());
            for model in bin_models {
                bin_out.push(RestoreBinItem::try_from(model)?);
            }

            Ok(StateSnapshot {
                exported_at: Utc::now(),
                wallet_types: wallet_type_out,
                wallets: wallet_out,
                categories: category_out,
                tags: tag_out,
                transactions: transaction_out,
                budgets: budget_out,
                debts: debt_out,
                schedules: schedule_out,
                settings: settings_out,
                history: history_out,
                restore_bin: bin_out,
            })
        })
    }

    /// Replace the whole ledger with the snapshot's content.
    ///
    /// Runs as one unit: either the full snapshot lands or nothing
    /// changes. Wallet balances come from the snapshot as-is; rows are
    /// written raw, without re-deriving anything.
    pub async fn set_state(&self, snapshot: StateSnapshot) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            transaction_tags::Entity::delete_many().exec(&db_tx).await?;
            transactions::Entity::delete_many().exec(&db_tx).await?;
            schedules::Entity::delete_many().exec(&db_tx).await?;
            debts::Entity::delete_many().exec(&db_tx).await?;
            budgets::Entity::delete_many().exec(&db_tx).await?;
            restore_bin::Entity::delete_many().exec(&db_tx).await?;
            history::Entity::delete_many().exec(&db_tx).await?;
            tags::Entity::delete_many().exec(&db_tx).await?;
            categories::Entity::delete_many().exec(&db_tx).await?;
            wallets::Entity::delete_many().exec(&db_tx).await?;
            wallet_types::Entity::delete_many().exec(&db_tx).await?;
            settings::Entity::delete_many().exec(&db_tx).await?;

            for wallet_type in &snapshot.wallet_types {
                wallet_types::ActiveModel::from(wallet_type).insert(&db_tx).await?;
            }
            for wallet in &snapshot.wallets {
                wallets::ActiveModel::from(wallet).insert(&db_tx).await?;
            }
            // Roots first so a child's parent reference always lands.
            for category in snapshot.categories.iter().filter(|c| c.parent_id.is_none()) {
                categories::ActiveModel::from(category).insert(&db_tx).await?;
            }
            for category in snapshot.categories.iter().filter(|c| c.parent_id.is_some()) {
                categories::ActiveModel::from(category).insert(&db_tx).await?;
            }
            for tag in &snapshot.tags {
                tags::ActiveModel::from(tag).insert(&db_tx).await?;
            }
            for transaction in &snapshot.transactions {
                transactions::ActiveModel::from(transaction).insert(&db_tx).await?;
                tx_ops::insert_tag_rows(&db_tx, transaction.id, &transaction.tags).await?;
            }
            for budget in &snapshot.budgets {
                budgets::ActiveModel::from(budget).insert(&db_tx).await?;
            }
            for debt in &snapshot.debts {
                debts::ActiveModel::from(debt).insert(&db_tx).await?;
            }
            for schedule in &snapshot.schedules {
                schedules::ActiveModel::from(schedule).insert(&db_tx).await?;
            }
            settings::ActiveModel::from(&snapshot.settings).insert(&db_tx).await?;
            for log in &snapshot.history {
                history::ActiveModel::from(log).insert(&db_tx).await?;
            }
            for item in &snapshot.restore_bin {
                restore_bin::ActiveModel::from(item).insert(&db_tx).await?;
            }

            let log = HistoryLog::new(
                HistoryAction::Import,
                EntityKind::State,
                "state",
                format!(
                    "imported state with {} transactions",
                    snapshot.transactions.len()
                ),
                "state",
            )
            .new_value(json!({
                "wallets": snapshot.wallets.len(),
                "transactions": snapshot.transactions.len(),
                "debts": snapshot.debts.len(),
                "schedules": snapshot.schedules.len(),
                "exported_at": snapshot.exported_at,
            }));
            history_ops::record(&db_tx, &log).await?;

            Ok(())
        })
    }
}
