use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Debt, HistoryAction, HistoryLog, LedgerError, LedgerResult, SystemCategory, Transaction,
    budgets, categories, debts,
    history::snapshot_value,
    restore_bin::{self, BinPayload, RestoreBinItem},
    schedules, tags, transactions, wallets,
};

use super::{
    Ledger, history, require_wallet, system_category, transactions as tx_ops, with_tx,
};

pub(crate) async fn stage<C: ConnectionTrait>(
    conn: &C,
    item: &RestoreBinItem,
) -> LedgerResult<()> {
    restore_bin::ActiveModel::from(item).insert(conn).await?;
    Ok(())
}

async fn get_item(db_tx: &DatabaseTransaction, restore_id: Uuid) -> LedgerResult<RestoreBinItem> {
    restore_bin::Entity::find_by_id(restore_id.to_string())
        .one(db_tx)
        .await?
        .ok_or_else(|| LedgerError::NotFound("bin item not exists".to_string()))?
        .try_into()
}

async fn discard(db_tx: &DatabaseTransaction, restore_id: Uuid) -> LedgerResult<()> {
    restore_bin::Entity::delete_by_id(restore_id.to_string())
        .exec(db_tx)
        .await?;
    Ok(())
}

/// The partner half of a staged transfer pair shares the item's
/// origin action.
async fn sibling_of(
    db_tx: &DatabaseTransaction,
    item: &RestoreBinItem,
) -> LedgerResult<Option<RestoreBinItem>> {
    let model = restore_bin::Entity::find()
        .filter(restore_bin::Column::OriginActionId.eq(item.origin_action_id.to_string()))
        .filter(restore_bin::Column::Id.ne(item.id.to_string()))
        .one(db_tx)
        .await?;
    model.map(RestoreBinItem::try_from).transpose()
}

/// Re-insert a staged transaction, re-applying its balance effect.
///
/// The owning wallet must still exist. A vanished category degrades to
/// the system `uncategorized` row; vanished tags are dropped.
async fn restore_transaction(
    db_tx: &DatabaseTransaction,
    transaction: &Transaction,
) -> LedgerResult<()> {
    require_wallet(db_tx, transaction.wallet_id).await?;

    let mut restored = transaction.clone();
    let category_exists = categories::Entity::find_by_id(restored.category_id.to_string())
        .one(db_tx)
        .await?
        .is_some();
    if !category_exists {
        restored.category_id = system_category(db_tx, SystemCategory::Uncategorized).await?.id;
    }

    let mut surviving = Vec::with_capacity(restored.tags.len());
    for tag_id in &restored.tags {
        let exists = tags::Entity::find_by_id(tag_id.to_string())
            .one(db_tx)
            .await?
            .is_some();
        if exists {
            surviving.push(*tag_id);
        }
    }
    restored.tags = surviving;

    tx_ops::insert_transaction(db_tx, &restored).await
}

async fn restore_payload(db_tx: &DatabaseTransaction, item: &RestoreBinItem) -> LedgerResult<()> {
    match &item.payload {
        BinPayload::Transaction(transaction) => {
            restore_transaction(db_tx, transaction).await?;
            if transaction.transfer_id.is_some()
                && let Some(sibling) = sibling_of(db_tx, item).await?
            {
                if let BinPayload::Transaction(partner) = &sibling.payload {
                    restore_transaction(db_tx, partner).await?;
                }
                discard(db_tx, sibling.id).await?;
            }
        }
        BinPayload::Wallet {
            wallet,
            transactions: staged,
        } => {
            wallets::ActiveModel::from(wallet).insert(db_tx).await?;
            for transaction in staged {
                restore_transaction(db_tx, transaction).await?;
            }
        }
        BinPayload::Debt {
            debt,
            transactions: staged,
        } => {
            require_wallet(db_tx, debt.wallet_id).await?;
            debts::ActiveModel::from(debt).insert(db_tx).await?;
            for transaction in staged {
                restore_transaction(db_tx, transaction).await?;
            }
            // Under the keep policy nothing was staged; re-link the
            // surviving free-standing rows instead.
            if staged.is_empty() {
                relink_debt(db_tx, debt).await?;
            }
        }
        BinPayload::Category { category, children } => {
            let mut restored = category.clone();
            if let Some(parent_id) = restored.parent_id {
                let parent_exists = categories::Entity::find_by_id(parent_id.to_string())
                    .one(db_tx)
                    .await?
                    .is_some();
                if !parent_exists {
                    restored.parent_id = None;
                }
            }
            categories::ActiveModel::from(&restored).insert(db_tx).await?;
            for child in children {
                categories::ActiveModel::from(child).insert(db_tx).await?;
            }
        }
        BinPayload::Tag {
            tag,
            transaction_ids,
        } => {
            tags::ActiveModel::from(tag).insert(db_tx).await?;
            for transaction_id in transaction_ids {
                let exists = transactions::Entity::find_by_id(transaction_id.to_string())
                    .one(db_tx)
                    .await?
                    .is_some();
                if exists {
                    tx_ops::insert_tag_rows(db_tx, *transaction_id, &[tag.id]).await?;
                }
            }
        }
        BinPayload::Budget(budget) => {
            budgets::ActiveModel::from(budget).insert(db_tx).await?;
        }
        BinPayload::Schedule(schedule) => {
            require_wallet(db_tx, schedule.wallet_id).await?;
            schedules::ActiveModel::from(schedule).insert(db_tx).await?;
        }
    }
    Ok(())
}

async fn relink_debt(db_tx: &DatabaseTransaction, debt: &Debt) -> LedgerResult<()> {
    for transaction_id in &debt.linked_transaction_ids {
        let exists = transactions::Entity::find_by_id(transaction_id.to_string())
            .one(db_tx)
            .await?
            .is_some();
        if exists {
            let active = transactions::ActiveModel {
                id: ActiveValue::Set(transaction_id.to_string()),
                debt_id: ActiveValue::Set(Some(debt.id.to_string())),
                ..Default::default()
            };
            active.update(db_tx).await?;
        }
    }
    Ok(())
}

impl Ledger {
    /// Bring a staged entity back into its owning table, re-applying
    /// balance effects and settling the pending delete entry. Transfer
    /// pairs restore together. Returns the restored entity id.
    pub async fn restore_from_bin(&self, restore_id: Uuid) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let item = get_item(&db_tx, restore_id).await?;

            restore_payload(&db_tx, &item).await?;
            history::settle_pending(&db_tx, item.origin_action_id).await?;
            discard(&db_tx, item.id).await?;

            let log = HistoryLog::new(
                HistoryAction::Restore,
                item.entity,
                item.entity_id.to_string(),
                format!("restored {}", item.entity.as_str()),
                "bin",
            )
            .new_value(snapshot_value(&item.payload));
            history::record(&db_tx, &log).await?;

            Ok(item.entity_id)
        })
    }

    /// Drop a staged entity for good. The pending delete entry settles,
    /// and a terminal delete entry records the purge. A transfer pair's
    /// partner item is discarded in the same unit.
    pub async fn permanently_delete(&self, restore_id: Uuid) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            let item = get_item(&db_tx, restore_id).await?;

            match &item.payload {
                BinPayload::Transaction(transaction) => {
                    if transaction.transfer_id.is_some()
                        && let Some(sibling) = sibling_of(&db_tx, &item).await?
                    {
                        discard(&db_tx, sibling.id).await?;
                    }
                }
                BinPayload::Category { category, children } => {
                    // Rows referencing the purged categories fall back to
                    // the system uncategorized row.
                    let uncategorized =
                        system_category(&db_tx, SystemCategory::Uncategorized).await?;
                    let mut purged: Vec<String> = vec![category.id.to_string()];
                    purged.extend(children.iter().map(|child| child.id.to_string()));
                    transactions::Entity::update_many()
                        .col_expr(
                            transactions::Column::CategoryId,
                            Expr::value(uncategorized.id.to_string()),
                        )
                        .filter(transactions::Column::CategoryId.is_in(purged))
                        .exec(&db_tx)
                        .await?;
                }
                _ => {}
            }

            history::settle_pending(&db_tx, item.origin_action_id).await?;
            discard(&db_tx, item.id).await?;

            let log = HistoryLog::new(
                HistoryAction::Delete,
                item.entity,
                item.entity_id.to_string(),
                format!("permanently deleted {}", item.entity.as_str()),
                "bin",
            )
            .old_value(snapshot_value(&item.payload));
            history::record(&db_tx, &log).await?;

            Ok(())
        })
    }

    /// Staged entities, newest first.
    pub async fn list_bin(&self) -> LedgerResult<Vec<RestoreBinItem>> {
        let rows = restore_bin::Entity::find()
            .order_by_desc(restore_bin::Column::DeletedAt)
            .order_by_desc(restore_bin::Column::Id)
            .all(&self.database)
            .await?;
        rows.into_iter().map(RestoreBinItem::try_from).collect()
    }
}
