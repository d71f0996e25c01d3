use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, ConnectionTrait, DatabaseTransaction, JoinType, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EntityKind, HistoryAction, HistoryLog, LedgerError, LedgerResult, SystemCategory, Transaction,
    TransactionCmd, TransferCmd, TxKind, TxSource, UpdateTransactionCmd, debts, diff,
    history::snapshot_value,
    restore_bin::{BinPayload, RestoreBinItem},
    transaction_tags, transactions,
    util::{encode_id_list, encode_string_list, parse_uuid},
};

use super::{
    Ledger, balances, bin, history, require_category, require_tags, require_wallet,
    system_category, with_tx,
};

pub(crate) async fn tag_ids_for<C: ConnectionTrait>(
    conn: &C,
    transaction_id: Uuid,
) -> LedgerResult<Vec<Uuid>> {
    let rows = transaction_tags::Entity::find()
        .filter(transaction_tags::Column::TransactionId.eq(transaction_id.to_string()))
        .all(conn)
        .await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(parse_uuid(&row.tag_id, "tag")?);
    }
    Ok(out)
}

pub(crate) async fn insert_tag_rows<C: ConnectionTrait>(
    conn: &C,
    transaction_id: Uuid,
    tags: &[Uuid],
) -> LedgerResult<()> {
    for tag_id in tags {
        let row = transaction_tags::ActiveModel {
            transaction_id: ActiveValue::Set(transaction_id.to_string()),
            tag_id: ActiveValue::Set(tag_id.to_string()),
        };
        row.insert(conn).await?;
    }
    Ok(())
}

pub(crate) async fn delete_tag_rows<C: ConnectionTrait>(
    conn: &C,
    transaction_id: Uuid,
) -> LedgerResult<()> {
    transaction_tags::Entity::delete_many()
        .filter(transaction_tags::Column::TransactionId.eq(transaction_id.to_string()))
        .exec(conn)
        .await?;
    Ok(())
}

pub(crate) async fn get_transaction<C: ConnectionTrait>(
    conn: &C,
    transaction_id: Uuid,
) -> LedgerResult<Transaction> {
    let model = transactions::Entity::find_by_id(transaction_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound("transaction not exists".to_string()))?;
    let tags = tag_ids_for(conn, transaction_id).await?;
    Transaction::from_model(model, tags)
}

/// Persist a fully-built transaction and move its wallet balance, inside
/// the caller's unit. Referential checks stay with the caller.
pub(crate) async fn insert_transaction(
    db_tx: &DatabaseTransaction,
    transaction: &Transaction,
) -> LedgerResult<()> {
    balances::apply_wallet_deltas(db_tx, &[(transaction.wallet_id, transaction.signed_amount())])
        .await?;
    transactions::ActiveModel::from(transaction).insert(db_tx).await?;
    insert_tag_rows(db_tx, transaction.id, &transaction.tags).await
}

/// Remove a live transaction row and revert its balance effect. Bin
/// staging and the history entry stay with the caller.
pub(crate) async fn remove_transaction(
    db_tx: &DatabaseTransaction,
    transaction: &Transaction,
) -> LedgerResult<()> {
    balances::apply_wallet_deltas(db_tx, &[(transaction.wallet_id, -transaction.signed_amount())])
        .await?;
    delete_tag_rows(db_tx, transaction.id).await?;
    transactions::Entity::delete_by_id(transaction.id.to_string())
        .exec(db_tx)
        .await?;
    Ok(())
}

/// Validate references, build, persist, and log one transaction inside
/// the caller's unit. Shared with the recurrence engine.
pub(crate) async fn create_transaction_in(
    db_tx: &DatabaseTransaction,
    cmd: TransactionCmd,
    source: TxSource,
    context: &str,
) -> LedgerResult<Transaction> {
    require_wallet(db_tx, cmd.wallet_id).await?;
    require_category(db_tx, cmd.category_id).await?;
    require_tags(db_tx, &cmd.tags).await?;

    let transaction = Transaction::new(
        cmd.kind,
        cmd.amount_minor,
        cmd.wallet_id,
        cmd.category_id,
        cmd.occurred_at,
        cmd.notes,
        cmd.tags,
        cmd.attachments,
        source,
    )?;
    insert_transaction(db_tx, &transaction).await?;

    let log = HistoryLog::new(
        HistoryAction::Create,
        EntityKind::Transaction,
        transaction.id.to_string(),
        format!(
            "added {} of {}",
            transaction.kind.as_str(),
            transaction.amount_minor
        ),
        context,
    )
    .new_value(snapshot_value(&transaction));
    history::record(db_tx, &log).await?;

    Ok(transaction)
}

/// Filters for listing transactions.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub wallet_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub kind: Option<TxKind>,
    pub tag_id: Option<Uuid>,
}

fn validate_list_filter(filter: &TransactionListFilter) -> LedgerResult<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(LedgerError::Validation(
            "invalid range: from must be < to".to_string(),
        ));
    }
    Ok(())
}

trait ApplyTxFilters: QueryFilter + Sized {
    fn apply_tx_filters(self, filter: &TransactionListFilter) -> Self;
}

impl<T> ApplyTxFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_tx_filters(mut self, filter: &TransactionListFilter) -> Self {
        if let Some(from) = filter.from {
            self = self.filter(transactions::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(transactions::Column::OccurredAt.lt(to));
        }
        if let Some(wallet_id) = filter.wallet_id {
            self = self.filter(transactions::Column::WalletId.eq(wallet_id.to_string()));
        }
        if let Some(category_id) = filter.category_id {
            self = self.filter(transactions::Column::CategoryId.eq(category_id.to_string()));
        }
        if let Some(kind) = filter.kind {
            self = self.filter(transactions::Column::Kind.eq(kind.as_str()));
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TransactionsCursor {
    occurred_at: DateTime<Utc>,
    transaction_id: String,
}

impl TransactionsCursor {
    fn encode(&self) -> LedgerResult<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| LedgerError::Validation("invalid transactions cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> LedgerResult<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| LedgerError::Validation("invalid transactions cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| LedgerError::Validation("invalid transactions cursor".to_string()))
    }
}

impl Ledger {
    /// Create a single transaction, moving its wallet's balance in the
    /// same unit.
    pub async fn add_transaction(
        &self,
        cmd: TransactionCmd,
        source: TxSource,
    ) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let transaction = create_transaction_in(&db_tx, cmd, source, "transactions").await?;
            Ok(transaction.id)
        })
    }

    /// Update a transaction, rebalancing the old and new wallet.
    ///
    /// If the transaction is the origin of a debt, the debt's amount,
    /// start date, tags, and attachments follow it.
    pub async fn update_transaction(
        &self,
        transaction_id: Uuid,
        cmd: UpdateTransactionCmd,
    ) -> LedgerResult<()> {
        if let Some(amount) = cmd.amount_minor
            && amount <= 0
        {
            return Err(LedgerError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let old = get_transaction(&db_tx, transaction_id).await?;
            if old.transfer_id.is_some()
                && (cmd.kind.is_some() || cmd.amount_minor.is_some() || cmd.wallet_id.is_some())
            {
                return Err(LedgerError::Validation(
                    "transfer sides cannot change amount, kind or wallet".to_string(),
                ));
            }

            let mut new = old.clone();
            if let Some(kind) = cmd.kind {
                new.kind = kind;
            }
            if let Some(amount) = cmd.amount_minor {
                new.amount_minor = amount;
            }
            if let Some(wallet_id) = cmd.wallet_id {
                require_wallet(&db_tx, wallet_id).await?;
                new.wallet_id = wallet_id;
            }
            if let Some(category_id) = cmd.category_id {
                require_category(&db_tx, category_id).await?;
                new.category_id = category_id;
            }
            if let Some(occurred_at) = cmd.occurred_at {
                new.occurred_at = occurred_at;
            }
            if let Some(notes) = cmd.notes {
                new.notes = Some(notes);
            }
            if let Some(tags) = cmd.tags {
                require_tags(&db_tx, &tags).await?;
                new.tags = tags;
            }
            if let Some(attachments) = cmd.attachments {
                new.attachments = attachments;
            }

            let new_balances = balances::preview_wallet_deltas(
                &db_tx,
                &[
                    (old.wallet_id, -old.signed_amount()),
                    (new.wallet_id, new.signed_amount()),
                ],
            )
            .await?;

            transactions::ActiveModel::from(&new).update(&db_tx).await?;
            if new.tags != old.tags {
                delete_tag_rows(&db_tx, transaction_id).await?;
                insert_tag_rows(&db_tx, transaction_id, &new.tags).await?;
            }
            balances::persist_wallet_balances(&db_tx, new_balances).await?;

            // Editing a debt's origin keeps the debt in step, without
            // touching paid_amount or status.
            if let Some(debt_id) = old.debt_id {
                let debt_model = debts::Entity::find_by_id(debt_id.to_string())
                    .one(&db_tx)
                    .await?;
                if let Some(debt_model) = debt_model
                    && debt_model.source_transaction_id == transaction_id.to_string()
                {
                    let active = debts::ActiveModel {
                        id: ActiveValue::Set(debt_model.id),
                        initial_amount_minor: ActiveValue::Set(new.amount_minor),
                        start_date: ActiveValue::Set(new.occurred_at),
                        tags: ActiveValue::Set(encode_id_list(&new.tags)),
                        attachments: ActiveValue::Set(encode_string_list(&new.attachments)),
                        ..Default::default()
                    };
                    active.update(&db_tx).await?;
                }
            }

            let old_snapshot = snapshot_value(&old);
            let new_snapshot = snapshot_value(&new);
            let log = HistoryLog::new(
                HistoryAction::Update,
                EntityKind::Transaction,
                transaction_id.to_string(),
                "updated transaction",
                "transactions",
            )
            .old_value(old_snapshot.clone())
            .new_value(new_snapshot.clone())
            .changes(diff(&old_snapshot, &new_snapshot));
            history::record(&db_tx, &log).await?;

            Ok(())
        })
    }

    /// Soft-delete a transaction into the restore bin, reverting its
    /// balance effect. Both sides of a transfer pair are staged together.
    /// Returns the bin item id usable for restore.
    pub async fn delete_transaction(&self, transaction_id: Uuid) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let transaction = get_transaction(&db_tx, transaction_id).await?;
            let partner = match transaction.transfer_id {
                Some(partner_id) => Some(get_transaction(&db_tx, partner_id).await.map_err(
                    |error| match error {
                        LedgerError::NotFound(_) => {
                            LedgerError::NotFound("transfer partner not exists".to_string())
                        }
                        other => other,
                    },
                )?),
                None => None,
            };

            let description = match partner {
                Some(_) => "deleted transfer pair".to_string(),
                None => format!(
                    "deleted {} of {}",
                    transaction.kind.as_str(),
                    transaction.amount_minor
                ),
            };
            let log = HistoryLog::new(
                HistoryAction::Delete,
                EntityKind::Transaction,
                transaction_id.to_string(),
                description,
                "transactions",
            )
            .old_value(snapshot_value(&transaction));

            let deleted_at = Utc::now();
            let item = RestoreBinItem::new(
                BinPayload::Transaction(transaction.clone()),
                log.id,
                deleted_at,
            );
            let log = log.pending(item.id);

            remove_transaction(&db_tx, &transaction).await?;
            bin::stage(&db_tx, &item).await?;

            if let Some(partner) = partner {
                let partner_item =
                    RestoreBinItem::new(BinPayload::Transaction(partner.clone()), log.id, deleted_at);
                remove_transaction(&db_tx, &partner).await?;
                bin::stage(&db_tx, &partner_item).await?;
            }

            history::record(&db_tx, &log).await?;
            Ok(item.id)
        })
    }

    /// Create a transfer pair: an expense on `from`, an income on `to`,
    /// mutually referencing each other. Returns `(outgoing, incoming)` ids.
    pub async fn add_transfer(&self, cmd: TransferCmd) -> LedgerResult<(Uuid, Uuid)> {
        if cmd.from_wallet_id == cmd.to_wallet_id {
            return Err(LedgerError::Validation(
                "from_wallet_id and to_wallet_id must differ".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            require_wallet(&db_tx, cmd.from_wallet_id).await?;
            require_wallet(&db_tx, cmd.to_wallet_id).await?;
            require_tags(&db_tx, &cmd.tags).await?;
            let category = system_category(&db_tx, SystemCategory::Transfer).await?;

            let mut outgoing = Transaction::new(
                TxKind::Expense,
                cmd.amount_minor,
                cmd.from_wallet_id,
                category.id,
                cmd.occurred_at,
                cmd.notes.clone(),
                cmd.tags.clone(),
                Vec::new(),
                TxSource::Manual,
            )?;
            let mut incoming = Transaction::new(
                TxKind::Income,
                cmd.amount_minor,
                cmd.to_wallet_id,
                category.id,
                cmd.occurred_at,
                cmd.notes,
                cmd.tags,
                Vec::new(),
                TxSource::Manual,
            )?;
            outgoing.transfer_id = Some(incoming.id);
            incoming.transfer_id = Some(outgoing.id);

            insert_transaction(&db_tx, &outgoing).await?;
            insert_transaction(&db_tx, &incoming).await?;

            let log = HistoryLog::new(
                HistoryAction::Create,
                EntityKind::Transaction,
                outgoing.id.to_string(),
                format!("transferred {} between wallets", cmd.amount_minor),
                "transactions",
            )
            .new_value(snapshot_value(&[&outgoing, &incoming]));
            history::record(&db_tx, &log).await?;

            Ok((outgoing.id, incoming.id))
        })
    }

    /// Single transaction lookup with tags composed.
    pub async fn transaction(&self, transaction_id: Uuid) -> LedgerResult<Transaction> {
        get_transaction(&self.database, transaction_id).await
    }

    /// Newest-first page of transactions.
    pub async fn list_transactions(
        &self,
        filter: &TransactionListFilter,
        limit: u64,
    ) -> LedgerResult<Vec<Transaction>> {
        let (items, _next) = self.list_transactions_page(filter, limit, None).await?;
        Ok(items)
    }

    /// Newest-first page of transactions with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, id DESC)`.
    pub async fn list_transactions_page(
        &self,
        filter: &TransactionListFilter,
        limit: u64,
        cursor: Option<&str>,
    ) -> LedgerResult<(Vec<Transaction>, Option<String>)> {
        with_tx!(self, |db_tx| {
            validate_list_filter(filter)?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = transactions::Entity::find();
            if let Some(tag_id) = filter.tag_id {
                query = query
                    .join(
                        JoinType::InnerJoin,
                        transactions::Relation::TransactionTags.def(),
                    )
                    .filter(transaction_tags::Column::TagId.eq(tag_id.to_string()));
            }
            query = query
                .order_by_desc(transactions::Column::OccurredAt)
                .order_by_desc(transactions::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = TransactionsCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(transactions::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(transactions::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(transactions::Column::Id.lt(cursor.transaction_id)),
                        ),
                );
            }
            query = query.apply_tx_filters(filter);

            let rows: Vec<transactions::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out: Vec<Transaction> = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                let id = parse_uuid(&model.id, "transaction")?;
                let tags = tag_ids_for(&db_tx, id).await?;
                out.push(Transaction::from_model(model, tags)?);
            }

            let next_cursor = out.last().map(|tx| TransactionsCursor {
                occurred_at: tx.occurred_at,
                transaction_id: tx.id.to_string(),
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }
}
