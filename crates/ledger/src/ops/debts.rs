use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Debt, DebtCmd, DebtKind, DebtPaymentCmd, DebtStatus, EntityKind, HistoryAction, HistoryLog,
    LedgerError, LedgerResult, SystemCategory, Transaction, TxKind, TxSource, UpdateDebtCmd, debts,
    diff,
    history::snapshot_value,
    restore_bin::{BinPayload, RestoreBinItem},
    settings::DebtDeletePolicy,
    transactions,
    util::{encode_id_list, encode_string_list, normalize_display, parse_uuid},
};

use super::{
    Ledger, bin, history, require_tags, require_wallet, settings as settings_ops, system_category,
    transactions as tx_ops, with_tx,
};

pub(crate) async fn linked_transaction_ids<C: ConnectionTrait>(
    conn: &C,
    debt_id: Uuid,
) -> LedgerResult<Vec<Uuid>> {
    let rows = transactions::Entity::find()
        .filter(transactions::Column::DebtId.eq(debt_id.to_string()))
        .order_by_asc(transactions::Column::OccurredAt)
        .order_by_asc(transactions::Column::Id)
        .all(conn)
        .await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(parse_uuid(&row.id, "transaction")?);
    }
    Ok(out)
}

pub(crate) async fn get_debt<C: ConnectionTrait>(conn: &C, debt_id: Uuid) -> LedgerResult<Debt> {
    let model = debts::Entity::find_by_id(debt_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound("debt not exists".to_string()))?;
    let linked = linked_transaction_ids(conn, debt_id).await?;
    Debt::from_model(model, linked)
}

fn origin_category(kind: DebtKind) -> SystemCategory {
    match kind {
        DebtKind::Debt => SystemCategory::Debt,
        DebtKind::Loan => SystemCategory::Loan,
    }
}

fn payment_category(kind: DebtKind) -> SystemCategory {
    match kind {
        DebtKind::Debt => SystemCategory::DebtPayment,
        DebtKind::Loan => SystemCategory::LoanPayment,
    }
}

/// Borrowing increases cash, lending decreases it.
fn origin_tx_kind(kind: DebtKind) -> TxKind {
    match kind {
        DebtKind::Debt => TxKind::Income,
        DebtKind::Loan => TxKind::Expense,
    }
}

impl Ledger {
    /// Create a debt or loan.
    ///
    /// With `source_transaction_id` set, the existing transaction is
    /// retro-labeled as the origin and no balance moves; otherwise a new
    /// origin transaction is synthesized through the ordinary balance
    /// path.
    pub async fn create_debt(&self, cmd: DebtCmd) -> LedgerResult<Uuid> {
        let person = normalize_display(&cmd.person, "person")?;

        with_tx!(self, |db_tx| {
            require_tags(&db_tx, &cmd.tags).await?;
            let category = system_category(&db_tx, origin_category(cmd.kind)).await?;
            let debt_id = Uuid::new_v4();

            let origin = match cmd.source_transaction_id {
                Some(source_id) => {
                    let origin = tx_ops::get_transaction(&db_tx, source_id).await?;
                    if origin.debt_id.is_some() {
                        return Err(LedgerError::Validation(
                            "transaction already linked to a debt".to_string(),
                        ));
                    }
                    if origin.transfer_id.is_some() {
                        return Err(LedgerError::Validation(
                            "transfer sides cannot anchor a debt".to_string(),
                        ));
                    }
                    let active = transactions::ActiveModel {
                        id: ActiveValue::Set(origin.id.to_string()),
                        category_id: ActiveValue::Set(category.id.to_string()),
                        debt_id: ActiveValue::Set(Some(debt_id.to_string())),
                        ..Default::default()
                    };
                    active.update(&db_tx).await?;
                    origin
                }
                None => {
                    require_wallet(&db_tx, cmd.wallet_id).await?;
                    let mut origin = Transaction::new(
                        origin_tx_kind(cmd.kind),
                        cmd.amount_minor,
                        cmd.wallet_id,
                        category.id,
                        cmd.occurred_at,
                        None,
                        cmd.tags.clone(),
                        cmd.attachments.clone(),
                        TxSource::System,
                    )?;
                    origin.debt_id = Some(debt_id);
                    tx_ops::insert_transaction(&db_tx, &origin).await?;

                    let log = HistoryLog::new(
                        HistoryAction::Create,
                        EntityKind::Transaction,
                        origin.id.to_string(),
                        format!(
                            "added {} of {}",
                            origin.kind.as_str(),
                            origin.amount_minor
                        ),
                        "debts",
                    )
                    .new_value(snapshot_value(&origin));
                    history::record(&db_tx, &log).await?;

                    origin
                }
            };

            let debt = Debt {
                id: debt_id,
                person,
                kind: cmd.kind,
                initial_amount_minor: origin.amount_minor,
                paid_amount_minor: 0,
                start_date: origin.occurred_at,
                due_date: cmd.due_date,
                status: DebtStatus::Active,
                wallet_id: origin.wallet_id,
                source_transaction_id: origin.id,
                linked_transaction_ids: vec![origin.id],
                tags: cmd.tags,
                attachments: cmd.attachments,
            };
            debts::ActiveModel::from(&debt).insert(&db_tx).await?;

            let log = HistoryLog::new(
                HistoryAction::Create,
                EntityKind::Debt,
                debt.id.to_string(),
                format!("added {} for {}", debt.kind.as_str(), debt.person),
                "debts",
            )
            .new_value(snapshot_value(&debt));
            history::record(&db_tx, &log).await?;

            Ok(debt.id)
        })
    }

    /// Record a payment, flipping the debt to `paid` when the running
    /// total reaches the initial amount. Returns the payment transaction
    /// id.
    pub async fn add_debt_payment(
        &self,
        debt_id: Uuid,
        payment: DebtPaymentCmd,
    ) -> LedgerResult<Uuid> {
        if payment.amount_minor <= 0 {
            return Err(LedgerError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let debt = get_debt(&db_tx, debt_id).await?;
            if debt.status == DebtStatus::Paid {
                return Err(LedgerError::Validation("debt already paid".to_string()));
            }
            if payment.amount_minor > debt.remaining_minor() {
                return Err(LedgerError::Validation(
                    "payment exceeds remaining amount".to_string(),
                ));
            }

            let wallet_id = payment.wallet_id.unwrap_or(debt.wallet_id);
            require_wallet(&db_tx, wallet_id).await?;
            require_tags(&db_tx, &payment.tags).await?;
            let category = system_category(&db_tx, payment_category(debt.kind)).await?;

            let mut transaction = Transaction::new(
                origin_tx_kind(debt.kind).opposite(),
                payment.amount_minor,
                wallet_id,
                category.id,
                payment.occurred_at,
                payment.notes,
                payment.tags,
                payment.attachments,
                TxSource::System,
            )?;
            transaction.debt_id = Some(debt_id);
            tx_ops::insert_transaction(&db_tx, &transaction).await?;

            let log = HistoryLog::new(
                HistoryAction::Create,
                EntityKind::Transaction,
                transaction.id.to_string(),
                format!(
                    "added payment of {} for {}",
                    transaction.amount_minor, debt.person
                ),
                "debts",
            )
            .new_value(snapshot_value(&transaction));
            history::record(&db_tx, &log).await?;

            let settles = debt.settles_with(payment.amount_minor);
            let mut updated = debt.clone();
            updated.paid_amount_minor += payment.amount_minor;
            if settles {
                updated.status = DebtStatus::Paid;
            }
            updated.linked_transaction_ids.push(transaction.id);

            let active = debts::ActiveModel {
                id: ActiveValue::Set(debt_id.to_string()),
                paid_amount_minor: ActiveValue::Set(updated.paid_amount_minor),
                status: ActiveValue::Set(updated.status.as_str().to_string()),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            if settles {
                let old_snapshot = snapshot_value(&debt);
                let new_snapshot = snapshot_value(&updated);
                let log = HistoryLog::new(
                    HistoryAction::Update,
                    EntityKind::Debt,
                    debt_id.to_string(),
                    format!("{} for {} paid in full", debt.kind.as_str(), debt.person),
                    "debts",
                )
                .old_value(old_snapshot.clone())
                .new_value(new_snapshot.clone())
                .changes(diff(&old_snapshot, &new_snapshot));
                history::record(&db_tx, &log).await?;
            }

            Ok(transaction.id)
        })
    }

    /// Edit a debt's descriptive fields. Amounts and status only move
    /// through payments.
    pub async fn update_debt(&self, debt_id: Uuid, cmd: UpdateDebtCmd) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            let old = get_debt(&db_tx, debt_id).await?;

            let mut new = old.clone();
            if let Some(person) = cmd.person {
                new.person = normalize_display(&person, "person")?;
            }
            if let Some(due_date) = cmd.due_date {
                new.due_date = Some(due_date);
            }
            if let Some(tags) = cmd.tags {
                require_tags(&db_tx, &tags).await?;
                new.tags = tags;
            }
            if let Some(attachments) = cmd.attachments {
                new.attachments = attachments;
            }

            let active = debts::ActiveModel {
                id: ActiveValue::Set(debt_id.to_string()),
                person: ActiveValue::Set(new.person.clone()),
                due_date: ActiveValue::Set(new.due_date),
                tags: ActiveValue::Set(encode_id_list(&new.tags)),
                attachments: ActiveValue::Set(encode_string_list(&new.attachments)),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            let old_snapshot = snapshot_value(&old);
            let new_snapshot = snapshot_value(&new);
            let log = HistoryLog::new(
                HistoryAction::Update,
                EntityKind::Debt,
                debt_id.to_string(),
                format!("updated {} for {}", new.kind.as_str(), new.person),
                "debts",
            )
            .old_value(old_snapshot.clone())
            .new_value(new_snapshot.clone())
            .changes(diff(&old_snapshot, &new_snapshot));
            history::record(&db_tx, &log).await?;

            Ok(())
        })
    }

    /// Soft-delete a debt following the configured policy: `keep` leaves
    /// linked transactions in the ledger as free-standing rows, `cascade`
    /// stages them in the debt's bin payload and reverts their balance
    /// effects. Returns the bin item id.
    pub async fn delete_debt(&self, debt_id: Uuid) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let debt = get_debt(&db_tx, debt_id).await?;
            let policy = settings_ops::load(&db_tx).await?.debt_delete_policy;

            let mut staged: Vec<Transaction> = Vec::new();
            match policy {
                DebtDeletePolicy::Keep => {
                    // Unlink so the rows stand on their own; the payload
                    // remembers the ids for a later re-link on restore.
                    transactions::Entity::update_many()
                        .col_expr(transactions::Column::DebtId, Expr::value(Option::<String>::None))
                        .filter(transactions::Column::DebtId.eq(debt_id.to_string()))
                        .exec(&db_tx)
                        .await?;
                }
                DebtDeletePolicy::Cascade => {
                    for transaction_id in &debt.linked_transaction_ids {
                        let transaction = tx_ops::get_transaction(&db_tx, *transaction_id).await?;
                        tx_ops::remove_transaction(&db_tx, &transaction).await?;
                        staged.push(transaction);
                    }
                }
            }

            debts::Entity::delete_by_id(debt_id.to_string())
                .exec(&db_tx)
                .await?;

            let log = HistoryLog::new(
                HistoryAction::Delete,
                EntityKind::Debt,
                debt_id.to_string(),
                format!("deleted {} for {}", debt.kind.as_str(), debt.person),
                "debts",
            )
            .old_value(snapshot_value(&debt));
            let item = RestoreBinItem::new(
                BinPayload::Debt {
                    debt,
                    transactions: staged,
                },
                log.id,
                Utc::now(),
            );
            let log = log.pending(item.id);

            bin::stage(&db_tx, &item).await?;
            history::record(&db_tx, &log).await?;

            Ok(item.id)
        })
    }

    pub async fn debt(&self, debt_id: Uuid) -> LedgerResult<Debt> {
        get_debt(&self.database, debt_id).await
    }

    /// All debts, newest first, with linked transaction ids composed.
    pub async fn list_debts(&self) -> LedgerResult<Vec<Debt>> {
        with_tx!(self, |db_tx| {
            let rows = debts::Entity::find()
                .order_by_desc(debts::Column::StartDate)
                .order_by_desc(debts::Column::Id)
                .all(&db_tx)
                .await?;
            let mut out = Vec::with_capacity(rows.len());
            for model in rows {
                let id = parse_uuid(&model.id, "debt")?;
                let linked = linked_transaction_ids(&db_tx, id).await?;
                out.push(Debt::from_model(model, linked)?);
            }
            Ok(out)
        })
    }
}
