//! The single balance-adjustment path.
//!
//! Every engine that moves money (transactions, transfers, debts,
//! schedules, restores) funnels its wallet balance writes through here,
//! inside the caller's DB transaction.

use std::collections::HashMap;

use sea_orm::{ActiveValue, ConnectionTrait, Statement, TransactionTrait, prelude::*};
use serde_json::json;
use uuid::Uuid;

use crate::{
    EntityKind, HistoryAction, HistoryLog, LedgerError, LedgerResult, TxKind, util::parse_uuid,
    wallets,
};

use super::{Ledger, history, with_tx};

/// Compute post-mutation balances for a set of signed deltas without
/// writing anything. Deltas against the same wallet accumulate.
pub(crate) async fn preview_wallet_deltas<C: ConnectionTrait>(
    conn: &C,
    deltas: &[(Uuid, i64)],
) -> LedgerResult<HashMap<Uuid, i64>> {
    let mut new_balances: HashMap<Uuid, i64> = HashMap::new();
    for (wallet_id, delta) in deltas {
        let current = match new_balances.get(wallet_id) {
            Some(balance) => *balance,
            None => {
                let model = wallets::Entity::find_by_id(wallet_id.to_string())
                    .one(conn)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound("wallet not exists".to_string()))?;
                model.balance
            }
        };
        new_balances.insert(*wallet_id, current + delta);
    }
    Ok(new_balances)
}

pub(crate) async fn persist_wallet_balances<C: ConnectionTrait>(
    conn: &C,
    new_balances: HashMap<Uuid, i64>,
) -> LedgerResult<()> {
    for (wallet_id, balance) in new_balances {
        let model = wallets::ActiveModel {
            id: ActiveValue::Set(wallet_id.to_string()),
            balance: ActiveValue::Set(balance),
            ..Default::default()
        };
        model.update(conn).await?;
    }
    Ok(())
}

pub(crate) async fn apply_wallet_deltas<C: ConnectionTrait>(
    conn: &C,
    deltas: &[(Uuid, i64)],
) -> LedgerResult<()> {
    let new_balances = preview_wallet_deltas(conn, deltas).await?;
    persist_wallet_balances(conn, new_balances).await
}

/// Sum of signed amounts over one wallet's live transactions.
pub(crate) async fn live_signed_sum<C: ConnectionTrait>(
    conn: &C,
    wallet_id: Uuid,
) -> LedgerResult<i64> {
    let backend = conn.get_database_backend();
    let stmt = Statement::from_sql_and_values(
        backend,
        "SELECT COALESCE(SUM(CASE WHEN kind = ? THEN amount_minor ELSE -amount_minor END), 0) \
         AS sum FROM transactions WHERE wallet_id = ?",
        [
            TxKind::Income.as_str().into(),
            wallet_id.to_string().into(),
        ],
    );
    let row = conn.query_one(stmt).await?;
    Ok(row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0))
}

/// A wallet whose stored balance disagrees with its live transactions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub wallet_id: Uuid,
    pub stored_minor: i64,
    pub computed_minor: i64,
}

impl Ledger {
    /// Recompute every wallet's balance from its live transactions and
    /// report disagreements. Read-only.
    pub async fn verify_balances(&self) -> LedgerResult<Vec<BalanceMismatch>> {
        let wallet_models = wallets::Entity::find().all(&self.database).await?;
        let mut out = Vec::new();
        for model in wallet_models {
            let wallet_id = parse_uuid(&model.id, "wallet")?;
            let computed = live_signed_sum(&self.database, wallet_id).await?;
            if computed != model.balance {
                out.push(BalanceMismatch {
                    wallet_id,
                    stored_minor: model.balance,
                    computed_minor: computed,
                });
            }
        }
        Ok(out)
    }

    /// Rewrite stored balances from the ledger, one history entry per
    /// corrected wallet. Returns the corrections applied.
    pub async fn recompute_balances(&self) -> LedgerResult<Vec<BalanceMismatch>> {
        with_tx!(self, |db_tx| {
            let wallet_models = wallets::Entity::find().all(&db_tx).await?;
            let mut out = Vec::new();
            for model in wallet_models {
                let wallet_id = parse_uuid(&model.id, "wallet")?;
                let computed = live_signed_sum(&db_tx, wallet_id).await?;
                if computed == model.balance {
                    continue;
                }

                let active = wallets::ActiveModel {
                    id: ActiveValue::Set(model.id.clone()),
                    balance: ActiveValue::Set(computed),
                    ..Default::default()
                };
                active.update(&db_tx).await?;

                let log = HistoryLog::new(
                    HistoryAction::Update,
                    EntityKind::Wallet,
                    model.id.clone(),
                    format!("recomputed balance {} -> {}", model.balance, computed),
                    "wallets",
                )
                .changes(Some(json!({
                    "balance": { "old": model.balance, "new": computed },
                })));
                history::record(&db_tx, &log).await?;

                out.push(BalanceMismatch {
                    wallet_id,
                    stored_minor: model.balance,
                    computed_minor: computed,
                });
            }
            Ok(out)
        })
    }
}
