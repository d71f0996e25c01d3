use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    EntityKind, HistoryAction, HistoryLog, LedgerError, LedgerResult, SystemCategory, Transaction,
    TransactionCmd, TxKind, TxSource, UpdateWalletCmd, Wallet, WalletCmd, WalletType, diff,
    history::snapshot_value,
    restore_bin::{BinPayload, RestoreBinItem},
    transactions, wallet_types, wallets,
    util::{normalize_display, normalize_key, parse_uuid},
};

use super::{
    Ledger, bin, history, require_wallet, require_wallet_type, system_category,
    transactions as tx_ops, with_tx,
};

async fn reject_duplicate_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    except: Option<Uuid>,
) -> LedgerResult<()> {
    let key = normalize_key(name);
    let rows = wallets::Entity::find().all(conn).await?;
    for row in rows {
        if except.is_some_and(|id| id.to_string() == row.id) {
            continue;
        }
        if normalize_key(&row.name) == key {
            return Err(LedgerError::Duplicate("wallet already exists".to_string()));
        }
    }
    Ok(())
}

impl Ledger {
    /// Create a wallet. A nonzero opening balance becomes an initial
    /// system transaction so the balance always matches the ledger.
    pub async fn create_wallet(&self, cmd: WalletCmd) -> LedgerResult<Uuid> {
        let name = normalize_display(&cmd.name, "wallet")?;

        with_tx!(self, |db_tx| {
            require_wallet_type(&db_tx, cmd.type_id).await?;
            reject_duplicate_name(&db_tx, &name, None).await?;

            let wallet = Wallet::new(name, cmd.type_id, cmd.color);
            wallets::ActiveModel::from(&wallet).insert(&db_tx).await?;

            let log = HistoryLog::new(
                HistoryAction::Create,
                EntityKind::Wallet,
                wallet.id.to_string(),
                format!("added wallet {}", wallet.name),
                "wallets",
            )
            .new_value(snapshot_value(&wallet));
            history::record(&db_tx, &log).await?;

            if cmd.opening_balance_minor != 0 {
                let kind = if cmd.opening_balance_minor > 0 {
                    TxKind::Income
                } else {
                    TxKind::Expense
                };
                let uncategorized = system_category(&db_tx, SystemCategory::Uncategorized).await?;
                let opening = TransactionCmd::new(
                    kind,
                    cmd.opening_balance_minor.abs(),
                    wallet.id,
                    uncategorized.id,
                    Utc::now(),
                )
                .notes("Opening balance".to_string());
                tx_ops::create_transaction_in(&db_tx, opening, TxSource::System, "wallets")
                    .await?;
            }

            Ok(wallet.id)
        })
    }

    /// Rename, recolor, or retype a wallet. The balance is never touched
    /// here.
    pub async fn update_wallet(&self, wallet_id: Uuid, cmd: UpdateWalletCmd) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            let old = require_wallet(&db_tx, wallet_id).await?;

            let mut new = old.clone();
            if let Some(name) = cmd.name {
                let name = normalize_display(&name, "wallet")?;
                reject_duplicate_name(&db_tx, &name, Some(wallet_id)).await?;
                new.name = name;
            }
            if let Some(type_id) = cmd.type_id {
                require_wallet_type(&db_tx, type_id).await?;
                new.type_id = type_id;
            }
            if let Some(color) = cmd.color {
                new.color = color;
            }

            let active = wallets::ActiveModel {
                id: ActiveValue::Set(wallet_id.to_string()),
                name: ActiveValue::Set(new.name.clone()),
                type_id: ActiveValue::Set(new.type_id.to_string()),
                color: ActiveValue::Set(new.color.clone()),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            let old_snapshot = snapshot_value(&old);
            let new_snapshot = snapshot_value(&new);
            let log = HistoryLog::new(
                HistoryAction::Update,
                EntityKind::Wallet,
                wallet_id.to_string(),
                format!("updated wallet {}", new.name),
                "wallets",
            )
            .old_value(old_snapshot.clone())
            .new_value(new_snapshot.clone())
            .changes(diff(&old_snapshot, &new_snapshot));
            history::record(&db_tx, &log).await?;

            Ok(())
        })
    }

    /// Soft-delete a wallet together with every transaction that
    /// references it, including the partner side of any transfer pair.
    /// Returns the bin item id usable for restore.
    pub async fn delete_wallet(&self, wallet_id: Uuid) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let wallet = require_wallet(&db_tx, wallet_id).await?;

            let rows = transactions::Entity::find()
                .filter(transactions::Column::WalletId.eq(wallet_id.to_string()))
                .all(&db_tx)
                .await?;
            let mut staged: Vec<Transaction> = Vec::with_capacity(rows.len());
            let mut seen: HashSet<Uuid> = HashSet::new();
            for model in rows {
                let id = parse_uuid(&model.id, "transaction")?;
                let tags = tx_ops::tag_ids_for(&db_tx, id).await?;
                let transaction = Transaction::from_model(model, tags)?;
                if seen.insert(transaction.id) {
                    staged.push(transaction);
                }
            }
            // Partner halves live in other wallets but must go with the
            // pair, never dangle.
            let own: Vec<Transaction> = staged.clone();
            for transaction in own {
                if let Some(partner_id) = transaction.transfer_id
                    && !seen.contains(&partner_id)
                {
                    let partner = tx_ops::get_transaction(&db_tx, partner_id).await?;
                    seen.insert(partner.id);
                    staged.push(partner);
                }
            }

            for transaction in &staged {
                tx_ops::remove_transaction(&db_tx, transaction).await?;
            }

            // Snapshot the wallet after its ledger is reverted, so a
            // restore that replays the transactions lands on the original
            // balance.
            let reverted = require_wallet(&db_tx, wallet_id).await?;
            wallets::Entity::delete_by_id(wallet_id.to_string())
                .exec(&db_tx)
                .await?;

            let log = HistoryLog::new(
                HistoryAction::Delete,
                EntityKind::Wallet,
                wallet_id.to_string(),
                format!("deleted wallet {}", wallet.name),
                "wallets",
            )
            .old_value(snapshot_value(&wallet));
            let item = RestoreBinItem::new(
                BinPayload::Wallet {
                    wallet: reverted,
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

    pub async fn wallet(&self, wallet_id: Uuid) -> LedgerResult<Wallet> {
        require_wallet(&self.database, wallet_id).await
    }

    pub async fn list_wallets(&self) -> LedgerResult<Vec<Wallet>> {
        let rows = wallets::Entity::find()
            .order_by_asc(wallets::Column::Name)
            .all(&self.database)
            .await?;
        rows.into_iter().map(Wallet::try_from).collect()
    }

    /// Reference data seeded by migration.
    pub async fn list_wallet_types(&self) -> LedgerResult<Vec<WalletType>> {
        let rows = wallet_types::Entity::find()
            .order_by_asc(wallet_types::Column::Name)
            .all(&self.database)
            .await?;
        rows.into_iter().map(WalletType::try_from).collect()
    }
}
