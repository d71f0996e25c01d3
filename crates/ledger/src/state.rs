//! Whole-ledger snapshot for export and full-overwrite import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Budget, Category, Debt, HistoryLog, RestoreBinItem, ScheduledTransaction, Settings, Tag,
    Transaction, Wallet, WalletType,
};

/// Every persisted table, with transactions carrying their tag ids inline.
///
/// Import replaces the whole ledger with this content; there is no merge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub exported_at: DateTime<Utc>,
    pub wallet_types: Vec<WalletType>,
    pub wallets: Vec<Wallet>,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub transactions: Vec<Transaction>,
    pub budgets: Vec<Budget>,
    pub debts: Vec<Debt>,
    pub schedules: Vec<ScheduledTransaction>,
    pub settings: Settings,
    pub history: Vec<HistoryLog>,
    pub restore_bin: Vec<RestoreBinItem>,
}
