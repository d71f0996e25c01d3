pub use budgets::{Budget, BudgetKind};
pub use categories::{Category, SystemCategory};
pub use commands::{
    BudgetCmd, CategoryCmd, CategoryParent, DebtCmd, DebtPaymentCmd, ScheduleCmd, TransactionCmd,
    TransferCmd, UpdateBudgetCmd, UpdateCategoryCmd, UpdateDebtCmd, UpdateScheduleCmd,
    UpdateTransactionCmd, UpdateWalletCmd, WalletCmd,
};
pub use debts::{Debt, DebtKind, DebtStatus};
pub use error::{LedgerError, LedgerResult};
pub use history::{EntityKind, HistoryAction, HistoryLog, HistoryStatus, diff};
pub use ops::{
    BalanceMismatch, CatchUpSummary, Command, Dispatched, HistoryFilter, Ledger, LedgerBuilder,
    TransactionListFilter,
};
pub use restore_bin::{BinPayload, RestoreBinItem};
pub use schedules::{Frequency, ScheduleStatus, ScheduledTransaction, next_date};
pub use settings::{DebtDeletePolicy, Settings};
pub use state::StateSnapshot;
pub use tags::Tag;
pub use transactions::{Transaction, TxKind, TxSource};
pub use wallet_types::WalletType;
pub use wallets::Wallet;

mod budgets;
mod categories;
mod commands;
mod debts;
mod error;
mod history;
mod ops;
mod restore_bin;
mod schedules;
mod settings;
mod state;
mod tags;
mod transaction_tags;
mod transactions;
mod util;
mod wallet_types;
mod wallets;
