//! Uniform command surface over the mutation methods.
//!
//! Every mutation, whatever its entity, flows through one `dispatch`
//! call; each arm delegates to the operation that owns the atomic unit
//! and its audit entry. Reads and the catch-up pass stay direct calls.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    BudgetCmd, CategoryCmd, DebtCmd, DebtPaymentCmd, LedgerResult, ScheduleCmd, Settings,
    StateSnapshot, TransactionCmd, TransferCmd, TxSource, UpdateBudgetCmd, UpdateCategoryCmd,
    UpdateDebtCmd, UpdateScheduleCmd, UpdateTransactionCmd, UpdateWalletCmd, WalletCmd,
};

use super::Ledger;

/// A single mutation intent.
#[derive(Clone, Debug)]
pub enum Command {
    AddWallet(WalletCmd),
    UpdateWallet { wallet_id: Uuid, cmd: UpdateWalletCmd },
    DeleteWallet { wallet_id: Uuid },
    AddTransaction(TransactionCmd),
    UpdateTransaction { transaction_id: Uuid, cmd: UpdateTransactionCmd },
    DeleteTransaction { transaction_id: Uuid },
    AddTransfer(TransferCmd),
    AddCategory(CategoryCmd),
    AddSubCategory { parent_id: Uuid, cmd: CategoryCmd },
    UpdateCategory { category_id: Uuid, cmd: UpdateCategoryCmd },
    DeleteCategory { category_id: Uuid },
    AddTag { name: String },
    UpdateTag { tag_id: Uuid, name: String },
    DeleteTag { tag_id: Uuid },
    AddBudget(BudgetCmd),
    UpdateBudget { budget_id: Uuid, cmd: UpdateBudgetCmd },
    DeleteBudget { budget_id: Uuid },
    AddDebt(DebtCmd),
    AddDebtPayment { debt_id: Uuid, payment: DebtPaymentCmd },
    UpdateDebt { debt_id: Uuid, cmd: UpdateDebtCmd },
    DeleteDebt { debt_id: Uuid },
    AddSchedule(ScheduleCmd),
    UpdateSchedule { schedule_id: Uuid, cmd: UpdateScheduleCmd },
    DeleteSchedule { schedule_id: Uuid },
    RestoreFromBin { restore_id: Uuid },
    PermanentDelete { restore_id: Uuid },
    UpdateSettings(Settings),
    SetState(StateSnapshot),
}

/// What a dispatched command produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    Created { id: Uuid },
    /// Both halves of a new transfer pair.
    CreatedPair { outgoing_id: Uuid, incoming_id: Uuid },
    Updated,
    /// Soft-deleted; the id addresses the restore bin item.
    Deleted { restore_id: Uuid },
    Restored { entity_id: Uuid },
    Purged,
    StateReplaced,
}

impl Ledger {
    /// Run one mutation intent as one atomic unit.
    pub async fn dispatch(&self, command: Command) -> LedgerResult<Dispatched> {
        match command {
            Command::AddWallet(cmd) => {
                let id = self.create_wallet(cmd).await?;
                Ok(Dispatched::Created { id })
            }
            Command::UpdateWallet { wallet_id, cmd } => {
                self.update_wallet(wallet_id, cmd).await?;
                Ok(Dispatched::Updated)
            }
            Command::DeleteWallet { wallet_id } => {
                let restore_id = self.delete_wallet(wallet_id).await?;
                Ok(Dispatched::Deleted { restore_id })
            }
            Command::AddTransaction(cmd) => {
                let id = self.add_transaction(cmd, TxSource::Manual).await?;
                Ok(Dispatched::Created { id })
            }
            Command::UpdateTransaction { transaction_id, cmd } => {
                self.update_transaction(transaction_id, cmd).await?;
                Ok(Dispatched::Updated)
            }
            Command::DeleteTransaction { transaction_id } => {
                let restore_id = self.delete_transaction(transaction_id).await?;
                Ok(Dispatched::Deleted { restore_id })
            }
            Command::AddTransfer(cmd) => {
                let (outgoing_id, incoming_id) = self.add_transfer(cmd).await?;
                Ok(Dispatched::CreatedPair {
                    outgoing_id,
                    incoming_id,
                })
            }
            Command::AddCategory(cmd) => {
                let id = self.create_category(cmd).await?;
                Ok(Dispatched::Created { id })
            }
            Command::AddSubCategory { parent_id, cmd } => {
                let id = self.create_sub_category(parent_id, cmd).await?;
                Ok(Dispatched::Created { id })
            }
            Command::UpdateCategory { category_id, cmd } => {
                self.update_category(category_id, cmd).await?;
                Ok(Dispatched::Updated)
            }
            Command::DeleteCategory { category_id } => {
                let restore_id = self.delete_category(category_id).await?;
                Ok(Dispatched::Deleted { restore_id })
            }
            Command::AddTag { name } => {
                let id = self.create_tag(name).await?;
                Ok(Dispatched::Created { id })
            }
            Command::UpdateTag { tag_id, name } => {
                self.update_tag(tag_id, name).await?;
                Ok(Dispatched::Updated)
            }
            Command::DeleteTag { tag_id } => {
                let restore_id = self.delete_tag(tag_id).await?;
                Ok(Dispatched::Deleted { restore_id })
            }
            Command::AddBudget(cmd) => {
                let id = self.create_budget(cmd).await?;
                Ok(Dispatched::Created { id })
            }
            Command::UpdateBudget { budget_id, cmd } => {
                self.update_budget(budget_id, cmd).await?;
                Ok(Dispatched::Updated)
            }
            Command::DeleteBudget { budget_id } => {
                let restore_id = self.delete_budget(budget_id).await?;
                Ok(Dispatched::Deleted { restore_id })
            }
            Command::AddDebt(cmd) => {
                let id = self.create_debt(cmd).await?;
                Ok(Dispatched::Created { id })
            }
            Command::AddDebtPayment { debt_id, payment } => {
                let id = self.add_debt_payment(debt_id, payment).await?;
                Ok(Dispatched::Created { id })
            }
            Command::UpdateDebt { debt_id, cmd } => {
                self.update_debt(debt_id, cmd).await?;
                Ok(Dispatched::Updated)
            }
            Command::DeleteDebt { debt_id } => {
                let restore_id = self.delete_debt(debt_id).await?;
                Ok(Dispatched::Deleted { restore_id })
            }
            Command::AddSchedule(cmd) => {
                let id = self.create_schedule(cmd, Utc::now()).await?;
                Ok(Dispatched::Created { id })
            }
            Command::UpdateSchedule { schedule_id, cmd } => {
                self.update_schedule(schedule_id, cmd).await?;
                Ok(Dispatched::Updated)
            }
            Command::DeleteSchedule { schedule_id } => {
                let restore_id = self.delete_schedule(schedule_id).await?;
                Ok(Dispatched::Deleted { restore_id })
            }
            Command::RestoreFromBin { restore_id } => {
                let entity_id = self.restore_from_bin(restore_id).await?;
                Ok(Dispatched::Restored { entity_id })
            }
            Command::PermanentDelete { restore_id } => {
                self.permanently_delete(restore_id).await?;
                Ok(Dispatched::Purged)
            }
            Command::UpdateSettings(settings) => {
                self.update_settings(settings).await?;
                Ok(Dispatched::Updated)
            }
            Command::SetState(snapshot) => {
                self.set_state(snapshot).await?;
                Ok(Dispatched::StateReplaced)
            }
        }
    }
}
