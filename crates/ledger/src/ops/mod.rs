use std::sync::atomic::AtomicBool;

use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{Category, LedgerError, LedgerResult, SystemCategory, Wallet, WalletType};

mod balances;
mod bin;
mod budgets;
mod categories;
mod debts;
mod dispatch;
mod history;
mod schedules;
mod settings;
mod state;
mod tags;
mod transactions;
mod wallets;

pub use balances::BalanceMismatch;
pub use dispatch::{Command, Dispatched};
pub use history::HistoryFilter;
pub use schedules::CatchUpSummary;
pub use transactions::TransactionListFilter;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    /// Single-flight gate for the catch-up pass.
    catch_up_running: AtomicBool,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }
}

pub(crate) async fn require_wallet<C: ConnectionTrait>(
    conn: &C,
    wallet_id: Uuid,
) -> LedgerResult<Wallet> {
    let model = crate::wallets::Entity::find_by_id(wallet_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound("wallet not exists".to_string()))?;
    Wallet::try_from(model)
}

pub(crate) async fn require_wallet_type<C: ConnectionTrait>(
    conn: &C,
    type_id: Uuid,
) -> LedgerResult<WalletType> {
    let model = crate::wallet_types::Entity::find_by_id(type_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound("wallet type not exists".to_string()))?;
    WalletType::try_from(model)
}

pub(crate) async fn require_category<C: ConnectionTrait>(
    conn: &C,
    category_id: Uuid,
) -> LedgerResult<Category> {
    let model = crate::categories::Entity::find_by_id(category_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound("category not exists".to_string()))?;
    Category::try_from(model)
}

pub(crate) async fn require_tags<C: ConnectionTrait>(
    conn: &C,
    tag_ids: &[Uuid],
) -> LedgerResult<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = tag_ids.iter().map(Uuid::to_string).collect();
    let found = crate::tags::Entity::find()
        .filter(crate::tags::Column::Id.is_in(ids))
        .count(conn)
        .await?;
    if found as usize != tag_ids.len() {
        return Err(LedgerError::NotFound("tag not exists".to_string()));
    }
    Ok(())
}

/// Resolve an engine-owned category by kind. These rows are seeded by the
/// migration, so a miss means a broken install.
pub(crate) async fn system_category<C: ConnectionTrait>(
    conn: &C,
    kind: SystemCategory,
) -> LedgerResult<Category> {
    let model = crate::categories::Entity::find()
        .filter(crate::categories::Column::SystemKind.eq(kind.as_str()))
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound("system category not exists".to_string()))?;
    Category::try_from(model)
}

/// The builder for `Ledger`
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
}

impl LedgerBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Construct `Ledger`
    pub async fn build(self) -> LedgerResult<Ledger> {
        Ok(Ledger {
            database: self.database,
            catch_up_running: AtomicBool::new(false),
        })
    }
}
