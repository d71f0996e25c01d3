//! Command structs for ledger operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists. Update commands carry `None`
//! for fields the caller leaves unchanged.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::{BudgetKind, DebtKind, Frequency, TxKind};

/// Create a single income or expense transaction.
#[derive(Clone, Debug)]
pub struct TransactionCmd {
    pub kind: TxKind,
    pub amount_minor: i64,
    pub wallet_id: Uuid,
    pub category_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub tags: Vec<Uuid>,
    pub attachments: Vec<String>,
}

impl TransactionCmd {
    #[must_use]
    pub fn new(
        kind: TxKind,
        amount_minor: i64,
        wallet_id: Uuid,
        category_id: Uuid,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            amount_minor,
            wallet_id,
            category_id,
            occurred_at,
            notes: None,
            tags: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Update an existing transaction.
///
/// On a transfer-side transaction only the neutral fields (category, date,
/// notes, tags, attachments) are accepted; amount, kind, and wallet edits
/// are rejected to keep the pair symmetric.
#[derive(Clone, Debug, Default)]
pub struct UpdateTransactionCmd {
    pub kind: Option<TxKind>,
    pub amount_minor: Option<i64>,
    pub wallet_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub tags: Option<Vec<Uuid>>,
    pub attachments: Option<Vec<String>>,
}

impl UpdateTransactionCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kind(mut self, kind: TxKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn wallet_id(mut self, wallet_id: Uuid) -> Self {
        self.wallet_id = Some(wallet_id);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = Some(tags);
        self
    }

    #[must_use]
    pub fn attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = Some(attachments);
        self
    }
}

/// Create a wallet-to-wallet transfer pair.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub from_wallet_id: Uuid,
    pub to_wallet_id: Uuid,
    pub amount_minor: i64,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub tags: Vec<Uuid>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        from_wallet_id: Uuid,
        to_wallet_id: Uuid,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            from_wallet_id,
            to_wallet_id,
            amount_minor,
            occurred_at,
            notes: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = tags;
        self
    }
}

/// Create a wallet.
#[derive(Clone, Debug)]
pub struct WalletCmd {
    pub name: String,
    pub type_id: Uuid,
    pub color: String,
    /// Materialized as an initial system transaction when nonzero.
    pub opening_balance_minor: i64,
}

impl WalletCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, type_id: Uuid, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id,
            color: color.into(),
            opening_balance_minor: 0,
        }
    }

    #[must_use]
    pub fn opening_balance_minor(mut self, amount_minor: i64) -> Self {
        self.opening_balance_minor = amount_minor;
        self
    }
}

/// Update an existing wallet. The balance is never editable here.
#[derive(Clone, Debug, Default)]
pub struct UpdateWalletCmd {
    pub name: Option<String>,
    pub type_id: Option<Uuid>,
    pub color: Option<String>,
}

impl UpdateWalletCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn type_id(mut self, type_id: Uuid) -> Self {
        self.type_id = Some(type_id);
        self
    }

    #[must_use]
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Create a category. Subcategory creation passes the parent separately.
#[derive(Clone, Debug)]
pub struct CategoryCmd {
    pub name: String,
    pub icon: Option<String>,
}

impl CategoryCmd {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
        }
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Requested parent change for a category update.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CategoryParent {
    /// Detach and make the category a root.
    Root,
    /// Attach under the named root category.
    Under(Uuid),
}

/// Update an existing category. System categories reject all of this.
#[derive(Clone, Debug, Default)]
pub struct UpdateCategoryCmd {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub parent: Option<CategoryParent>,
}

impl UpdateCategoryCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn parent(mut self, parent: CategoryParent) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Create a budget over categories and/or tags.
#[derive(Clone, Debug)]
pub struct BudgetCmd {
    pub name: String,
    pub amount_minor: i64,
    pub kind: BudgetKind,
    pub category_ids: Vec<Uuid>,
    pub tags: Vec<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notify: bool,
}

impl BudgetCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, amount_minor: i64, kind: BudgetKind) -> Self {
        Self {
            name: name.into(),
            amount_minor,
            kind,
            category_ids: Vec::new(),
            tags: Vec::new(),
            start_date: None,
            end_date: None,
            notify: false,
        }
    }

    #[must_use]
    pub fn category_ids(mut self, category_ids: Vec<Uuid>) -> Self {
        self.category_ids = category_ids;
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn window(mut self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }
}

/// Update an existing budget.
#[derive(Clone, Debug, Default)]
pub struct UpdateBudgetCmd {
    pub name: Option<String>,
    pub amount_minor: Option<i64>,
    pub kind: Option<BudgetKind>,
    pub category_ids: Option<Vec<Uuid>>,
    pub tags: Option<Vec<Uuid>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notify: Option<bool>,
}

impl UpdateBudgetCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: BudgetKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn category_ids(mut self, category_ids: Vec<Uuid>) -> Self {
        self.category_ids = Some(category_ids);
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = Some(tags);
        self
    }

    #[must_use]
    pub fn window(mut self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = Some(notify);
        self
    }
}

/// Create a debt or loan.
///
/// With `source_transaction_id` set, that existing transaction becomes the
/// origin and the amount, wallet, and start date derive from it; otherwise
/// a new origin transaction is synthesized from the fields here.
#[derive(Clone, Debug)]
pub struct DebtCmd {
    pub person: String,
    pub kind: DebtKind,
    pub amount_minor: i64,
    pub wallet_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<Uuid>,
    pub attachments: Vec<String>,
    pub source_transaction_id: Option<Uuid>,
}

impl DebtCmd {
    #[must_use]
    pub fn new(
        person: impl Into<String>,
        kind: DebtKind,
        amount_minor: i64,
        wallet_id: Uuid,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            person: person.into(),
            kind,
            amount_minor,
            wallet_id,
            occurred_at,
            due_date: None,
            tags: Vec::new(),
            attachments: Vec::new(),
            source_transaction_id: None,
        }
    }

    #[must_use]
    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub fn source_transaction_id(mut self, transaction_id: Uuid) -> Self {
        self.source_transaction_id = Some(transaction_id);
        self
    }
}

/// Record a payment against a debt or loan.
#[derive(Clone, Debug)]
pub struct DebtPaymentCmd {
    pub amount_minor: i64,
    pub occurred_at: DateTime<Utc>,
    /// Defaults to the debt's own wallet when unset.
    pub wallet_id: Option<Uuid>,
    pub notes: Option<String>,
    pub tags: Vec<Uuid>,
    pub attachments: Vec<String>,
}

impl DebtPaymentCmd {
    #[must_use]
    pub fn new(amount_minor: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            amount_minor,
            occurred_at,
            wallet_id: None,
            notes: None,
            tags: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn wallet_id(mut self, wallet_id: Uuid) -> Self {
        self.wallet_id = Some(wallet_id);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Update a debt's descriptive fields. Amounts and status only move
/// through payments.
#[derive(Clone, Debug, Default)]
pub struct UpdateDebtCmd {
    pub person: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub tags: Option<Vec<Uuid>>,
    pub attachments: Option<Vec<String>>,
}

impl UpdateDebtCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn person(mut self, person: impl Into<String>) -> Self {
        self.person = Some(person.into());
        self
    }

    #[must_use]
    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = Some(tags);
        self
    }

    #[must_use]
    pub fn attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = Some(attachments);
        self
    }
}

/// Create a scheduled transaction.
#[derive(Clone, Debug)]
pub struct ScheduleCmd {
    pub name: String,
    pub kind: TxKind,
    pub amount_minor: i64,
    pub wallet_id: Uuid,
    pub category_id: Uuid,
    pub start_date: NaiveDate,
    /// Time of day stamped onto every materialized occurrence.
    pub time: NaiveTime,
    pub frequency: Frequency,
    pub end_date: Option<NaiveDate>,
    pub notify: bool,
    pub notes: Option<String>,
    pub tags: Vec<Uuid>,
}

impl ScheduleCmd {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: TxKind,
        amount_minor: i64,
        wallet_id: Uuid,
        category_id: Uuid,
        start_date: NaiveDate,
        frequency: Frequency,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            amount_minor,
            wallet_id,
            category_id,
            start_date,
            time: NaiveTime::MIN,
            frequency,
            end_date: None,
            notify: false,
            notes: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn time(mut self, time: NaiveTime) -> Self {
        self.time = time;
        self
    }

    #[must_use]
    pub fn end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = tags;
        self
    }
}

/// Update a scheduled transaction.
///
/// Once a schedule has run it is locked: only `name`, `notes`, and
/// `notify` are accepted, everything else fails with `Locked`.
#[derive(Clone, Debug, Default)]
pub struct UpdateScheduleCmd {
    pub name: Option<String>,
    pub kind: Option<TxKind>,
    pub amount_minor: Option<i64>,
    pub wallet_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub frequency: Option<Frequency>,
    pub end_date: Option<NaiveDate>,
    pub notify: Option<bool>,
    pub notes: Option<String>,
    pub tags: Option<Vec<Uuid>>,
}

impl UpdateScheduleCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: TxKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn wallet_id(mut self, wallet_id: Uuid) -> Self {
        self.wallet_id = Some(wallet_id);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    #[must_use]
    pub fn time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    #[must_use]
    pub fn end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = Some(notify);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = Some(tags);
        self
    }
}
