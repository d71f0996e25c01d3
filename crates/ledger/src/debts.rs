//! Debts and loans.
//!
//! A debt (the user owes) or loan (the user is owed) is anchored to the
//! transaction that produced its initial balance effect. Payments are
//! ordinary transactions carrying `debt_id`, so the linked list is derived
//! from the transactions table instead of being stored twice.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    LedgerError, LedgerResult,
    util::{decode_id_list, decode_string_list, encode_id_list, encode_string_list, parse_uuid},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtKind {
    /// Money the user owes; borrowing increased cash.
    Debt,
    /// Money owed to the user; lending decreased cash.
    Loan,
}

impl DebtKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debt => "debt",
            Self::Loan => "loan",
        }
    }
}

impl TryFrom<&str> for DebtKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "debt" => Ok(Self::Debt),
            "loan" => Ok(Self::Loan),
            other => Err(LedgerError::Validation(format!(
                "invalid debt kind: {other}"
            ))),
        }
    }
}

/// Lifecycle: `active` until `paid_amount` reaches `initial_amount`, then
/// `paid`. The transition is monotonic; nothing flips it back.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Active,
    Paid,
}

impl DebtStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paid => "paid",
        }
    }
}

impl TryFrom<&str> for DebtStatus {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "active" => Ok(Self::Active),
            "paid" => Ok(Self::Paid),
            other => Err(LedgerError::Validation(format!(
                "invalid debt status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub id: Uuid,
    pub person: String,
    pub kind: DebtKind,
    pub initial_amount_minor: i64,
    pub paid_amount_minor: i64,
    pub start_date: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub status: DebtStatus,
    pub wallet_id: Uuid,
    /// The transaction that created the debt's initial balance effect.
    pub source_transaction_id: Uuid,
    /// Ids of transactions carrying this debt's `debt_id`, composed on read.
    pub linked_transaction_ids: Vec<Uuid>,
    pub tags: Vec<Uuid>,
    pub attachments: Vec<String>,
}

impl Debt {
    /// True when a payment of `amount_minor` would push the running total
    /// to or past the initial amount.
    pub fn settles_with(&self, amount_minor: i64) -> bool {
        self.paid_amount_minor + amount_minor >= self.initial_amount_minor
    }

    pub fn remaining_minor(&self) -> i64 {
        self.initial_amount_minor - self.paid_amount_minor
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "debts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub person: String,
    pub kind: String,
    pub initial_amount_minor: i64,
    pub paid_amount_minor: i64,
    pub start_date: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub wallet_id: String,
    pub source_transaction_id: String,
    /// JSON list of tag ids.
    pub tags: String,
    /// JSON list of opaque attachment references.
    pub attachments: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Wallets,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Debt> for ActiveModel {
    fn from(value: &Debt) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            person: ActiveValue::Set(value.person.clone()),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            initial_amount_minor: ActiveValue::Set(value.initial_amount_minor),
            paid_amount_minor: ActiveValue::Set(value.paid_amount_minor),
            start_date: ActiveValue::Set(value.start_date),
            due_date: ActiveValue::Set(value.due_date),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            wallet_id: ActiveValue::Set(value.wallet_id.to_string()),
            source_transaction_id: ActiveValue::Set(value.source_transaction_id.to_string()),
            tags: ActiveValue::Set(encode_id_list(&value.tags)),
            attachments: ActiveValue::Set(encode_string_list(&value.attachments)),
        }
    }
}

impl Debt {
    /// Rebuild the domain struct from a stored row plus its linked ids.
    pub fn from_model(model: Model, linked_transaction_ids: Vec<Uuid>) -> LedgerResult<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "debt")?,
            person: model.person,
            kind: DebtKind::try_from(model.kind.as_str())?,
            initial_amount_minor: model.initial_amount_minor,
            paid_amount_minor: model.paid_amount_minor,
            start_date: model.start_date,
            due_date: model.due_date,
            status: DebtStatus::try_from(model.status.as_str())?,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            source_transaction_id: parse_uuid(&model.source_transaction_id, "transaction")?,
            linked_transaction_ids,
            tags: decode_id_list(&model.tags, "tag")?,
            attachments: decode_string_list(&model.attachments, "attachment")?,
        })
    }
}
