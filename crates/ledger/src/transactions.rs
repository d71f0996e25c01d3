//! The module contains the `Transaction` struct and its storage model.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    LedgerError, LedgerResult,
    util::{decode_string_list, encode_string_list, parse_uuid},
};

/// Direction of a transaction. The stored amount is always positive; the
/// kind carries the sign applied to the wallet balance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Income,
    Expense,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// The reciprocal kind, used by transfer pairs.
    pub fn opposite(self) -> Self {
        match self {
            Self::Income => Self::Expense,
            Self::Expense => Self::Income,
        }
    }
}

impl TryFrom<&str> for TxKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(LedgerError::Validation(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

/// Who created a transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxSource {
    /// Entered by the user.
    Manual,
    /// Synthesized by the ledger (opening balances, debt origins).
    System,
    /// Materialized by the recurrence engine.
    Scheduled,
}

impl TxSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::System => "system",
            Self::Scheduled => "scheduled",
        }
    }
}

impl TryFrom<&str> for TxSource {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "manual" => Ok(Self::Manual),
            "system" => Ok(Self::System),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(LedgerError::Validation(format!(
                "invalid transaction source: {other}"
            ))),
        }
    }
}

/// A single ledger movement against one wallet.
///
/// If `transfer_id` is set, exactly one other transaction exists with the
/// reciprocal kind and the same amount whose `transfer_id` points back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TxKind,
    pub amount_minor: i64,
    pub wallet_id: Uuid,
    pub category_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub tags: Vec<Uuid>,
    pub transfer_id: Option<Uuid>,
    pub debt_id: Option<Uuid>,
    pub attachments: Vec<String>,
    pub source: TxSource,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TxKind,
        amount_minor: i64,
        wallet_id: Uuid,
        category_id: Uuid,
        occurred_at: DateTime<Utc>,
        notes: Option<String>,
        tags: Vec<Uuid>,
        attachments: Vec<String>,
        source: TxSource,
    ) -> LedgerResult<Self> {
        if amount_minor <= 0 {
            return Err(LedgerError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            amount_minor,
            wallet_id,
            category_id,
            occurred_at,
            notes,
            tags,
            transfer_id: None,
            debt_id: None,
            attachments,
            source,
        })
    }

    /// The amount as applied to the wallet balance.
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TxKind::Income => self.amount_minor,
            TxKind::Expense => -self.amount_minor,
        }
    }

    /// Rebuild the domain struct from a stored row plus its tag ids.
    pub fn from_model(model: Model, tags: Vec<Uuid>) -> LedgerResult<Self> {
        let transfer_id = model
            .transfer_id
            .as_deref()
            .map(|raw| parse_uuid(raw, "transfer"))
            .transpose()?;
        let debt_id = model
            .debt_id
            .as_deref()
            .map(|raw| parse_uuid(raw, "debt"))
            .transpose()?;
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            kind: TxKind::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            category_id: parse_uuid(&model.category_id, "category")?,
            occurred_at: model.occurred_at,
            notes: model.notes,
            tags,
            transfer_id,
            debt_id,
            attachments: decode_string_list(&model.attachments, "attachment")?,
            source: TxSource::try_from(model.source.as_str())?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub amount_minor: i64,
    pub wallet_id: String,
    pub category_id: String,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub transfer_id: Option<String>,
    pub debt_id: Option<String>,
    /// JSON list of opaque attachment references.
    pub attachments: String,
    pub source: String,
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
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Categories,
    #[sea_orm(has_many = "super::transaction_tags::Entity")]
    TransactionTags,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::transaction_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(value: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(value.amount_minor),
            wallet_id: ActiveValue::Set(value.wallet_id.to_string()),
            category_id: ActiveValue::Set(value.category_id.to_string()),
            occurred_at: ActiveValue::Set(value.occurred_at),
            notes: ActiveValue::Set(value.notes.clone()),
            transfer_id: ActiveValue::Set(value.transfer_id.map(|id| id.to_string())),
            debt_id: ActiveValue::Set(value.debt_id.map(|id| id.to_string())),
            attachments: ActiveValue::Set(encode_string_list(&value.attachments)),
            source: ActiveValue::Set(value.source.as_str().to_string()),
        }
    }
}
