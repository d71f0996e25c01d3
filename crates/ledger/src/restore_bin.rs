//! Soft-deleted entities, parked with everything needed to restore them.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Budget, Category, Debt, LedgerError, LedgerResult, ScheduledTransaction, Tag, Transaction,
    history::EntityKind, util::parse_uuid,
};

/// Full snapshot of a deleted entity plus the rows that fell with it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "data", rename_all = "snake_case")]
pub enum BinPayload {
    Transaction(Transaction),
    Wallet {
        wallet: crate::Wallet,
        transactions: Vec<Transaction>,
    },
    Debt {
        debt: Debt,
        transactions: Vec<Transaction>,
    },
    Category {
        category: Category,
        children: Vec<Category>,
    },
    Tag {
        tag: Tag,
        transaction_ids: Vec<Uuid>,
    },
    Budget(Budget),
    Schedule(ScheduledTransaction),
}

impl BinPayload {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::Transaction(_) => EntityKind::Transaction,
            Self::Wallet { .. } => EntityKind::Wallet,
            Self::Debt { .. } => EntityKind::Debt,
            Self::Category { .. } => EntityKind::Category,
            Self::Tag { .. } => EntityKind::Tag,
            Self::Budget(_) => EntityKind::Budget,
            Self::Schedule(_) => EntityKind::Schedule,
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::Transaction(transaction) => transaction.id,
            Self::Wallet { wallet, .. } => wallet.id,
            Self::Debt { debt, .. } => debt.id,
            Self::Category { category, .. } => category.id,
            Self::Tag { tag, .. } => tag.id,
            Self::Budget(budget) => budget.id,
            Self::Schedule(schedule) => schedule.id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestoreBinItem {
    pub id: Uuid,
    pub entity: EntityKind,
    pub entity_id: Uuid,
    pub deleted_at: DateTime<Utc>,
    pub payload: BinPayload,
    /// The history entry recorded for the delete that staged this item.
    pub origin_action_id: Uuid,
}

impl RestoreBinItem {
    pub fn new(payload: BinPayload, origin_action_id: Uuid, deleted_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity: payload.entity_kind(),
            entity_id: payload.entity_id(),
            deleted_at,
            payload,
            origin_action_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "restore_bin")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub entity: String,
    pub entity_id: String,
    pub deleted_at: DateTime<Utc>,
    pub payload: String,
    pub origin_action_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RestoreBinItem> for ActiveModel {
    fn from(value: &RestoreBinItem) -> Self {
        let payload = serde_json::to_string(&value.payload)
            .unwrap_or_else(|_| "{}".to_string());
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            entity: ActiveValue::Set(value.entity.as_str().to_string()),
            entity_id: ActiveValue::Set(value.entity_id.to_string()),
            deleted_at: ActiveValue::Set(value.deleted_at),
            payload: ActiveValue::Set(payload),
            origin_action_id: ActiveValue::Set(value.origin_action_id.to_string()),
        }
    }
}

impl TryFrom<Model> for RestoreBinItem {
    type Error = LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        let payload: BinPayload = serde_json::from_str(&model.payload)
            .map_err(|_| LedgerError::Serialization("invalid bin payload".to_string()))?;
        Ok(Self {
            id: parse_uuid(&model.id, "bin item")?,
            entity: EntityKind::try_from(model.entity.as_str())?,
            entity_id: parse_uuid(&model.entity_id, "bin entity")?,
            deleted_at: model.deleted_at,
            payload,
            origin_action_id: parse_uuid(&model.origin_action_id, "origin action")?,
        })
    }
}
