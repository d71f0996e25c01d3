//! The module contains the `Wallet` struct and its storage model.

use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerResult, util::parse_uuid};

/// A wallet: a real wallet, a bank account or anything else money sits in.
///
/// `balance` is a stored running total kept equal to the sum of signed
/// amounts of the wallet's live transactions. Only the transaction write
/// path mutates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Stable identifier, generated once so the wallet can be renamed
    /// without breaking references.
    pub id: Uuid,
    pub name: String,
    pub balance: i64,
    pub type_id: Uuid,
    pub color: String,
}

impl Wallet {
    pub fn new(name: String, type_id: Uuid, color: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            balance: 0,
            type_id,
            color,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub balance: i64,
    pub type_id: String,
    pub color: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
    #[sea_orm(
        belongs_to = "super::wallet_types::Entity",
        from = "Column::TypeId",
        to = "super::wallet_types::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    WalletTypes,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::wallet_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletTypes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Wallet> for ActiveModel {
    fn from(value: &Wallet) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            balance: ActiveValue::Set(value.balance),
            type_id: ActiveValue::Set(value.type_id.to_string()),
            color: ActiveValue::Set(value.color.clone()),
        }
    }
}

impl TryFrom<Model> for Wallet {
    type Error = crate::LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "wallet")?,
            name: model.name,
            balance: model.balance,
            type_id: parse_uuid(&model.type_id, "wallet type")?,
            color: model.color,
        })
    }
}
