//! Wallet type reference rows (seeded by migration, read-only at runtime).

use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerResult, util::parse_uuid};

/// A wallet type such as "Cash" or "Bank Account".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletType {
    pub id: Uuid,
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallet_types")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallets::Entity")]
    Wallets,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&WalletType> for ActiveModel {
    fn from(value: &WalletType) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            icon: ActiveValue::Set(value.icon.clone()),
        }
    }
}

impl TryFrom<Model> for WalletType {
    type Error = crate::LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "wallet type")?,
            name: model.name,
            icon: model.icon,
        })
    }
}
