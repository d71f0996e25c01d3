//! Ledger-wide settings, stored as a single row.

use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, LedgerResult};

/// The settings table holds exactly one row with this id.
pub const SETTINGS_ROW_ID: i32 = 1;

/// What deleting a debt does to the transactions linked to it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtDeletePolicy {
    /// Keep linked transactions as plain transactions.
    #[default]
    Keep,
    /// Soft-delete linked transactions together with the debt.
    Cascade,
}

impl DebtDeletePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Cascade => "cascade",
        }
    }
}

impl TryFrom<&str> for DebtDeletePolicy {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "keep" => Ok(Self::Keep),
            "cascade" => Ok(Self::Cascade),
            other => Err(LedgerError::Validation(format!(
                "invalid debt delete policy: {other}"
            ))),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub debt_delete_policy: DebtDeletePolicy,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub debt_delete_policy: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settings> for ActiveModel {
    fn from(value: &Settings) -> Self {
        Self {
            id: ActiveValue::Set(SETTINGS_ROW_ID),
            debt_delete_policy: ActiveValue::Set(value.debt_delete_policy.as_str().to_string()),
        }
    }
}

impl TryFrom<Model> for Settings {
    type Error = LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        Ok(Self {
            debt_delete_policy: DebtDeletePolicy::try_from(model.debt_delete_policy.as_str())?,
        })
    }
}
