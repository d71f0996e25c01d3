//! Categories: a flat arena of roots and subcategories.
//!
//! A subcategory is just a category whose `parent_id` points at a root;
//! nesting never goes deeper than one level. System rows are seeded by
//! migration and resolved by `system_kind`, never by hardcoded ids.

use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, LedgerResult, util::parse_uuid};

/// Engine-owned category rows the ledger resolves at runtime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemCategory {
    /// Both sides of a wallet-to-wallet transfer.
    Transfer,
    /// Fallback for transactions whose category was permanently removed.
    Uncategorized,
    /// Group root the four debt subcategories hang under.
    Debts,
    /// Origin of a borrowed amount.
    Debt,
    /// Origin of a lent amount.
    Loan,
    /// Repayment towards a debt.
    DebtPayment,
    /// Collection of a loan.
    LoanPayment,
}

impl SystemCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Uncategorized => "uncategorized",
            Self::Debts => "debts",
            Self::Debt => "debt",
            Self::Loan => "loan",
            Self::DebtPayment => "debt_payment",
            Self::LoanPayment => "loan_payment",
        }
    }
}

impl TryFrom<&str> for SystemCategory {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "transfer" => Ok(Self::Transfer),
            "uncategorized" => Ok(Self::Uncategorized),
            "debts" => Ok(Self::Debts),
            "debt" => Ok(Self::Debt),
            "loan" => Ok(Self::Loan),
            "debt_payment" => Ok(Self::DebtPayment),
            "loan_payment" => Ok(Self::LoanPayment),
            other => Err(LedgerError::Validation(format!(
                "invalid system category: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub icon: Option<String>,
    /// Root categories carry `None`; subcategories point at their root.
    pub parent_id: Option<Uuid>,
    pub system_kind: Option<SystemCategory>,
}

impl Category {
    pub fn new(name: String, icon: Option<String>, parent_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            icon,
            parent_id,
            system_kind: None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.system_kind.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub name_norm: String,
    pub icon: Option<String>,
    pub parent_id: Option<String>,
    pub system_kind: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Category> for ActiveModel {
    fn from(value: &Category) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            name_norm: ActiveValue::Set(crate::util::normalize_key(&value.name)),
            icon: ActiveValue::Set(value.icon.clone()),
            parent_id: ActiveValue::Set(value.parent_id.map(|id| id.to_string())),
            system_kind: ActiveValue::Set(value.system_kind.map(|k| k.as_str().to_string())),
        }
    }
}

impl TryFrom<Model> for Category {
    type Error = LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        let parent_id = model
            .parent_id
            .as_deref()
            .map(|raw| parse_uuid(raw, "category"))
            .transpose()?;
        let system_kind = model
            .system_kind
            .as_deref()
            .map(SystemCategory::try_from)
            .transpose()?;
        Ok(Self {
            id: parse_uuid(&model.id, "category")?,
            name: model.name,
            icon: model.icon,
            parent_id,
            system_kind,
        })
    }
}
