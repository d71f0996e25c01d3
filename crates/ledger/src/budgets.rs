//! Budgets. "Spent" is never stored; it is computed on read from live
//! expense transactions matching the budget's categories or tags inside
//! the active window.

use chrono::NaiveDate;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    LedgerError, LedgerResult,
    util::{decode_id_list, encode_id_list, parse_uuid},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    /// Rolls over every calendar month.
    Periodic,
    /// Runs once over an explicit `[start_date, end_date]` window.
    OneTime,
}

impl BudgetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::OneTime => "one_time",
        }
    }
}

impl TryFrom<&str> for BudgetKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "periodic" => Ok(Self::Periodic),
            "one_time" => Ok(Self::OneTime),
            other => Err(LedgerError::Validation(format!(
                "invalid budget kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub name: String,
    pub category_ids: Vec<Uuid>,
    pub tags: Vec<Uuid>,
    pub amount_minor: i64,
    pub kind: BudgetKind,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notify: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    /// JSON list of category ids.
    pub category_ids: String,
    /// JSON list of tag ids.
    pub tags: String,
    pub amount_minor: i64,
    pub kind: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notify: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Budget> for ActiveModel {
    fn from(value: &Budget) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            category_ids: ActiveValue::Set(encode_id_list(&value.category_ids)),
            tags: ActiveValue::Set(encode_id_list(&value.tags)),
            amount_minor: ActiveValue::Set(value.amount_minor),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            start_date: ActiveValue::Set(value.start_date),
            end_date: ActiveValue::Set(value.end_date),
            notify: ActiveValue::Set(value.notify),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "budget")?,
            name: model.name,
            category_ids: decode_id_list(&model.category_ids, "category")?,
            tags: decode_id_list(&model.tags, "tag")?,
            amount_minor: model.amount_minor,
            kind: BudgetKind::try_from(model.kind.as_str())?,
            start_date: model.start_date,
            end_date: model.end_date,
            notify: model.notify,
        })
    }
}
