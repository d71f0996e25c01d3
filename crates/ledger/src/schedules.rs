//! Scheduled transactions and their due-date arithmetic.

use chrono::{Days, Months, NaiveDate, NaiveTime};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    LedgerError, LedgerResult, TxKind,
    util::{decode_id_list, encode_id_list, parse_uuid},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl TryFrom<&str> for Frequency {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "once" => Ok(Self::Once),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(LedgerError::Validation(format!(
                "invalid frequency: {other}"
            ))),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Active,
    /// Absorbing: reached when `end_date` is exceeded or a `once`
    /// schedule has materialized.
    Completed,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl TryFrom<&str> for ScheduleStatus {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(LedgerError::Validation(format!(
                "invalid schedule status: {other}"
            ))),
        }
    }
}

/// Advance a date by exactly one calendar unit of `frequency`.
///
/// Monthly and yearly steps clamp to the end of shorter months
/// (Jan 31 + 1 month = Feb 28/29), matching calendar arithmetic. `once`
/// is the identity since a `once` schedule never recurs.
pub fn next_date(date: NaiveDate, frequency: Frequency) -> NaiveDate {
    match frequency {
        Frequency::Once => date,
        Frequency::Daily => date.checked_add_days(Days::new(1)).unwrap_or(date),
        Frequency::Weekly => date.checked_add_days(Days::new(7)).unwrap_or(date),
        Frequency::Monthly => date.checked_add_months(Months::new(1)).unwrap_or(date),
        Frequency::Yearly => date.checked_add_months(Months::new(12)).unwrap_or(date),
    }
}

/// A recurrence rule that materializes transactions.
///
/// `next_due_date` is the next date at which materialization should occur,
/// or `None` once the schedule is completed. `last_run` stays `None` until
/// the first successful materialization; from then on the schedule is
/// `locked` and destructive edits are rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTransaction {
    pub id: Uuid,
    pub name: String,
    pub amount_minor: i64,
    pub kind: TxKind,
    pub wallet_id: Uuid,
    pub category_id: Uuid,
    pub start_date: NaiveDate,
    pub time: NaiveTime,
    pub frequency: Frequency,
    pub end_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    pub last_run: Option<NaiveDate>,
    pub status: ScheduleStatus,
    pub locked: bool,
    pub notify: bool,
    pub notes: Option<String>,
    pub tags: Vec<Uuid>,
}

impl ScheduledTransaction {
    /// The first candidate date the catch-up loop should consider.
    pub fn first_candidate(&self) -> NaiveDate {
        match self.last_run {
            Some(last) => next_date(last, self.frequency),
            None => self.start_date,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scheduled_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub amount_minor: i64,
    pub kind: String,
    pub wallet_id: String,
    pub category_id: String,
    pub start_date: NaiveDate,
    pub time: NaiveTime,
    pub frequency: String,
    pub end_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    pub last_run: Option<NaiveDate>,
    pub status: String,
    pub locked: bool,
    pub notify: bool,
    pub notes: Option<String>,
    /// JSON list of tag ids.
    pub tags: String,
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

impl From<&ScheduledTransaction> for ActiveModel {
    fn from(value: &ScheduledTransaction) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            amount_minor: ActiveValue::Set(value.amount_minor),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            wallet_id: ActiveValue::Set(value.wallet_id.to_string()),
            category_id: ActiveValue::Set(value.category_id.to_string()),
            start_date: ActiveValue::Set(value.start_date),
            time: ActiveValue::Set(value.time),
            frequency: ActiveValue::Set(value.frequency.as_str().to_string()),
            end_date: ActiveValue::Set(value.end_date),
            next_due_date: ActiveValue::Set(value.next_due_date),
            last_run: ActiveValue::Set(value.last_run),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            locked: ActiveValue::Set(value.locked),
            notify: ActiveValue::Set(value.notify),
            notes: ActiveValue::Set(value.notes.clone()),
            tags: ActiveValue::Set(encode_id_list(&value.tags)),
        }
    }
}

impl TryFrom<Model> for ScheduledTransaction {
    type Error = LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "schedule")?,
            name: model.name,
            amount_minor: model.amount_minor,
            kind: TxKind::try_from(model.kind.as_str())?,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            category_id: parse_uuid(&model.category_id, "category")?,
            start_date: model.start_date,
            time: model.time,
            frequency: Frequency::try_from(model.frequency.as_str())?,
            end_date: model.end_date,
            next_due_date: model.next_due_date,
            last_run: model.last_run,
            status: ScheduleStatus::try_from(model.status.as_str())?,
            locked: model.locked,
            notify: model.notify,
            notes: model.notes,
            tags: decode_id_list(&model.tags, "tag")?,
        })
    }
}
