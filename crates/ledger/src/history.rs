//! Append-only audit log.
//!
//! Every mutation in the ledger writes at least one entry. Updates carry a
//! structural field diff; deletes stay `pending` while the entity lives in
//! the restore bin and flip to `success` on restore or permanent delete.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{LedgerError, LedgerResult, util::parse_uuid};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
    Restore,
    Import,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Restore => "restore",
            Self::Import => "import",
        }
    }
}

impl TryFrom<&str> for HistoryAction {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "restore" => Ok(Self::Restore),
            "import" => Ok(Self::Import),
            other => Err(LedgerError::Validation(format!(
                "invalid history action: {other}"
            ))),
        }
    }
}

/// The kind of entity a history or bin row refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Wallet,
    Transaction,
    Debt,
    Budget,
    Category,
    Tag,
    Schedule,
    Settings,
    State,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Transaction => "transaction",
            Self::Debt => "debt",
            Self::Budget => "budget",
            Self::Category => "category",
            Self::Tag => "tag",
            Self::Schedule => "schedule",
            Self::Settings => "settings",
            Self::State => "state",
        }
    }
}

impl TryFrom<&str> for EntityKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "wallet" => Ok(Self::Wallet),
            "transaction" => Ok(Self::Transaction),
            "debt" => Ok(Self::Debt),
            "budget" => Ok(Self::Budget),
            "category" => Ok(Self::Category),
            "tag" => Ok(Self::Tag),
            "schedule" => Ok(Self::Schedule),
            "settings" => Ok(Self::Settings),
            "state" => Ok(Self::State),
            other => Err(LedgerError::Validation(format!(
                "invalid entity kind: {other}"
            ))),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Success,
    /// The entry's entity currently lives only in the restore bin.
    Pending,
    Failed,
}

impl HistoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for HistoryStatus {
    type Error = LedgerError;

    fn try_from(value: &str) -> LedgerResult<Self> {
        match value {
            "success" => Ok(Self::Success),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            other => Err(LedgerError::Validation(format!(
                "invalid history status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryLog {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    pub entity: EntityKind,
    pub entity_id: String,
    pub description: String,
    pub context: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub changes: Option<Value>,
    pub status: HistoryStatus,
    /// Set while the entity sits in the restore bin; the bin item id.
    pub restore_id: Option<Uuid>,
}

impl HistoryLog {
    #[must_use]
    pub fn new(
        action: HistoryAction,
        entity: EntityKind,
        entity_id: impl Into<String>,
        description: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            entity,
            entity_id: entity_id.into(),
            description: description.into(),
            context: context.into(),
            old_value: None,
            new_value: None,
            changes: None,
            status: HistoryStatus::Success,
            restore_id: None,
        }
    }

    #[must_use]
    pub fn old_value(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    #[must_use]
    pub fn new_value(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }

    #[must_use]
    pub fn changes(mut self, changes: Option<Value>) -> Self {
        self.changes = changes;
        self
    }

    /// Mark the entry as waiting on a restore bin item.
    #[must_use]
    pub fn pending(mut self, restore_id: Uuid) -> Self {
        self.status = HistoryStatus::Pending;
        self.restore_id = Some(restore_id);
        self
    }
}

/// Serialize a value for a history payload, degrading to a placeholder
/// instead of failing the mutation. History is best-effort.
pub fn snapshot_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|_| Value::String("[unserializable]".to_string()))
}

/// Structural field diff between two serialized objects.
///
/// Returns `{field: {"old": .., "new": ..}}` for every field present on
/// `new` whose value differs from `old`, or `None` when nothing differs.
pub fn diff(old: &Value, new: &Value) -> Option<Value> {
    let new_map = new.as_object()?;
    let empty = Map::new();
    let old_map = old.as_object().unwrap_or(&empty);

    let mut changes = Map::new();
    for (field, new_value) in new_map {
        let old_value = old_map.get(field).unwrap_or(&Value::Null);
        if old_value != new_value {
            changes.insert(
                field.clone(),
                json!({ "old": old_value, "new": new_value }),
            );
        }
    }

    if changes.is_empty() {
        None
    } else {
        Some(Value::Object(changes))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    pub description: String,
    pub context: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changes: Option<String>,
    pub status: String,
    pub restore_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&HistoryLog> for ActiveModel {
    fn from(value: &HistoryLog) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            timestamp: ActiveValue::Set(value.timestamp),
            action: ActiveValue::Set(value.action.as_str().to_string()),
            entity: ActiveValue::Set(value.entity.as_str().to_string()),
            entity_id: ActiveValue::Set(value.entity_id.clone()),
            description: ActiveValue::Set(value.description.clone()),
            context: ActiveValue::Set(value.context.clone()),
            old_value: ActiveValue::Set(value.old_value.as_ref().map(Value::to_string)),
            new_value: ActiveValue::Set(value.new_value.as_ref().map(Value::to_string)),
            changes: ActiveValue::Set(value.changes.as_ref().map(Value::to_string)),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            restore_id: ActiveValue::Set(value.restore_id.map(|id| id.to_string())),
        }
    }
}

fn decode_json_column(raw: Option<&str>, label: &str) -> LedgerResult<Option<Value>> {
    raw.map(|raw| {
        serde_json::from_str(raw)
            .map_err(|_| LedgerError::Serialization(format!("invalid {label} payload")))
    })
    .transpose()
}

impl TryFrom<Model> for HistoryLog {
    type Error = LedgerError;

    fn try_from(model: Model) -> LedgerResult<Self> {
        let restore_id = model
            .restore_id
            .as_deref()
            .map(|raw| parse_uuid(raw, "restore"))
            .transpose()?;
        Ok(Self {
            id: parse_uuid(&model.id, "history")?,
            timestamp: model.timestamp,
            action: HistoryAction::try_from(model.action.as_str())?,
            entity: EntityKind::try_from(model.entity.as_str())?,
            entity_id: model.entity_id,
            description: model.description,
            context: model.context,
            old_value: decode_json_column(model.old_value.as_deref(), "old_value")?,
            new_value: decode_json_column(model.new_value.as_deref(), "new_value")?,
            changes: decode_json_column(model.changes.as_deref(), "changes")?,
            status: HistoryStatus::try_from(model.status.as_str())?,
            restore_id,
        })
    }
}
