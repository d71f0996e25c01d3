use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, prelude::*};
use uuid::Uuid;

use crate::{EntityKind, HistoryAction, HistoryLog, HistoryStatus, LedgerResult, history};

use super::Ledger;

pub(crate) async fn record<C: ConnectionTrait>(conn: &C, log: &HistoryLog) -> LedgerResult<()> {
    history::ActiveModel::from(log).insert(conn).await?;
    Ok(())
}

/// Flip a pending delete entry to `success` and drop its restore token.
/// Used when the staged entity is restored or permanently deleted.
pub(crate) async fn settle_pending<C: ConnectionTrait>(
    conn: &C,
    action_id: Uuid,
) -> LedgerResult<()> {
    let model = history::ActiveModel {
        id: ActiveValue::Set(action_id.to_string()),
        status: ActiveValue::Set(HistoryStatus::Success.as_str().to_string()),
        restore_id: ActiveValue::Set(None),
        ..Default::default()
    };
    model.update(conn).await?;
    Ok(())
}

/// Filters for listing history entries.
#[derive(Clone, Debug, Default)]
pub struct HistoryFilter {
    pub entity: Option<EntityKind>,
    pub action: Option<HistoryAction>,
}

impl Ledger {
    /// Newest-first history entries.
    pub async fn list_history(
        &self,
        filter: &HistoryFilter,
        limit: u64,
    ) -> LedgerResult<Vec<HistoryLog>> {
        let mut query = history::Entity::find()
            .order_by_desc(history::Column::Timestamp)
            .order_by_desc(history::Column::Id)
            .limit(limit);
        if let Some(entity) = filter.entity {
            query = query.filter(history::Column::Entity.eq(entity.as_str()));
        }
        if let Some(action) = filter.action {
            query = query.filter(history::Column::Action.eq(action.as_str()));
        }

        let models = query.all(&self.database).await?;
        let mut out = Vec::with_capacity(models.len());
        for model in models {
            out.push(HistoryLog::try_from(model)?);
        }
        Ok(out)
    }
}
