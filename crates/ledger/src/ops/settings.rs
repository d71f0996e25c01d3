use sea_orm::{ConnectionTrait, TransactionTrait, prelude::*};

use crate::{
    EntityKind, HistoryAction, HistoryLog, LedgerResult, Settings, diff,
    history::snapshot_value,
    settings::{self, SETTINGS_ROW_ID},
};

use super::{Ledger, history, with_tx};

/// Missing row reads as the defaults; the row is only written on the
/// first explicit update.
pub(crate) async fn load<C: ConnectionTrait>(conn: &C) -> LedgerResult<Settings> {
    match settings::Entity::find_by_id(SETTINGS_ROW_ID).one(conn).await? {
        Some(model) => Settings::try_from(model),
        None => Ok(Settings::default()),
    }
}

impl Ledger {
    pub async fn settings(&self) -> LedgerResult<Settings> {
        load(&self.database).await
    }

    pub async fn update_settings(&self, data: Settings) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            let old = load(&db_tx).await?;

            let exists = settings::Entity::find_by_id(SETTINGS_ROW_ID)
                .one(&db_tx)
                .await?
                .is_some();
            let active = settings::ActiveModel::from(&data);
            if exists {
                active.update(&db_tx).await?;
            } else {
                active.insert(&db_tx).await?;
            }

            let old_snapshot = snapshot_value(&old);
            let new_snapshot = snapshot_value(&data);
            let log = HistoryLog::new(
                HistoryAction::Update,
                EntityKind::Settings,
                SETTINGS_ROW_ID.to_string(),
                "updated settings",
                "settings",
            )
            .old_value(old_snapshot.clone())
            .new_value(new_snapshot.clone())
            .changes(diff(&old_snapshot, &new_snapshot));
            history::record(&db_tx, &log).await?;

            Ok(())
        })
    }
}
