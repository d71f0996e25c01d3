use std::sync::atomic::Ordering;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    EntityKind, Frequency, HistoryAction, HistoryLog, LedgerError, LedgerResult,
    ScheduleCmd, ScheduleStatus, ScheduledTransaction, TransactionCmd, TxSource,
    UpdateScheduleCmd, diff,
    history::snapshot_value,
    restore_bin::{BinPayload, RestoreBinItem},
    schedules, next_date,
    util::{normalize_display, parse_uuid},
};

use super::{
    Ledger, bin, history, require_category, require_tags, require_wallet,
    transactions as tx_ops, with_tx,
};

/// Counters for one catch-up pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CatchUpSummary {
    /// Schedules that were due when the pass started.
    pub schedules: usize,
    /// Transactions materialized.
    pub created: usize,
    /// Schedules that reached `completed` during the pass.
    pub completed: usize,
    /// Schedules whose unit failed and rolled back.
    pub failed: usize,
}

struct CatchUpOutcome {
    occurrences: usize,
    completed: bool,
}

fn occurrence_timestamp(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

async fn get_schedule(
    db_tx: &DatabaseTransaction,
    schedule_id: Uuid,
) -> LedgerResult<ScheduledTransaction> {
    schedules::Entity::find_by_id(schedule_id.to_string())
        .one(db_tx)
        .await?
        .ok_or_else(|| LedgerError::NotFound("schedule not exists".to_string()))?
        .try_into()
}

/// Materialize every occurrence of `schedule` due at `now`, inside the
/// caller's unit. Advances `last_run`, locks the schedule after its first
/// occurrence, and leaves `next_due_date` at the first future candidate
/// (or completes the schedule).
async fn catch_up_schedule(
    db_tx: &DatabaseTransaction,
    schedule: &ScheduledTransaction,
    now: DateTime<Utc>,
) -> LedgerResult<CatchUpOutcome> {
    let today = now.date_naive();
    let mut current = schedule.clone();
    let mut occurrences = 0usize;
    let mut candidate = current.first_candidate();

    loop {
        if candidate > today {
            break;
        }
        if let Some(end) = current.end_date
            && candidate > end
        {
            current.status = ScheduleStatus::Completed;
            break;
        }

        let cmd = TransactionCmd::new(
            current.kind,
            current.amount_minor,
            current.wallet_id,
            current.category_id,
            occurrence_timestamp(candidate, current.time),
        )
        .tags(current.tags.clone());
        let cmd = match &current.notes {
            Some(notes) => cmd.notes(notes.clone()),
            None => cmd,
        };
        tx_ops::create_transaction_in(db_tx, cmd, TxSource::Scheduled, "schedules").await?;

        occurrences += 1;
        current.last_run = Some(candidate);
        current.locked = true;
        if current.frequency == Frequency::Once {
            current.status = ScheduleStatus::Completed;
            break;
        }
        candidate = next_date(candidate, current.frequency);
    }

    if current.status == ScheduleStatus::Active {
        match current.end_date {
            Some(end) if candidate > end => {
                current.status = ScheduleStatus::Completed;
                current.next_due_date = None;
            }
            _ => current.next_due_date = Some(candidate),
        }
    } else {
        current.next_due_date = None;
    }

    schedules::ActiveModel::from(&current).update(db_tx).await?;

    if occurrences > 0 {
        let old_snapshot = snapshot_value(schedule);
        let new_snapshot = snapshot_value(&current);
        let log = HistoryLog::new(
            HistoryAction::Update,
            EntityKind::Schedule,
            current.id.to_string(),
            format!("materialized {} occurrences of {}", occurrences, current.name),
            "schedules",
        )
        .old_value(old_snapshot.clone())
        .new_value(new_snapshot.clone())
        .changes(diff(&old_snapshot, &new_snapshot));
        history::record(db_tx, &log).await?;
    }

    Ok(CatchUpOutcome {
        occurrences,
        completed: current.status == ScheduleStatus::Completed,
    })
}

impl Ledger {
    /// Create a schedule and immediately catch it up inside the creation
    /// unit, so a backdated `start_date` materializes right away.
    pub async fn create_schedule(&self, cmd: ScheduleCmd, now: DateTime<Utc>) -> LedgerResult<Uuid> {
        if cmd.amount_minor <= 0 {
            return Err(LedgerError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }
        if let Some(end) = cmd.end_date
            && end < cmd.start_date
        {
            return Err(LedgerError::Validation(
                "end_date must not precede start_date".to_string(),
            ));
        }
        let name = normalize_display(&cmd.name, "schedule")?;

        with_tx!(self, |db_tx| {
            require_wallet(&db_tx, cmd.wallet_id).await?;
            require_category(&db_tx, cmd.category_id).await?;
            require_tags(&db_tx, &cmd.tags).await?;

            let schedule = ScheduledTransaction {
                id: Uuid::new_v4(),
                name,
                amount_minor: cmd.amount_minor,
                kind: cmd.kind,
                wallet_id: cmd.wallet_id,
                category_id: cmd.category_id,
                start_date: cmd.start_date,
                time: cmd.time,
                frequency: cmd.frequency,
                end_date: cmd.end_date,
                next_due_date: Some(cmd.start_date),
                last_run: None,
                status: ScheduleStatus::Active,
                locked: false,
                notify: cmd.notify,
                notes: cmd.notes,
                tags: cmd.tags,
            };
            schedules::ActiveModel::from(&schedule).insert(&db_tx).await?;

            let log = HistoryLog::new(
                HistoryAction::Create,
                EntityKind::Schedule,
                schedule.id.to_string(),
                format!("added schedule {}", schedule.name),
                "schedules",
            )
            .new_value(snapshot_value(&schedule));
            history::record(&db_tx, &log).await?;

            catch_up_schedule(&db_tx, &schedule, now).await?;

            Ok(schedule.id)
        })
    }

    /// Edit a schedule. Once it has materialized an occurrence it is
    /// locked: only `name`, `notes`, and `notify` may change.
    pub async fn update_schedule(
        &self,
        schedule_id: Uuid,
        cmd: UpdateScheduleCmd,
    ) -> LedgerResult<()> {
        if let Some(amount) = cmd.amount_minor
            && amount <= 0
        {
            return Err(LedgerError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let old = get_schedule(&db_tx, schedule_id).await?;

            let destructive = cmd.kind.is_some()
                || cmd.amount_minor.is_some()
                || cmd.wallet_id.is_some()
                || cmd.category_id.is_some()
                || cmd.start_date.is_some()
                || cmd.time.is_some()
                || cmd.frequency.is_some()
                || cmd.end_date.is_some()
                || cmd.tags.is_some();
            if old.locked && destructive {
                return Err(LedgerError::Locked("schedule is locked".to_string()));
            }

            let mut new = old.clone();
            if let Some(name) = cmd.name {
                new.name = normalize_display(&name, "schedule")?;
            }
            if let Some(kind) = cmd.kind {
                new.kind = kind;
            }
            if let Some(amount) = cmd.amount_minor {
                new.amount_minor = amount;
            }
            if let Some(wallet_id) = cmd.wallet_id {
                require_wallet(&db_tx, wallet_id).await?;
                new.wallet_id = wallet_id;
            }
            if let Some(category_id) = cmd.category_id {
                require_category(&db_tx, category_id).await?;
                new.category_id = category_id;
            }
            if let Some(start_date) = cmd.start_date {
                new.start_date = start_date;
            }
            if let Some(time) = cmd.time {
                new.time = time;
            }
            if let Some(frequency) = cmd.frequency {
                new.frequency = frequency;
            }
            if let Some(end_date) = cmd.end_date {
                new.end_date = Some(end_date);
            }
            if let Some(notify) = cmd.notify {
                new.notify = notify;
            }
            if let Some(notes) = cmd.notes {
                new.notes = Some(notes);
            }
            if let Some(tags) = cmd.tags {
                require_tags(&db_tx, &tags).await?;
                new.tags = tags;
            }

            if let Some(end) = new.end_date
                && end < new.start_date
            {
                return Err(LedgerError::Validation(
                    "end_date must not precede start_date".to_string(),
                ));
            }
            if destructive {
                new.next_due_date = Some(new.first_candidate());
            }

            schedules::ActiveModel::from(&new).update(&db_tx).await?;

            let old_snapshot = snapshot_value(&old);
            let new_snapshot = snapshot_value(&new);
            let log = HistoryLog::new(
                HistoryAction::Update,
                EntityKind::Schedule,
                schedule_id.to_string(),
                format!("updated schedule {}", new.name),
                "schedules",
            )
            .old_value(old_snapshot.clone())
            .new_value(new_snapshot.clone())
            .changes(diff(&old_snapshot, &new_snapshot));
            history::record(&db_tx, &log).await?;

            Ok(())
        })
    }

    /// Soft-delete a schedule. Transactions it already materialized stay
    /// in the ledger. Returns the bin item id.
    pub async fn delete_schedule(&self, schedule_id: Uuid) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let schedule = get_schedule(&db_tx, schedule_id).await?;

            schedules::Entity::delete_by_id(schedule_id.to_string())
                .exec(&db_tx)
                .await?;

            let log = HistoryLog::new(
                HistoryAction::Delete,
                EntityKind::Schedule,
                schedule_id.to_string(),
                format!("deleted schedule {}", schedule.name),
                "schedules",
            )
            .old_value(snapshot_value(&schedule));
            let item = RestoreBinItem::new(BinPayload::Schedule(schedule), log.id, Utc::now());
            let log = log.pending(item.id);

            bin::stage(&db_tx, &item).await?;
            history::record(&db_tx, &log).await?;

            Ok(item.id)
        })
    }

    /// One catch-up pass over every due schedule.
    ///
    /// Guarded by a compare-and-swap flag: an invocation that finds a pass
    /// already in flight returns `Ok(None)` instead of double-running.
    /// Each schedule commits in its own unit, so one broken schedule does
    /// not sink the pass.
    pub async fn run_due_schedules(
        &self,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<CatchUpSummary>> {
        if self
            .catch_up_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }
        let result = self.run_pass(now).await;
        self.catch_up_running.store(false, Ordering::Release);
        result.map(Some)
    }

    async fn run_pass(&self, now: DateTime<Utc>) -> LedgerResult<CatchUpSummary> {
        let today = now.date_naive();
        let rows = schedules::Entity::find()
            .filter(schedules::Column::Status.eq(ScheduleStatus::Active.as_str()))
            .filter(
                Condition::any()
                    .add(schedules::Column::NextDueDate.is_null())
                    .add(schedules::Column::NextDueDate.lte(today)),
            )
            .all(&self.database)
            .await?;

        let mut summary = CatchUpSummary {
            schedules: rows.len(),
            ..CatchUpSummary::default()
        };
        for model in rows {
            let schedule_id = parse_uuid(&model.id, "schedule")?;
            match self.catch_up_one(schedule_id, now).await {
                Ok(outcome) => {
                    summary.created += outcome.occurrences;
                    if outcome.completed {
                        summary.completed += 1;
                    }
                }
                Err(error) => {
                    warn!(schedule = %schedule_id, %error, "schedule catch-up failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Catch up one schedule in its own unit, re-reading the row so the
    /// pass never acts on a stale snapshot.
    async fn catch_up_one(
        &self,
        schedule_id: Uuid,
        now: DateTime<Utc>,
    ) -> LedgerResult<CatchUpOutcome> {
        with_tx!(self, |db_tx| {
            let schedule = get_schedule(&db_tx, schedule_id).await?;
            if schedule.status != ScheduleStatus::Active {
                return Ok(CatchUpOutcome {
                    occurrences: 0,
                    completed: true,
                });
            }
            catch_up_schedule(&db_tx, &schedule, now).await
        })
    }

    pub async fn schedule(&self, schedule_id: Uuid) -> LedgerResult<ScheduledTransaction> {
        let model = schedules::Entity::find_by_id(schedule_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| LedgerError::NotFound("schedule not exists".to_string()))?;
        model.try_into()
    }

    pub async fn list_schedules(&self) -> LedgerResult<Vec<ScheduledTransaction>> {
        let rows = schedules::Entity::find()
            .order_by_asc(schedules::Column::Name)
            .all(&self.database)
            .await?;
        rows.into_iter().map(ScheduledTransaction::try_from).collect()
    }
}
