use std::collections::HashSet;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use sea_orm::{Condition, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Budget, BudgetCmd, BudgetKind, EntityKind, HistoryAction, HistoryLog, LedgerError,
    LedgerResult, TxKind, UpdateBudgetCmd, budgets, categories, diff,
    history::snapshot_value,
    restore_bin::{BinPayload, RestoreBinItem},
    transaction_tags, transactions,
    util::normalize_display,
};

use super::{Ledger, bin, history, require_category, require_tags, with_tx};

async fn get_budget<C: ConnectionTrait>(conn: &C, budget_id: Uuid) -> LedgerResult<Budget> {
    budgets::Entity::find_by_id(budget_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound("budget not exists".to_string()))?
        .try_into()
}

fn validate_budget(budget: &Budget) -> LedgerResult<()> {
    if budget.amount_minor <= 0 {
        return Err(LedgerError::Validation(
            "amount_minor must be > 0".to_string(),
        ));
    }
    if budget.kind == BudgetKind::OneTime {
        match (budget.start_date, budget.end_date) {
            (Some(start), Some(end)) if end < start => {
                return Err(LedgerError::Validation(
                    "end_date must not precede start_date".to_string(),
                ));
            }
            (Some(_), Some(_)) => {}
            _ => {
                return Err(LedgerError::Validation(
                    "one_time budget requires start_date and end_date".to_string(),
                ));
            }
        }
    }
    Ok(())
}

async fn check_references<C: ConnectionTrait>(conn: &C, budget: &Budget) -> LedgerResult<()> {
    for category_id in &budget.category_ids {
        require_category(conn, *category_id).await?;
    }
    require_tags(conn, &budget.tags).await
}

fn month_window(today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = today.with_day(1).unwrap_or(today);
    let next = start.checked_add_months(Months::new(1)).unwrap_or(start);
    (
        start.and_time(NaiveTime::MIN).and_utc(),
        next.and_time(NaiveTime::MIN).and_utc(),
    )
}

fn day_window(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let past_end = end.checked_add_days(Days::new(1)).unwrap_or(end);
    (
        start.and_time(NaiveTime::MIN).and_utc(),
        past_end.and_time(NaiveTime::MIN).and_utc(),
    )
}

/// A listed parent category also covers its subcategories.
async fn expand_categories<C: ConnectionTrait>(
    conn: &C,
    category_ids: &[Uuid],
) -> LedgerResult<HashSet<String>> {
    let mut out: HashSet<String> = category_ids.iter().map(Uuid::to_string).collect();
    if category_ids.is_empty() {
        return Ok(out);
    }
    let parents: Vec<String> = category_ids.iter().map(Uuid::to_string).collect();
    let children = categories::Entity::find()
        .filter(categories::Column::ParentId.is_in(parents))
        .all(conn)
        .await?;
    for child in children {
        out.insert(child.id);
    }
    Ok(out)
}

/// Sum of live expense amounts matching the budget's categories or tags
/// inside its active window.
async fn spent_for<C: ConnectionTrait>(
    conn: &C,
    budget: &Budget,
    now: DateTime<Utc>,
) -> LedgerResult<i64> {
    let window = match budget.kind {
        BudgetKind::Periodic => Some(month_window(now.date_naive())),
        BudgetKind::OneTime => match (budget.start_date, budget.end_date) {
            (Some(start), Some(end)) => Some(day_window(start, end)),
            _ => None,
        },
    };
    let Some((from, to)) = window else {
        return Ok(0);
    };

    let category_ids = expand_categories(conn, &budget.category_ids).await?;
    let mut tagged_ids: HashSet<String> = HashSet::new();
    if !budget.tags.is_empty() {
        let tag_ids: Vec<String> = budget.tags.iter().map(Uuid::to_string).collect();
        let rows = transaction_tags::Entity::find()
            .filter(transaction_tags::Column::TagId.is_in(tag_ids))
            .all(conn)
            .await?;
        for row in rows {
            tagged_ids.insert(row.transaction_id);
        }
    }
    if category_ids.is_empty() && tagged_ids.is_empty() {
        return Ok(0);
    }

    let mut membership = Condition::any();
    if !category_ids.is_empty() {
        let ids: Vec<String> = category_ids.into_iter().collect();
        membership = membership.add(transactions::Column::CategoryId.is_in(ids));
    }
    if !tagged_ids.is_empty() {
        let ids: Vec<String> = tagged_ids.into_iter().collect();
        membership = membership.add(transactions::Column::Id.is_in(ids));
    }

    let rows = transactions::Entity::find()
        .filter(transactions::Column::Kind.eq(TxKind::Expense.as_str()))
        .filter(transactions::Column::OccurredAt.gte(from))
        .filter(transactions::Column::OccurredAt.lt(to))
        .filter(membership)
        .all(conn)
        .await?;
    Ok(rows.iter().map(|model| model.amount_minor).sum())
}

impl Ledger {
    pub async fn create_budget(&self, cmd: BudgetCmd) -> LedgerResult<Uuid> {
        let name = normalize_display(&cmd.name, "budget")?;

        with_tx!(self, |db_tx| {
            let budget = Budget {
                id: Uuid::new_v4(),
                name,
                category_ids: cmd.category_ids,
                tags: cmd.tags,
                amount_minor: cmd.amount_minor,
                kind: cmd.kind,
                start_date: cmd.start_date,
                end_date: cmd.end_date,
                notify: cmd.notify,
            };
            validate_budget(&budget)?;
            check_references(&db_tx, &budget).await?;

            budgets::ActiveModel::from(&budget).insert(&db_tx).await?;

            let log = HistoryLog::new(
                HistoryAction::Create,
                EntityKind::Budget,
                budget.id.to_string(),
                format!("added budget {}", budget.name),
                "budgets",
            )
            .new_value(snapshot_value(&budget));
            history::record(&db_tx, &log).await?;

            Ok(budget.id)
        })
    }

    pub async fn update_budget(&self, budget_id: Uuid, cmd: UpdateBudgetCmd) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            let old = get_budget(&db_tx, budget_id).await?;

            let mut new = old.clone();
            if let Some(name) = cmd.name {
                new.name = normalize_display(&name, "budget")?;
            }
            if let Some(amount) = cmd.amount_minor {
                new.amount_minor = amount;
            }
            if let Some(kind) = cmd.kind {
                new.kind = kind;
            }
            if let Some(category_ids) = cmd.category_ids {
                new.category_ids = category_ids;
            }
            if let Some(tags) = cmd.tags {
                new.tags = tags;
            }
            if let Some(start_date) = cmd.start_date {
                new.start_date = Some(start_date);
            }
            if let Some(end_date) = cmd.end_date {
                new.end_date = Some(end_date);
            }
            if let Some(notify) = cmd.notify {
                new.notify = notify;
            }
            validate_budget(&new)?;
            check_references(&db_tx, &new).await?;

            budgets::ActiveModel::from(&new).update(&db_tx).await?;

            let old_snapshot = snapshot_value(&old);
            let new_snapshot = snapshot_value(&new);
            let log = HistoryLog::new(
                HistoryAction::Update,
                EntityKind::Budget,
                budget_id.to_string(),
                format!("updated budget {}", new.name),
                "budgets",
            )
            .old_value(old_snapshot.clone())
            .new_value(new_snapshot.clone())
            .changes(diff(&old_snapshot, &new_snapshot));
            history::record(&db_tx, &log).await?;

            Ok(())
        })
    }

    /// Soft-delete a budget. Returns the bin item id.
    pub async fn delete_budget(&self, budget_id: Uuid) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let budget = get_budget(&db_tx, budget_id).await?;

            budgets::Entity::delete_by_id(budget_id.to_string())
                .exec(&db_tx)
                .await?;

            let log = HistoryLog::new(
                HistoryAction::Delete,
                EntityKind::Budget,
                budget_id.to_string(),
                format!("deleted budget {}", budget.name),
                "budgets",
            )
            .old_value(snapshot_value(&budget));
            let item = RestoreBinItem::new(BinPayload::Budget(budget), log.id, Utc::now());
            let log = log.pending(item.id);

            bin::stage(&db_tx, &item).await?;
            history::record(&db_tx, &log).await?;

            Ok(item.id)
        })
    }

    /// Budgets with their derived spent amount, computed from the live
    /// ledger at call time.
    pub async fn list_budgets(&self) -> LedgerResult<Vec<(Budget, i64)>> {
        let now = Utc::now();
        with_tx!(self, |db_tx| {
            let rows = budgets::Entity::find()
                .order_by_asc(budgets::Column::Name)
                .all(&db_tx)
                .await?;
            let mut out = Vec::with_capacity(rows.len());
            for model in rows {
                let budget = Budget::try_from(model)?;
                let spent = spent_for(&db_tx, &budget, now).await?;
                out.push((budget, spent));
            }
            Ok(out)
        })
    }
}
