use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Category, CategoryCmd, CategoryParent, EntityKind, HistoryAction, HistoryLog, LedgerError,
    LedgerResult, UpdateCategoryCmd, categories, diff,
    history::snapshot_value,
    restore_bin::{BinPayload, RestoreBinItem},
    util::{normalize_display, normalize_key},
};

use super::{Ledger, bin, history, require_category, with_tx};

async fn reject_duplicate_sibling<C: ConnectionTrait>(
    conn: &C,
    parent_id: Option<Uuid>,
    name: &str,
    except: Option<Uuid>,
) -> LedgerResult<()> {
    let mut query =
        categories::Entity::find().filter(categories::Column::NameNorm.eq(normalize_key(name)));
    query = match parent_id {
        Some(parent_id) => query.filter(categories::Column::ParentId.eq(parent_id.to_string())),
        None => query.filter(categories::Column::ParentId.is_null()),
    };
    if let Some(except) = except {
        query = query.filter(categories::Column::Id.ne(except.to_string()));
    }
    if query.count(conn).await? > 0 {
        return Err(LedgerError::Duplicate("category already exists".to_string()));
    }
    Ok(())
}

async fn has_children<C: ConnectionTrait>(conn: &C, category_id: Uuid) -> LedgerResult<bool> {
    let count = categories::Entity::find()
        .filter(categories::Column::ParentId.eq(category_id.to_string()))
        .count(conn)
        .await?;
    Ok(count > 0)
}

async fn insert_category<C: ConnectionTrait>(
    conn: &C,
    cmd: CategoryCmd,
    parent_id: Option<Uuid>,
) -> LedgerResult<Uuid> {
    let name = normalize_display(&cmd.name, "category")?;
    reject_duplicate_sibling(conn, parent_id, &name, None).await?;

    let category = Category::new(name, cmd.icon, parent_id);
    categories::ActiveModel::from(&category).insert(conn).await?;

    let log = HistoryLog::new(
        HistoryAction::Create,
        EntityKind::Category,
        category.id.to_string(),
        format!("added category {}", category.name),
        "categories",
    )
    .new_value(snapshot_value(&category));
    history::record(conn, &log).await?;

    Ok(category.id)
}

impl Ledger {
    /// Create a root category.
    pub async fn create_category(&self, cmd: CategoryCmd) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| { insert_category(&db_tx, cmd, None).await })
    }

    /// Create a subcategory under an existing root.
    pub async fn create_sub_category(
        &self,
        parent_id: Uuid,
        cmd: CategoryCmd,
    ) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let parent = require_category(&db_tx, parent_id).await?;
            if parent.parent_id.is_some() {
                return Err(LedgerError::Validation(
                    "parent must be a root category".to_string(),
                ));
            }
            insert_category(&db_tx, cmd, Some(parent_id)).await
        })
    }

    /// Rename, re-icon, or re-parent a category. System rows are
    /// immutable; re-parenting keeps the two-level shape.
    pub async fn update_category(
        &self,
        category_id: Uuid,
        cmd: UpdateCategoryCmd,
    ) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            let old = require_category(&db_tx, category_id).await?;
            if old.is_system() {
                return Err(LedgerError::Validation(
                    "system category cannot be changed".to_string(),
                ));
            }

            let mut new = old.clone();
            if let Some(name) = cmd.name {
                new.name = normalize_display(&name, "category")?;
            }
            if let Some(icon) = cmd.icon {
                new.icon = Some(icon);
            }
            if let Some(parent) = cmd.parent {
                new.parent_id = match parent {
                    CategoryParent::Root => None,
                    CategoryParent::Under(parent_id) => {
                        if parent_id == category_id {
                            return Err(LedgerError::Validation(
                                "category cannot be its own parent".to_string(),
                            ));
                        }
                        let target = require_category(&db_tx, parent_id).await?;
                        if target.parent_id.is_some() {
                            return Err(LedgerError::Validation(
                                "parent must be a root category".to_string(),
                            ));
                        }
                        if has_children(&db_tx, category_id).await? {
                            return Err(LedgerError::Validation(
                                "category with subcategories cannot be nested".to_string(),
                            ));
                        }
                        Some(parent_id)
                    }
                };
            }
            reject_duplicate_sibling(&db_tx, new.parent_id, &new.name, Some(category_id)).await?;

            let active = categories::ActiveModel {
                id: ActiveValue::Set(category_id.to_string()),
                name: ActiveValue::Set(new.name.clone()),
                name_norm: ActiveValue::Set(normalize_key(&new.name)),
                icon: ActiveValue::Set(new.icon.clone()),
                parent_id: ActiveValue::Set(new.parent_id.map(|id| id.to_string())),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            let old_snapshot = snapshot_value(&old);
            let new_snapshot = snapshot_value(&new);
            let log = HistoryLog::new(
                HistoryAction::Update,
                EntityKind::Category,
                category_id.to_string(),
                format!("updated category {}", new.name),
                "categories",
            )
            .old_value(old_snapshot.clone())
            .new_value(new_snapshot.clone())
            .changes(diff(&old_snapshot, &new_snapshot));
            history::record(&db_tx, &log).await?;

            Ok(())
        })
    }

    /// Soft-delete a category; subcategories cascade into the same bin
    /// payload. Transactions keep their category reference until the bin
    /// item is permanently deleted. Returns the bin item id.
    pub async fn delete_category(&self, category_id: Uuid) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let category = require_category(&db_tx, category_id).await?;
            if category.is_system() {
                return Err(LedgerError::Validation(
                    "system category cannot be deleted".to_string(),
                ));
            }

            let child_rows = categories::Entity::find()
                .filter(categories::Column::ParentId.eq(category_id.to_string()))
                .all(&db_tx)
                .await?;
            let children: Vec<Category> = child_rows
                .into_iter()
                .map(Category::try_from)
                .collect::<LedgerResult<_>>()?;

            categories::Entity::delete_many()
                .filter(categories::Column::ParentId.eq(category_id.to_string()))
                .exec(&db_tx)
                .await?;
            categories::Entity::delete_by_id(category_id.to_string())
                .exec(&db_tx)
                .await?;

            let log = HistoryLog::new(
                HistoryAction::Delete,
                EntityKind::Category,
                category_id.to_string(),
                format!("deleted category {}", category.name),
                "categories",
            )
            .old_value(snapshot_value(&category));
            let item = RestoreBinItem::new(
                BinPayload::Category {
                    category,
                    children,
                },
                log.id,
                Utc::now(),
            );
            let log = log.pending(item.id);

            bin::stage(&db_tx, &item).await?;
            history::record(&db_tx, &log).await?;

            Ok(item.id)
        })
    }

    pub async fn category(&self, category_id: Uuid) -> LedgerResult<Category> {
        require_category(&self.database, category_id).await
    }

    /// All categories, roots and subcategories in one flat list.
    pub async fn list_categories(&self) -> LedgerResult<Vec<Category>> {
        let rows = categories::Entity::find()
            .order_by_asc(categories::Column::Name)
            .all(&self.database)
            .await?;
        rows.into_iter().map(Category::try_from).collect()
    }
}
