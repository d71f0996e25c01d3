use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    EntityKind, HistoryAction, HistoryLog, LedgerError, LedgerResult, Tag, diff,
    history::snapshot_value,
    restore_bin::{BinPayload, RestoreBinItem},
    tags, transaction_tags,
    util::{normalize_display, normalize_key, parse_uuid},
};

use super::{Ledger, bin, history, with_tx};

async fn reject_duplicate_tag<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    except: Option<Uuid>,
) -> LedgerResult<()> {
    let mut query = tags::Entity::find().filter(tags::Column::NameNorm.eq(normalize_key(name)));
    if let Some(except) = except {
        query = query.filter(tags::Column::Id.ne(except.to_string()));
    }
    if query.count(conn).await? > 0 {
        return Err(LedgerError::Duplicate("tag already exists".to_string()));
    }
    Ok(())
}

async fn get_tag<C: ConnectionTrait>(conn: &C, tag_id: Uuid) -> LedgerResult<Tag> {
    tags::Entity::find_by_id(tag_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound("tag not exists".to_string()))?
        .try_into()
}

impl Ledger {
    pub async fn create_tag(&self, name: String) -> LedgerResult<Uuid> {
        let name = normalize_display(&name, "tag")?;

        with_tx!(self, |db_tx| {
            reject_duplicate_tag(&db_tx, &name, None).await?;

            let tag = Tag::new(name);
            tags::ActiveModel::from(&tag).insert(&db_tx).await?;

            let log = HistoryLog::new(
                HistoryAction::Create,
                EntityKind::Tag,
                tag.id.to_string(),
                format!("added tag {}", tag.name),
                "tags",
            )
            .new_value(snapshot_value(&tag));
            history::record(&db_tx, &log).await?;

            Ok(tag.id)
        })
    }

    pub async fn update_tag(&self, tag_id: Uuid, name: String) -> LedgerResult<()> {
        let name = normalize_display(&name, "tag")?;

        with_tx!(self, |db_tx| {
            let old = get_tag(&db_tx, tag_id).await?;
            reject_duplicate_tag(&db_tx, &name, Some(tag_id)).await?;

            let new = Tag {
                id: tag_id,
                name: name.clone(),
            };
            let active = tags::ActiveModel {
                id: ActiveValue::Set(tag_id.to_string()),
                name: ActiveValue::Set(name.clone()),
                name_norm: ActiveValue::Set(normalize_key(&name)),
            };
            active.update(&db_tx).await?;

            let old_snapshot = snapshot_value(&old);
            let new_snapshot = snapshot_value(&new);
            let log = HistoryLog::new(
                HistoryAction::Update,
                EntityKind::Tag,
                tag_id.to_string(),
                format!("updated tag {}", new.name),
                "tags",
            )
            .old_value(old_snapshot.clone())
            .new_value(new_snapshot.clone())
            .changes(diff(&old_snapshot, &new_snapshot));
            history::record(&db_tx, &log).await?;

            Ok(())
        })
    }

    /// Soft-delete a tag; its join rows cascade into the bin payload so a
    /// restore re-tags the same transactions. Returns the bin item id.
    pub async fn delete_tag(&self, tag_id: Uuid) -> LedgerResult<Uuid> {
        with_tx!(self, |db_tx| {
            let tag = get_tag(&db_tx, tag_id).await?;

            let join_rows = transaction_tags::Entity::find()
                .filter(transaction_tags::Column::TagId.eq(tag_id.to_string()))
                .all(&db_tx)
                .await?;
            let mut transaction_ids = Vec::with_capacity(join_rows.len());
            for row in join_rows {
                transaction_ids.push(parse_uuid(&row.transaction_id, "transaction")?);
            }

            transaction_tags::Entity::delete_many()
                .filter(transaction_tags::Column::TagId.eq(tag_id.to_string()))
                .exec(&db_tx)
                .await?;
            tags::Entity::delete_by_id(tag_id.to_string())
                .exec(&db_tx)
                .await?;

            let log = HistoryLog::new(
                HistoryAction::Delete,
                EntityKind::Tag,
                tag_id.to_string(),
                format!("deleted tag {}", tag.name),
                "tags",
            )
            .old_value(snapshot_value(&tag));
            let item = RestoreBinItem::new(
                BinPayload::Tag {
                    tag,
                    transaction_ids,
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

    pub async fn list_tags(&self) -> LedgerResult<Vec<Tag>> {
        let rows = tags::Entity::find()
            .order_by_asc(tags::Column::Name)
            .all(&self.database)
            .await?;
        rows.into_iter().map(Tag::try_from).collect()
    }
}
