use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::db::entities::bot_group;
use crate::web::error::AppError;

pub async fn list_groups(
    db: &DatabaseConnection,
    bot_id: Uuid,
) -> Result<Vec<bot_group::Model>, AppError> {
    Ok(bot_group::Entity::find()
        .filter(bot_group::Column::BotId.eq(bot_id))
        .order_by_asc(bot_group::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Upsert on (bot_id, group_id): re-attaching an existing group refreshes
/// its name and re-enables it.
pub async fn attach_group(
    db: &DatabaseConnection,
    bot_id: Uuid,
    group_id: &str,
    group_name: &str,
) -> Result<bot_group::Model, AppError> {
    if group_id.trim().is_empty() {
        return Err(AppError::InvalidInput("group_id is required".to_string()));
    }

    let existing = bot_group::Entity::find()
        .filter(bot_group::Column::BotId.eq(bot_id))
        .filter(bot_group::Column::GroupId.eq(group_id))
        .one(db)
        .await?;

    if let Some(row) = existing {
        let mut active: bot_group::ActiveModel = row.into();
        active.group_name = Set(group_name.to_string());
        active.enabled = Set(true);
        return Ok(active.update(db).await?);
    }

    Ok(bot_group::ActiveModel {
        id: Set(Uuid::new_v4()),
        bot_id: Set(bot_id),
        group_id: Set(group_id.to_string()),
        group_name: Set(group_name.to_string()),
        enabled: Set(true),
        messages_sent: Set(0),
        last_message_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?)
}

pub async fn set_enabled(
    db: &DatabaseConnection,
    bot_id: Uuid,
    group_row_id: Uuid,
    enabled: bool,
) -> Result<bot_group::Model, AppError> {
    let row = bot_group::Entity::find()
        .filter(bot_group::Column::Id.eq(group_row_id))
        .filter(bot_group::Column::BotId.eq(bot_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;

    let mut active: bot_group::ActiveModel = row.into();
    active.enabled = Set(enabled);
    Ok(active.update(db).await?)
}

pub async fn remove_group(
    db: &DatabaseConnection,
    bot_id: Uuid,
    group_row_id: Uuid,
) -> Result<(), AppError> {
    let result = bot_group::Entity::delete_many()
        .filter(bot_group::Column::Id.eq(group_row_id))
        .filter(bot_group::Column::BotId.eq(bot_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Group not found".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[tokio::test]
    async fn attach_is_an_upsert() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;

        let first = attach_group(&db, bot.id, "-100", "old name").await.unwrap();
        set_enabled(&db, bot.id, first.id, false).await.unwrap();

        let second = attach_group(&db, bot.id, "-100", "new name").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.group_name, "new name");
        assert!(second.enabled);

        assert_eq!(list_groups(&db, bot.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn group_rows_are_scoped_to_their_bot() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot_a = test_db::seed_bot(&db, owner.id).await;
        let bot_b = test_db::seed_bot(&db, owner.id).await;

        let row = attach_group(&db, bot_a.id, "-100", "a").await.unwrap();

        // Addressing the row through the wrong bot fails.
        assert!(matches!(
            set_enabled(&db, bot_b.id, row.id, false).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            remove_group(&db, bot_b.id, row.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
