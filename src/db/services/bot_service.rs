use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::db::entities::{bot, bot_group, bot_log, message_log};
use crate::web::error::AppError;

/// Loads a bot constrained by `id AND owner_id`. A miss is always reported
/// as `NotFound`, whether the row does not exist or belongs to someone
/// else, so ownership cannot be probed.
pub async fn find_owned(
    db: &DatabaseConnection,
    bot_id: Uuid,
    owner_id: i32,
) -> Result<bot::Model, AppError> {
    bot::Entity::find()
        .filter(bot::Column::Id.eq(bot_id))
        .filter(bot::Column::OwnerId.eq(owner_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Bot not found".to_string()))
}

pub async fn list_for_owner(
    db: &DatabaseConnection,
    owner_id: i32,
) -> Result<Vec<bot::Model>, AppError> {
    Ok(bot::Entity::find()
        .filter(bot::Column::OwnerId.eq(owner_id))
        .order_by_desc(bot::Column::CreatedAt)
        .all(db)
        .await?)
}

pub struct NewBot {
    pub name: String,
    pub api_id: String,
    pub api_hash: String,
    pub phone_number: String,
    pub min_delay: Option<i32>,
    pub max_delay: Option<i32>,
    pub message_content: Option<String>,
    pub auto_reply_enabled: Option<bool>,
    pub auto_reply_message: Option<String>,
}

pub async fn create_bot(
    db: &DatabaseConnection,
    owner_id: i32,
    new_bot: NewBot,
) -> Result<bot::Model, AppError> {
    if new_bot.name.trim().is_empty()
        || new_bot.api_id.trim().is_empty()
        || new_bot.api_hash.trim().is_empty()
        || new_bot.phone_number.trim().is_empty()
    {
        return Err(AppError::InvalidInput(
            "name, api_id, api_hash and phone_number are required".to_string(),
        ));
    }

    let now = Utc::now();
    Ok(bot::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        name: Set(new_bot.name),
        api_id: Set(new_bot.api_id),
        api_hash: Set(new_bot.api_hash),
        phone_number: Set(new_bot.phone_number),
        is_authorized: Set(false),
        session_string: Set(None),
        phone_code_hash: Set(None),
        auth_error: Set(None),
        last_auth_attempt: Set(None),
        status: Set(bot::STATUS_STOPPED.to_string()),
        min_delay: Set(new_bot.min_delay.unwrap_or(20)),
        max_delay: Set(new_bot.max_delay.unwrap_or(40)),
        message_content: Set(new_bot.message_content),
        auto_reply_enabled: Set(new_bot.auto_reply_enabled.unwrap_or(false)),
        auto_reply_message: Set(new_bot.auto_reply_message),
        messages_sent_today: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?)
}

#[derive(Default)]
pub struct BotChanges {
    pub name: Option<String>,
    pub api_id: Option<String>,
    pub api_hash: Option<String>,
    pub phone_number: Option<String>,
    pub min_delay: Option<i32>,
    pub max_delay: Option<i32>,
    pub message_content: Option<Option<String>>,
    pub auto_reply_enabled: Option<bool>,
    pub auto_reply_message: Option<Option<String>>,
}

pub async fn update_bot(
    db: &DatabaseConnection,
    bot: bot::Model,
    changes: BotChanges,
) -> Result<bot::Model, AppError> {
    let mut active: bot::ActiveModel = bot.into();
    if let Some(name) = changes.name {
        active.name = Set(name);
    }
    if let Some(api_id) = changes.api_id {
        active.api_id = Set(api_id);
    }
    if let Some(api_hash) = changes.api_hash {
        active.api_hash = Set(api_hash);
    }
    if let Some(phone_number) = changes.phone_number {
        active.phone_number = Set(phone_number);
    }
    if let Some(min_delay) = changes.min_delay {
        active.min_delay = Set(min_delay);
    }
    if let Some(max_delay) = changes.max_delay {
        active.max_delay = Set(max_delay);
    }
    if let Some(message_content) = changes.message_content {
        active.message_content = Set(message_content);
    }
    if let Some(auto_reply_enabled) = changes.auto_reply_enabled {
        active.auto_reply_enabled = Set(auto_reply_enabled);
    }
    if let Some(auto_reply_message) = changes.auto_reply_message {
        active.auto_reply_message = Set(auto_reply_message);
    }
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Deletes a bot and its dependent group/log rows.
pub async fn delete_bot(db: &DatabaseConnection, bot_id: Uuid) -> Result<(), AppError> {
    bot_group::Entity::delete_many()
        .filter(bot_group::Column::BotId.eq(bot_id))
        .exec(db)
        .await?;
    message_log::Entity::delete_many()
        .filter(message_log::Column::BotId.eq(bot_id))
        .exec(db)
        .await?;
    bot_log::Entity::delete_many()
        .filter(bot_log::Column::BotId.eq(bot_id))
        .exec(db)
        .await?;
    bot::Entity::delete_by_id(bot_id).exec(db).await?;
    Ok(())
}

/// Group ids the automation backend should target on start.
pub async fn enabled_group_ids(
    db: &DatabaseConnection,
    bot_id: Uuid,
) -> Result<Vec<String>, AppError> {
    Ok(bot_group::Entity::find()
        .filter(bot_group::Column::BotId.eq(bot_id))
        .filter(bot_group::Column::Enabled.eq(true))
        .select_only()
        .column(bot_group::Column::GroupId)
        .into_tuple::<String>()
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[tokio::test]
    async fn foreign_bots_are_indistinguishable_from_missing_ones() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let stranger = test_db::seed_user(&db, "stranger").await;
        let bot = test_db::seed_bot(&db, owner.id).await;

        // Someone else's bot and a random id produce the same error.
        let foreign = find_owned(&db, bot.id, stranger.id).await.unwrap_err();
        let missing = find_owned(&db, Uuid::new_v4(), stranger.id).await.unwrap_err();
        assert!(matches!(foreign, AppError::NotFound(_)));
        assert!(matches!(missing, AppError::NotFound(_)));

        assert_eq!(find_owned(&db, bot.id, owner.id).await.unwrap().id, bot.id);
    }

    #[tokio::test]
    async fn delete_cascades_to_dependent_rows() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;

        crate::db::services::group_service::attach_group(&db, bot.id, "-100", "g").await.unwrap();
        crate::db::services::log_service::insert_message_log(
            &db,
            bot.id,
            "-100",
            "hi",
            crate::db::entities::message_log::STATUS_SENT,
            None,
        )
        .await
        .unwrap();

        delete_bot(&db, bot.id).await.unwrap();

        use sea_orm::PaginatorTrait;
        assert_eq!(bot::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(bot_group::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(message_log::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn only_enabled_groups_are_targeted() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;

        let g1 = crate::db::services::group_service::attach_group(&db, bot.id, "-1", "a")
            .await
            .unwrap();
        crate::db::services::group_service::attach_group(&db, bot.id, "-2", "b")
            .await
            .unwrap();
        crate::db::services::group_service::set_enabled(&db, bot.id, g1.id, false)
            .await
            .unwrap();

        assert_eq!(enabled_group_ids(&db, bot.id).await.unwrap(), vec!["-2"]);
    }
}
