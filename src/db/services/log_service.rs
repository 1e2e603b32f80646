use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::db::entities::{bot_log, message_log};
use crate::web::error::AppError;

pub async fn insert_message_log(
    db: &DatabaseConnection,
    bot_id: Uuid,
    group_id: &str,
    message_text: &str,
    status: &str,
    error_message: Option<String>,
) -> Result<message_log::Model, AppError> {
    let now = Utc::now();
    Ok(message_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        bot_id: Set(bot_id),
        group_id: Set(group_id.to_string()),
        message_text: Set(message_text.to_string()),
        status: Set(status.to_string()),
        error_message: Set(error_message),
        sent_at: Set(Some(now)),
        created_at: Set(now),
    }
    .insert(db)
    .await?)
}

pub async fn recent_message_logs(
    db: &DatabaseConnection,
    bot_id: Uuid,
    limit: u64,
) -> Result<Vec<message_log::Model>, AppError> {
    Ok(message_log::Entity::find()
        .filter(message_log::Column::BotId.eq(bot_id))
        .order_by_desc(message_log::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn recent_bot_logs(
    db: &DatabaseConnection,
    bot_id: Uuid,
    limit: u64,
) -> Result<Vec<bot_log::Model>, AppError> {
    Ok(bot_log::Entity::find()
        .filter(bot_log::Column::BotId.eq(bot_id))
        .order_by_desc(bot_log::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?)
}

/// Best-effort lifecycle note; a failed insert must never abort the
/// operation that produced it.
pub async fn log_bot_event(db: &DatabaseConnection, bot_id: Uuid, log_type: &str, message: &str) {
    let result = bot_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        bot_id: Set(bot_id),
        log_type: Set(log_type.to_string()),
        message: Set(message.to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await;

    if let Err(e) = result {
        warn!(%bot_id, error = %e, "failed to record bot event");
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    pub total_messages: u64,
    pub failed_messages: u64,
    pub group_count: u64,
    pub last_message_time: Option<chrono::DateTime<Utc>>,
    pub success_rate: Option<f64>,
}

pub async fn message_stats(
    db: &DatabaseConnection,
    bot_id: Uuid,
) -> Result<MessageStats, AppError> {
    let total_messages = message_log::Entity::find()
        .filter(message_log::Column::BotId.eq(bot_id))
        .filter(message_log::Column::Status.eq(message_log::STATUS_SENT))
        .count(db)
        .await?;
    let failed_messages = message_log::Entity::find()
        .filter(message_log::Column::BotId.eq(bot_id))
        .filter(message_log::Column::Status.eq(message_log::STATUS_FAILED))
        .count(db)
        .await?;
    let group_count = crate::db::entities::bot_group::Entity::find()
        .filter(crate::db::entities::bot_group::Column::BotId.eq(bot_id))
        .count(db)
        .await?;
    let last_message_time = message_log::Entity::find()
        .filter(message_log::Column::BotId.eq(bot_id))
        .order_by_desc(message_log::Column::CreatedAt)
        .one(db)
        .await?
        .and_then(|row| row.sent_at);

    let attempted = total_messages + failed_messages;
    let success_rate = if attempted > 0 {
        Some(total_messages as f64 / attempted as f64 * 100.0)
    } else {
        None
    };

    Ok(MessageStats {
        total_messages,
        failed_messages,
        group_count,
        last_message_time,
        success_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[tokio::test]
    async fn stats_roll_up_sent_and_failed() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;

        for _ in 0..3 {
            insert_message_log(&db, bot.id, "-1", "hi", message_log::STATUS_SENT, None)
                .await
                .unwrap();
        }
        insert_message_log(
            &db,
            bot.id,
            "-1",
            "hi",
            message_log::STATUS_FAILED,
            Some("flood wait".to_string()),
        )
        .await
        .unwrap();

        let stats = message_stats(&db, bot.id).await.unwrap();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.failed_messages, 1);
        assert_eq!(stats.success_rate, Some(75.0));
        assert!(stats.last_message_time.is_some());
    }
}
