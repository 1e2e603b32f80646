use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use uuid::Uuid;

use crate::db::entities::{admin_user, bot, message_log, user};
use crate::web::error::AppError;

pub async fn is_admin(db: &DatabaseConnection, user_id: i32) -> Result<bool, AppError> {
    Ok(admin_user::Entity::find_by_id(user_id).one(db).await?.is_some())
}

/// Gate for every `/api/admin/*` handler. No partial computation: a
/// non-admin identity fails the whole request.
pub async fn require_admin(db: &DatabaseConnection, user_id: i32) -> Result<(), AppError> {
    if is_admin(db, user_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub async fn set_role(
    db: &DatabaseConnection,
    user_id: i32,
    admin: bool,
) -> Result<(), AppError> {
    // Confirm the user exists before touching the marker table.
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let existing = admin_user::Entity::find_by_id(user_id).one(db).await?;
    match (admin, existing) {
        (true, None) => {
            admin_user::ActiveModel {
                user_id: Set(user_id),
                created_at: Set(Utc::now()),
            }
            .insert(db)
            .await?;
        }
        (false, Some(row)) => {
            admin_user::Entity::delete_by_id(row.user_id).exec(db).await?;
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_users: u64,
    pub total_bots: u64,
    pub active_bots: u64,
    pub total_messages: i64,
}

pub async fn overview(db: &DatabaseConnection) -> Result<OverviewStats, AppError> {
    let total_users = user::Entity::find().count(db).await?;
    let total_bots = bot::Entity::find().count(db).await?;
    let active_bots = bot::Entity::find()
        .filter(bot::Column::Status.eq(bot::STATUS_RUNNING))
        .count(db)
        .await?;

    let daily_counters: Vec<i32> = bot::Entity::find()
        .select_only()
        .column(bot::Column::MessagesSentToday)
        .into_tuple()
        .all(db)
        .await?;
    let total_messages = daily_counters.into_iter().map(i64::from).sum();

    Ok(OverviewStats {
        total_users,
        total_bots,
        active_bots,
        total_messages,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub date: String,
    pub messages: u64,
    pub new_users: u64,
}

/// Message and signup counts bucketed per day for the last seven days,
/// oldest first.
pub async fn activity_chart(db: &DatabaseConnection) -> Result<Vec<DailyActivity>, AppError> {
    let today = Utc::now().date_naive();
    let mut chart = Vec::with_capacity(7);

    for offset in (0..7).rev() {
        let day = today - Duration::days(offset);
        let start: DateTime<Utc> = day
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let end = start + Duration::days(1);

        let messages = message_log::Entity::find()
            .filter(message_log::Column::CreatedAt.gte(start))
            .filter(message_log::Column::CreatedAt.lt(end))
            .count(db)
            .await?;
        let new_users = user::Entity::find()
            .filter(user::Column::CreatedAt.gte(start))
            .filter(user::Column::CreatedAt.lt(end))
            .count(db)
            .await?;

        chart.push(DailyActivity {
            date: day.format("%d.%m").to_string(),
            messages,
            new_users,
        });
    }

    Ok(chart)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserRow {
    pub id: i32,
    pub username: String,
    pub is_admin: bool,
    pub bot_count: u64,
    pub created_at: DateTime<Utc>,
}

pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<AdminUserRow>, AppError> {
    let users = user::Entity::find()
        .order_by_desc(user::Column::CreatedAt)
        .all(db)
        .await?;

    let mut rows = Vec::with_capacity(users.len());
    for u in users {
        let bot_count = bot::Entity::find()
            .filter(bot::Column::OwnerId.eq(u.id))
            .count(db)
            .await?;
        let is_admin = is_admin(db, u.id).await?;
        rows.push(AdminUserRow {
            id: u.id,
            username: u.username,
            is_admin,
            bot_count,
            created_at: u.created_at,
        });
    }
    Ok(rows)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBotRow {
    pub id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub status: String,
    pub messages_sent: i32,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

pub async fn list_bots(db: &DatabaseConnection) -> Result<Vec<AdminBotRow>, AppError> {
    let bots = bot::Entity::find()
        .find_also_related(user::Entity)
        .order_by_desc(bot::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(bots
        .into_iter()
        .map(|(b, owner)| AdminBotRow {
            id: b.id,
            name: b.name,
            phone_number: b.phone_number,
            status: b.status,
            messages_sent: b.messages_sent_today,
            owner: owner.map(|o| o.username).unwrap_or_else(|| "unknown".to_string()),
            created_at: b.created_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[tokio::test]
    async fn non_admins_are_rejected() {
        let db = test_db::connect().await;
        let u = test_db::seed_user(&db, "plain").await;
        assert!(matches!(
            require_admin(&db, u.id).await.unwrap_err(),
            AppError::Forbidden
        ));

        set_role(&db, u.id, true).await.unwrap();
        require_admin(&db, u.id).await.unwrap();

        set_role(&db, u.id, false).await.unwrap();
        assert!(require_admin(&db, u.id).await.is_err());
    }

    #[tokio::test]
    async fn overview_sums_daily_message_counters() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        for count in [5, 0, 10] {
            let b = test_db::seed_bot(&db, owner.id).await;
            let mut active: bot::ActiveModel = b.into();
            active.messages_sent_today = Set(count);
            active.update(&db).await.unwrap();
        }

        let stats = overview(&db).await.unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_bots, 3);
        assert_eq!(stats.active_bots, 0);
        assert_eq!(stats.total_messages, 15);
    }

    #[tokio::test]
    async fn chart_covers_seven_days_and_buckets_today() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        crate::db::services::log_service::insert_message_log(
            &db,
            bot.id,
            "-1",
            "hi",
            message_log::STATUS_SENT,
            None,
        )
        .await
        .unwrap();

        let chart = activity_chart(&db).await.unwrap();
        assert_eq!(chart.len(), 7);
        let today = chart.last().unwrap();
        assert_eq!(today.messages, 1);
        assert_eq!(today.new_users, 1);
        assert!(chart[..6].iter().all(|d| d.messages == 0));
    }
}
