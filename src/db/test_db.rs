//! In-memory SQLite harness for service and orchestrator tests.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema, Set};
use uuid::Uuid;

use crate::db::entities::{admin_user, bot, bot_group, bot_log, message_log, user};

pub async fn connect() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    let schema = Schema::new(DbBackend::Sqlite);
    let builder = db.get_database_backend();

    db.execute(builder.build(&schema.create_table_from_entity(user::Entity)))
        .await
        .unwrap();
    db.execute(builder.build(&schema.create_table_from_entity(admin_user::Entity)))
        .await
        .unwrap();
    db.execute(builder.build(&schema.create_table_from_entity(bot::Entity)))
        .await
        .unwrap();
    db.execute(builder.build(&schema.create_table_from_entity(bot_group::Entity)))
        .await
        .unwrap();
    db.execute(builder.build(&schema.create_table_from_entity(message_log::Entity)))
        .await
        .unwrap();
    db.execute(builder.build(&schema.create_table_from_entity(bot_log::Entity)))
        .await
        .unwrap();

    db
}

pub async fn seed_user(db: &DatabaseConnection, username: &str) -> user::Model {
    let now = Utc::now();
    user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set("hash".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_bot(db: &DatabaseConnection, owner_id: i32) -> bot::Model {
    let now = Utc::now();
    bot::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        name: Set("test bot".to_string()),
        api_id: Set("1".to_string()),
        api_hash: Set("h".to_string()),
        phone_number: Set("+1000".to_string()),
        is_authorized: Set(false),
        session_string: Set(None),
        phone_code_hash: Set(None),
        auth_error: Set(None),
        last_auth_attempt: Set(None),
        status: Set(bot::STATUS_STOPPED.to_string()),
        min_delay: Set(20),
        max_delay: Set(40),
        message_content: Set(Some("Hello from Bot!".to_string())),
        auto_reply_enabled: Set(false),
        auto_reply_message: Set(None),
        messages_sent_today: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}
