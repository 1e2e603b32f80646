use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One managed Telegram account plus its automation settings.
///
/// The credential fields (`api_id`, `api_hash`, `phone_number`) and
/// `session_string` are opaque to this layer: they are stored verbatim and
/// forwarded to the automation backend, never interpreted locally.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: i32,
    pub name: String,
    pub api_id: String,
    pub api_hash: String,
    pub phone_number: String,
    pub is_authorized: bool,
    pub session_string: Option<String>,
    pub phone_code_hash: Option<String>,
    pub auth_error: Option<String>,
    pub last_auth_attempt: Option<ChronoDateTimeUtc>,
    pub status: String,
    pub min_delay: i32,
    pub max_delay: i32,
    pub message_content: Option<String>,
    pub auto_reply_enabled: bool,
    pub auto_reply_message: Option<String>,
    pub messages_sent_today: i32,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

pub const STATUS_STOPPED: &str = "stopped";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_ERROR: &str = "error";

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,

    #[sea_orm(has_many = "super::bot_group::Entity")]
    Groups,

    #[sea_orm(has_many = "super::message_log::Entity")]
    MessageLogs,

    #[sea_orm(has_many = "super::bot_log::Entity")]
    BotLogs,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::bot_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::message_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MessageLogs.def()
    }
}

impl Related<super::bot_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BotLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
