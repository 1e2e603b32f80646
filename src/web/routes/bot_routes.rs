use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::entities::bot;
use crate::db::services::{bot_service, group_service};
use crate::web::{AppError, AppState, models::AuthenticatedUser};

pub fn create_bot_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_bots_handler).post(create_bot_handler))
        .route(
            "/{bot_id}",
            get(get_bot_handler)
                .put(update_bot_handler)
                .delete(delete_bot_handler),
        )
        .route(
            "/{bot_id}/groups",
            get(list_groups_handler).post(attach_group_handler),
        )
        .route(
            "/{bot_id}/groups/{group_id}",
            put(set_group_enabled_handler).delete(remove_group_handler),
        )
}

/// Client-facing view of a bot row. The session blob and the code
/// correlation hash stay server-side.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BotResponse {
    pub id: Uuid,
    pub name: String,
    pub api_id: String,
    pub api_hash: String,
    pub phone_number: String,
    pub is_authorized: bool,
    pub auth_error: Option<String>,
    pub last_auth_attempt: Option<String>,
    pub status: String,
    pub min_delay: i32,
    pub max_delay: i32,
    pub message_content: Option<String>,
    pub auto_reply_enabled: bool,
    pub auto_reply_message: Option<String>,
    pub messages_sent_today: i32,
    pub created_at: String,
}

impl From<bot::Model> for BotResponse {
    fn from(model: bot::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            api_id: model.api_id,
            api_hash: model.api_hash,
            phone_number: model.phone_number,
            is_authorized: model.is_authorized,
            auth_error: model.auth_error,
            last_auth_attempt: model.last_auth_attempt.map(|t| t.to_rfc3339()),
            status: model.status,
            min_delay: model.min_delay,
            max_delay: model.max_delay,
            message_content: model.message_content,
            auto_reply_enabled: model.auto_reply_enabled,
            auto_reply_message: model.auto_reply_message,
            messages_sent_today: model.messages_sent_today,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

async fn list_bots_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<BotResponse>>, AppError> {
    let bots = bot_service::list_for_owner(&app_state.db, auth_user.id).await?;
    Ok(Json(bots.into_iter().map(BotResponse::from).collect()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBotRequest {
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

async fn create_bot_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateBotRequest>,
) -> Result<(StatusCode, Json<BotResponse>), AppError> {
    let bot = bot_service::create_bot(
        &app_state.db,
        auth_user.id,
        bot_service::NewBot {
            name: payload.name,
            api_id: payload.api_id,
            api_hash: payload.api_hash,
            phone_number: payload.phone_number,
            min_delay: payload.min_delay,
            max_delay: payload.max_delay,
            message_content: payload.message_content,
            auto_reply_enabled: payload.auto_reply_enabled,
            auto_reply_message: payload.auto_reply_message,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(bot.into())))
}

async fn get_bot_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
) -> Result<Json<BotResponse>, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    Ok(Json(bot.into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBotRequest {
    pub name: Option<String>,
    pub api_id: Option<String>,
    pub api_hash: Option<String>,
    pub phone_number: Option<String>,
    pub min_delay: Option<i32>,
    pub max_delay: Option<i32>,
    pub message_content: Option<String>,
    pub auto_reply_enabled: Option<bool>,
    pub auto_reply_message: Option<String>,
}

async fn update_bot_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
    Json(payload): Json<UpdateBotRequest>,
) -> Result<Json<BotResponse>, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    let updated = bot_service::update_bot(
        &app_state.db,
        bot,
        bot_service::BotChanges {
            name: payload.name,
            api_id: payload.api_id,
            api_hash: payload.api_hash,
            phone_number: payload.phone_number,
            min_delay: payload.min_delay,
            max_delay: payload.max_delay,
            message_content: payload.message_content.map(Some),
            auto_reply_enabled: payload.auto_reply_enabled,
            auto_reply_message: payload.auto_reply_message.map(Some),
        },
    )
    .await?;
    Ok(Json(updated.into()))
}

async fn delete_bot_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    bot_service::delete_bot(&app_state.db, bot.id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn list_groups_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    let groups = group_service::list_groups(&app_state.db, bot.id).await?;
    Ok(Json(groups))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachGroupRequest {
    pub group_id: String,
    pub group_name: Option<String>,
}

async fn attach_group_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
    Json(payload): Json<AttachGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    let group_name = payload
        .group_name
        .unwrap_or_else(|| format!("Group {}", payload.group_id));
    let group =
        group_service::attach_group(&app_state.db, bot.id, &payload.group_id, &group_name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Deserialize)]
pub struct SetGroupEnabledRequest {
    pub enabled: bool,
}

async fn set_group_enabled_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path((bot_id, group_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SetGroupEnabledRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    let group =
        group_service::set_enabled(&app_state.db, bot.id, group_id, payload.enabled).await?;
    Ok(Json(group))
}

async fn remove_group_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path((bot_id, group_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    group_service::remove_group(&app_state.db, bot.id, group_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
