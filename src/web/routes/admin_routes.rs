use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use sea_orm::EntityTrait;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::entities::bot;
use crate::db::services::{admin_service, bot_service};
use crate::web::{AppError, AppState, models::AuthenticatedUser};

pub fn create_admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(stats_handler))
        .route("/stats/charts", get(charts_handler))
        .route("/users", get(list_users_handler))
        .route("/users/role", post(set_role_handler))
        .route("/bots", get(list_bots_handler))
        .route("/bots/{bot_id}", delete(delete_bot_handler))
}

async fn stats_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    admin_service::require_admin(&app_state.db, auth_user.id).await?;
    let stats = admin_service::overview(&app_state.db).await?;
    Ok(Json(stats))
}

async fn charts_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    admin_service::require_admin(&app_state.db, auth_user.id).await?;
    let chart = admin_service::activity_chart(&app_state.db).await?;
    Ok(Json(chart))
}

async fn list_users_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    admin_service::require_admin(&app_state.db, auth_user.id).await?;
    let users = admin_service::list_users(&app_state.db).await?;
    Ok(Json(users))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRoleRequest {
    pub user_id: i32,
    pub role: String,
}

async fn set_role_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    admin_service::require_admin(&app_state.db, auth_user.id).await?;
    admin_service::set_role(&app_state.db, payload.user_id, payload.role == "admin").await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn list_bots_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    admin_service::require_admin(&app_state.db, auth_user.id).await?;
    let bots = admin_service::list_bots(&app_state.db).await?;
    Ok(Json(bots))
}

async fn delete_bot_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    admin_service::require_admin(&app_state.db, auth_user.id).await?;
    // Admin delete is not owner-scoped.
    bot::Entity::find_by_id(bot_id)
        .one(&app_state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Bot not found".to_string()))?;
    bot_service::delete_bot(&app_state.db, bot_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
