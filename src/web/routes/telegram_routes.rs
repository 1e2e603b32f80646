use axum::{
    Json, Router,
    extract::{Extension, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::authflow::machine::AuthStep;
use crate::authflow::{orchestrator, qr};
use crate::db::services::{bot_service, log_service};
use crate::services::lifecycle_service;
use crate::telegram::backend::BackendError;
use crate::telegram::models::FetchGroupsRequest;
use crate::web::routes::bot_routes::BotResponse;
use crate::web::{AppError, AppState, models::AuthenticatedUser};

/// Routes that stay reachable without a token (the health banner polls
/// before login).
pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(backend_health_handler))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/send-code", post(send_code_handler))
        .route("/auth/verify-code", post(verify_code_handler))
        .route("/auth/verify-password", post(verify_password_handler))
        .route("/auth/verify-session", post(verify_session_handler))
        .route("/auth/import-session", post(import_session_handler))
        .route("/auth/qr-generate", post(qr_generate_handler))
        .route("/auth/qr-check", post(qr_check_handler))
        .route("/bot/start", post(start_bot_handler))
        .route("/bot/stop", post(stop_bot_handler))
        .route("/bot/test", post(test_message_handler))
        .route("/bot/status/{bot_id}", get(bot_status_handler))
        .route("/bot/logs/{bot_id}", get(bot_logs_handler))
        .route("/bot/stats/{bot_id}", get(bot_stats_handler))
        .route("/groups/fetch", post(fetch_groups_handler))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BotIdRequest {
    bot_id: Uuid,
}

async fn send_code_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<BotIdRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    let advance = orchestrator::send_code(&app_state.db, app_state.backend.as_ref(), bot).await?;
    Ok(Json(json!({
        "success": true,
        "step": advance.step.name(),
        "message": advance.info,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCodeRequestBody {
    bot_id: Uuid,
    code: String,
}

async fn verify_code_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<VerifyCodeRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    let advance =
        orchestrator::verify_code(&app_state.db, app_state.backend.as_ref(), bot, &payload.code)
            .await?;
    Ok(Json(json!({
        "success": advance.step == AuthStep::Authorized,
        "needsPassword": advance.step == AuthStep::AwaitingPassword,
        "step": advance.step.name(),
        "message": advance.info,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyPasswordRequestBody {
    bot_id: Uuid,
    password: String,
}

async fn verify_password_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<VerifyPasswordRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    let advance = orchestrator::verify_password(
        &app_state.db,
        app_state.backend.as_ref(),
        bot,
        &payload.password,
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "step": advance.step.name(),
        "message": advance.info,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifySessionRequestBody {
    bot_id: Uuid,
    session_string: String,
}

async fn verify_session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<VerifySessionRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    let advance = orchestrator::verify_string_session(
        &app_state.db,
        app_state.backend.as_ref(),
        bot,
        &payload.session_string,
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "step": advance.step.name(),
        "message": advance.info,
    })))
}

async fn import_session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut bot_id: Option<Uuid> = None;
    let mut session_file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("botId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(e.to_string()))?;
                bot_id = Some(
                    text.parse()
                        .map_err(|_| AppError::InvalidInput("botId must be a UUID".to_string()))?,
                );
            }
            Some("sessionFile") => {
                let file_name = field
                    .file_name()
                    .unwrap_or("session.session")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(e.to_string()))?;
                session_file = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let bot_id =
        bot_id.ok_or_else(|| AppError::InvalidInput("botId is required".to_string()))?;
    let (file_name, bytes) = session_file
        .ok_or_else(|| AppError::InvalidInput("sessionFile is required".to_string()))?;

    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    let advance = orchestrator::import_session_file(
        &app_state.db,
        app_state.backend.as_ref(),
        bot,
        file_name,
        bytes,
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "step": advance.step.name(),
        "message": advance.info,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrGenerateRequestBody {
    bot_id: Uuid,
    api_id: Option<String>,
    api_hash: Option<String>,
}

async fn qr_generate_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<QrGenerateRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    let mut bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    // Request-scoped credential overrides; not written back.
    if let Some(api_id) = payload.api_id {
        bot.api_id = api_id;
    }
    if let Some(api_hash) = payload.api_hash {
        bot.api_hash = api_hash;
    }

    let reply = qr::generate(&app_state.db, app_state.backend.as_ref(), bot).await?;
    Ok(Json(json!({
        "qr_code": reply.qr_code,
        "expires_in": reply.expires_in,
    })))
}

async fn qr_check_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<BotIdRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    let status = qr::check_once(&app_state.db, app_state.backend.as_ref(), bot).await?;
    Ok(Json(json!({
        "authorized": status == qr::QrStatus::Authorized,
        "requiresPassword": status == qr::QrStatus::PasswordRequired,
    })))
}

async fn start_bot_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<BotIdRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    let report =
        lifecycle_service::start_bot(&app_state.db, app_state.backend.as_ref(), bot).await?;
    Ok(Json(json!({ "success": true, "groups": report.groups })))
}

async fn stop_bot_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<BotIdRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    lifecycle_service::stop_bot(&app_state.db, app_state.backend.as_ref(), bot).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestMessageRequestBody {
    bot_id: Uuid,
    group_id: String,
    message: String,
}

async fn test_message_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<TestMessageRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    lifecycle_service::send_test_message(
        &app_state.db,
        app_state.backend.as_ref(),
        bot,
        &payload.group_id,
        &payload.message,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

async fn bot_status_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    let logs = log_service::recent_bot_logs(&app_state.db, bot.id, 10).await?;
    let groups_count = crate::db::services::group_service::list_groups(&app_state.db, bot.id)
        .await?
        .len();
    Ok(Json(json!({
        "bot": BotResponse::from(bot),
        "logs": logs,
        "groupsCount": groups_count,
    })))
}

#[derive(Deserialize)]
struct LogsQuery {
    limit: Option<u64>,
}

async fn bot_logs_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    let logs =
        log_service::recent_message_logs(&app_state.db, bot.id, query.limit.unwrap_or(50)).await?;
    Ok(Json(json!({ "logs": logs })))
}

async fn bot_stats_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(bot_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, bot_id, auth_user.id).await?;
    let stats = log_service::message_stats(&app_state.db, bot.id).await?;
    Ok(Json(stats))
}

async fn fetch_groups_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<BotIdRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bot = bot_service::find_owned(&app_state.db, payload.bot_id, auth_user.id).await?;
    let session_string = bot.session_string.clone().ok_or(AppError::NotAuthorized)?;

    let reply = app_state
        .backend
        .fetch_groups(FetchGroupsRequest {
            bot_id: bot.id,
            api_id: bot.api_id,
            api_hash: bot.api_hash,
            session_string,
        })
        .await?;

    Ok(Json(json!({
        "status": "SUCCESS",
        "total": reply.groups.len(),
        "groups": reply.groups,
    })))
}

/// Liveness of the automation backend, surfaced as a banner. Three-valued
/// and purely advisory; a down backend never fails other dashboard routes.
async fn backend_health_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend_url = app_state.config.automation_backend_url.clone();
    match app_state.backend.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "backend_status": "ok", "backend_url": backend_url })),
        ),
        Err(err @ (BackendError::Timeout(_) | BackendError::Network(_))) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "backend_status": "unreachable",
                "backend_url": backend_url,
                "error": err.to_string(),
            })),
        ),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "backend_status": "error",
                "backend_url": backend_url,
                "error": err.to_string(),
            })),
        ),
    }
}
