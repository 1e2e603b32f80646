//! Start/stop/test-send forwarding. The dashboard never runs the bots
//! itself; live process state stays in the automation backend and this
//! layer only mirrors the reported status into the bot row.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tracing::info;

use crate::authflow::orchestrator;
use crate::db::entities::{bot, message_log};
use crate::db::services::{bot_service, log_service};
use crate::telegram::backend::{AutomationBackend, BackendError};
use crate::telegram::models::{StartBotRequest, TestMessageRequest};
use crate::web::error::AppError;

#[derive(Debug)]
pub struct StartReport {
    pub groups: usize,
}

/// Forwards a start command. An unauthorized bot is rejected locally —
/// the backend is never contacted without a session to hand it.
pub async fn start_bot(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
) -> Result<StartReport, AppError> {
    let session_string = match (bot.is_authorized, bot.session_string.clone()) {
        (true, Some(session)) => session,
        _ => return Err(AppError::NotAuthorized),
    };

    let group_ids = bot_service::enabled_group_ids(db, bot.id).await?;
    let groups = group_ids.len();

    let req = StartBotRequest {
        bot_id: bot.id,
        api_id: bot.api_id.clone(),
        api_hash: bot.api_hash.clone(),
        phone_number: bot.phone_number.clone(),
        session_string,
        message_template: bot
            .message_content
            .clone()
            .unwrap_or_else(|| "Hello from Bot!".to_string()),
        min_delay: bot.min_delay,
        max_delay: bot.max_delay,
        group_ids,
        auto_reply_enabled: bot.auto_reply_enabled,
        auto_reply_message: bot.auto_reply_message.clone(),
    };

    let bot_id = bot.id;
    match backend.start_bot(req).await {
        Ok(()) => {
            let mut active: bot::ActiveModel = bot.into();
            active.status = Set(bot::STATUS_RUNNING.to_string());
            active.auth_error = Set(None);
            active.updated_at = Set(Utc::now());
            active.update(db).await?;

            info!(%bot_id, groups, "bot started");
            log_service::log_bot_event(
                db,
                bot_id,
                "info",
                &format!("Bot started with {groups} groups"),
            )
            .await;
            Ok(StartReport { groups })
        }
        Err(BackendError::SessionExpired) => {
            // The stored session went stale server-side: drop it and ask
            // for a fresh authorization instead of looping on start.
            let message = BackendError::SessionExpired.to_string();
            orchestrator::mark_session_expired(db, bot, &message).await?;
            Err(AppError::UpstreamError(message))
        }
        Err(err) => {
            let message = err.to_string();
            let mut active: bot::ActiveModel = bot.into();
            active.status = Set(bot::STATUS_ERROR.to_string());
            active.auth_error = Set(Some(message));
            active.updated_at = Set(Utc::now());
            active.update(db).await?;
            Err(err.into())
        }
    }
}

/// Forwards a stop command and marks the row stopped. The backend treats
/// stopping a non-running bot as success, so this is idempotent.
pub async fn stop_bot(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
) -> Result<bot::Model, AppError> {
    backend.stop_bot(bot.id).await?;

    let bot_id = bot.id;
    let mut active: bot::ActiveModel = bot.into();
    active.status = Set(bot::STATUS_STOPPED.to_string());
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;

    log_service::log_bot_event(db, bot_id, "info", "Bot stopped").await;
    Ok(updated)
}

/// One-off test send to a single group, logged as a sent message. The log
/// insert is best-effort and never fails the send.
pub async fn send_test_message(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
    group_id: &str,
    message: &str,
) -> Result<(), AppError> {
    if group_id.trim().is_empty() || message.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "group_id and message are required".to_string(),
        ));
    }
    let session_string = match bot.session_string.clone() {
        Some(session) => session,
        None => return Err(AppError::NotAuthorized),
    };

    let req = TestMessageRequest {
        bot_id: bot.id,
        api_id: bot.api_id.clone(),
        api_hash: bot.api_hash.clone(),
        phone_number: bot.phone_number.clone(),
        session_string,
        group_id: group_id.to_string(),
        message: message.to_string(),
    };

    backend.send_test_message(req).await?;

    if let Err(e) = log_service::insert_message_log(
        db,
        bot.id,
        group_id,
        message,
        message_log::STATUS_SENT,
        None,
    )
    .await
    {
        tracing::warn!(bot_id = %bot.id, error = %e, "failed to log test message");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authflow::orchestrator::{persist_session, reload_bot};
    use crate::db::test_db;

    #[tokio::test]
    async fn unauthorized_start_never_reaches_the_backend() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = crate::telegram::testing::MockBackend::default();

        let err = start_bot(&db, &backend, bot).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_start_marks_the_bot_running() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let bot = persist_session(&db, bot, "tok".to_string()).await.unwrap();
        let backend = crate::telegram::testing::MockBackend::default();

        crate::db::services::group_service::attach_group(&db, bot.id, "-100", "g")
            .await
            .unwrap();

        let report = start_bot(&db, &backend, bot.clone()).await.unwrap();
        assert_eq!(report.groups, 1);
        assert_eq!(backend.call_count("start_bot"), 1);

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert_eq!(row.status, bot::STATUS_RUNNING);
        assert_eq!(row.auth_error, None);
    }

    #[tokio::test]
    async fn stale_session_resets_authorization() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let bot = persist_session(&db, bot, "tok".to_string()).await.unwrap();
        let backend = crate::telegram::testing::MockBackend::default();

        crate::telegram::testing::MockBackend::push(
            &backend.start_replies,
            Err(BackendError::SessionExpired),
        );

        let err = start_bot(&db, &backend, bot.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamError(_)));

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert!(!row.is_authorized);
        assert_eq!(row.session_string, None);
        assert_eq!(row.status, bot::STATUS_STOPPED);
        assert!(row.auth_error.is_some());
    }

    #[tokio::test]
    async fn failed_start_is_recorded_as_error_status() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let bot = persist_session(&db, bot, "tok".to_string()).await.unwrap();
        let backend = crate::telegram::testing::MockBackend::default();

        crate::telegram::testing::MockBackend::push(
            &backend.start_replies,
            Err(BackendError::Api("flood wait".to_string())),
        );

        start_bot(&db, &backend, bot.clone()).await.unwrap_err();

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert_eq!(row.status, bot::STATUS_ERROR);
        assert_eq!(row.auth_error.as_deref(), Some("flood wait"));
        // The session itself is still considered valid.
        assert!(row.is_authorized);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = crate::telegram::testing::MockBackend::default();

        let first = stop_bot(&db, &backend, bot).await.unwrap();
        assert_eq!(first.status, bot::STATUS_STOPPED);

        let second = stop_bot(&db, &backend, first).await.unwrap();
        assert_eq!(second.status, bot::STATUS_STOPPED);
        assert_eq!(backend.call_count("stop_bot"), 2);
    }

    #[tokio::test]
    async fn test_send_requires_a_session_and_logs_the_message() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = crate::telegram::testing::MockBackend::default();

        let err = send_test_message(&db, &backend, bot.clone(), "-100", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized));
        assert!(backend.calls.lock().unwrap().is_empty());

        let bot = persist_session(&db, bot, "tok".to_string()).await.unwrap();
        send_test_message(&db, &backend, bot.clone(), "-100", "hello")
            .await
            .unwrap();

        let logs = log_service::recent_message_logs(&db, bot.id, 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, message_log::STATUS_SENT);
    }
}
