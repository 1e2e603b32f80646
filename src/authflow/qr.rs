//! QR login: payload generation, single status checks for the polling
//! route, and a bounded polling driver with an explicit deadline in place
//! of the dialog's interval/countdown timers. The driver owns its timers,
//! so returning from it is the teardown.

use std::time::Duration;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tokio::time::{Instant, interval, timeout_at};
use tracing::warn;

use crate::db::entities::bot;
use crate::telegram::backend::AutomationBackend;
use crate::telegram::models::{QrGenerateRequest, QrLoginReply};
use crate::web::error::AppError;

use super::machine::{AuthEvent, AuthStep, QR_NEEDS_PASSWORD_MSG};

pub const QR_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Requests a fresh QR payload. Counts as a new attempt: the previous
/// `auth_error` is cleared and the attempt timestamp updated.
pub async fn generate(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
) -> Result<QrLoginReply, AppError> {
    let req = QrGenerateRequest {
        bot_id: bot.id,
        api_id: bot.api_id.clone(),
        api_hash: bot.api_hash.clone(),
    };
    let reply = backend.qr_generate(req).await?;

    let mut active: bot::ActiveModel = bot.into();
    active.auth_error = Set(None);
    active.last_auth_attempt = Set(Some(Utc::now()));
    active.updated_at = Set(Utc::now());
    active.update(db).await?;

    Ok(reply)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrStatus {
    Pending,
    Authorized,
    /// The account has 2FA; QR login cannot finish it.
    PasswordRequired,
}

/// One poll of the backend's QR status. Persists the session as soon as it
/// is granted.
pub async fn check_once(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
) -> Result<QrStatus, AppError> {
    let reply = backend.qr_check(bot.id).await?;

    if reply.authorized {
        if let Some(token) = reply.session_string {
            super::orchestrator::persist_session(db, bot, token).await?;
            return Ok(QrStatus::Authorized);
        }
    }
    if reply.requires_password {
        return Ok(QrStatus::PasswordRequired);
    }
    Ok(QrStatus::Pending)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPollOutcome {
    Authorized,
    PasswordRequired,
    Expired,
}

/// Polls the QR status on a fixed interval until a terminal state or the
/// deadline. Transient backend errors keep the loop alive; database errors
/// abort it. No poll is issued after a terminal state is reached.
pub async fn poll_qr_login(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: &bot::Model,
    deadline: Duration,
) -> Result<QrPollOutcome, AppError> {
    let deadline_at = Instant::now() + deadline;
    let mut ticker = interval(QR_POLL_INTERVAL);
    let mut step = AuthStep::MethodSelect.apply(AuthEvent::QrIssued);

    while !step.is_terminal() {
        if timeout_at(deadline_at, ticker.tick()).await.is_err() {
            step = step.apply(AuthEvent::QrExpired);
            break;
        }

        match backend.qr_check(bot.id).await {
            Ok(reply) => {
                if reply.authorized && reply.session_string.is_some() {
                    if let Some(token) = reply.session_string {
                        super::orchestrator::persist_session(db, bot.clone(), token).await?;
                    }
                    step = step.apply(AuthEvent::SessionGranted);
                } else if reply.requires_password {
                    step = step.apply(AuthEvent::PasswordRequired);
                }
            }
            Err(err) => {
                warn!(bot_id = %bot.id, error = %err, "QR status check failed, retrying");
            }
        }
    }

    Ok(match step {
        AuthStep::Authorized => QrPollOutcome::Authorized,
        AuthStep::Failed(msg) if msg == QR_NEEDS_PASSWORD_MSG => QrPollOutcome::PasswordRequired,
        _ => QrPollOutcome::Expired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authflow::orchestrator::reload_bot;
    use crate::db::test_db;
    use crate::telegram::models::QrStatusReply;
    use crate::telegram::testing::MockBackend;

    fn authorized_reply(token: &str) -> QrStatusReply {
        QrStatusReply {
            authorized: true,
            session_string: Some(token.to_string()),
            requires_password: false,
        }
    }

    #[tokio::test]
    async fn polling_stops_once_authorized() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        // Two pending polls, then a scan.
        MockBackend::push(&backend.qr_check_replies, Ok(QrStatusReply::default()));
        MockBackend::push(&backend.qr_check_replies, Ok(QrStatusReply::default()));
        MockBackend::push(&backend.qr_check_replies, Ok(authorized_reply("qr-tok")));

        let outcome = poll_qr_login(&db, &backend, &bot, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(outcome, QrPollOutcome::Authorized);

        // Terminal state: the poll count has stabilized.
        assert_eq!(backend.call_count("qr_check"), 3);

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert!(row.is_authorized);
        assert_eq!(row.session_string.as_deref(), Some("qr-tok"));
    }

    #[tokio::test]
    async fn password_required_ends_the_loop_without_persisting() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        MockBackend::push(
            &backend.qr_check_replies,
            Ok(QrStatusReply {
                authorized: false,
                session_string: None,
                requires_password: true,
            }),
        );

        let outcome = poll_qr_login(&db, &backend, &bot, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(outcome, QrPollOutcome::PasswordRequired);
        assert_eq!(backend.call_count("qr_check"), 1);

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert!(!row.is_authorized);
    }

    #[tokio::test]
    async fn deadline_expires_an_unscanned_code() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        let outcome = poll_qr_login(&db, &backend, &bot, Duration::from_secs(7))
            .await
            .unwrap();
        assert_eq!(outcome, QrPollOutcome::Expired);

        // 2 s cadence inside a 7 s window: polls at 0, 2, 4 and 6 seconds.
        assert_eq!(backend.call_count("qr_check"), 4);

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert!(!row.is_authorized);
        assert_eq!(row.session_string, None);
    }

    #[tokio::test]
    async fn transient_errors_do_not_end_the_loop() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        MockBackend::push(
            &backend.qr_check_replies,
            Err(crate::telegram::backend::BackendError::Network(
                "connection reset".to_string(),
            )),
        );
        MockBackend::push(&backend.qr_check_replies, Ok(authorized_reply("tok")));

        let outcome = poll_qr_login(&db, &backend, &bot, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(outcome, QrPollOutcome::Authorized);
        assert_eq!(backend.call_count("qr_check"), 2);
    }
}
