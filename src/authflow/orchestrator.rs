//! Drives the four authorization strategies against the automation backend
//! and persists each outcome. Holds no protocol state: every function loads
//! from and writes back to the bot row, so any instance can serve any step.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::db::entities::bot;
use crate::telegram::backend::{AutomationBackend, BackendError};
use crate::telegram::models::{
    FetchGroupsRequest, ImportSessionRequest, SendCodeRequest, VerifyCodeRequest,
    VerifyPasswordRequest,
};
use crate::web::error::AppError;

use super::machine::{AuthEvent, AuthStep};

/// Result of one forwarding step: the reduced dialog step plus an optional
/// human-readable hint from the backend.
#[derive(Debug)]
pub struct AuthAdvance {
    pub step: AuthStep,
    pub info: Option<String>,
}

/// Requests a verification code for the bot's phone number. On success the
/// returned `phone_code_hash` is stored so the verify step can correlate.
pub async fn send_code(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
) -> Result<AuthAdvance, AppError> {
    let req = SendCodeRequest {
        bot_id: bot.id,
        api_id: bot.api_id.clone(),
        api_hash: bot.api_hash.clone(),
        phone_number: bot.phone_number.clone(),
    };

    match backend.send_code(req).await {
        Ok(reply) => {
            let step = AuthStep::AwaitingCodeRequest.apply(AuthEvent::CodeSent);
            let mut active: bot::ActiveModel = bot.into();
            active.phone_code_hash = Set(reply.phone_code_hash);
            active.last_auth_attempt = Set(Some(Utc::now()));
            active.auth_error = Set(None);
            active.updated_at = Set(Utc::now());
            active.update(db).await?;

            let info = reply.info.or_else(|| {
                reply
                    .code_type
                    .map(|t| format!("Verification code sent via {t}"))
            });
            Ok(AuthAdvance { step, info })
        }
        Err(err) => Err(record_failure(db, bot, err).await),
    }
}

/// Submits the user-entered code. Three outcomes: a session (persisted),
/// a 2FA escalation (no row mutation), or a failure (recorded).
pub async fn verify_code(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
    code: &str,
) -> Result<AuthAdvance, AppError> {
    if code.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Verification code is required".to_string(),
        ));
    }

    let req = VerifyCodeRequest {
        bot_id: bot.id,
        phone_code: code.trim().to_string(),
        phone_code_hash: bot.phone_code_hash.clone(),
    };

    match backend.verify_code(req).await {
        Ok(reply) if reply.requires_password => Ok(AuthAdvance {
            step: AuthStep::AwaitingCode.apply(AuthEvent::PasswordRequired),
            info: reply.info,
        }),
        Ok(reply) => match reply.session_string {
            Some(token) => {
                persist_session(db, bot, token).await?;
                Ok(AuthAdvance {
                    step: AuthStep::AwaitingCode.apply(AuthEvent::SessionGranted),
                    info: reply.info,
                })
            }
            None => {
                let err =
                    BackendError::InvalidReply("sign-in reply carried no session".to_string());
                Err(record_failure(db, bot, err).await)
            }
        },
        Err(err) => Err(record_failure(db, bot, err).await),
    }
}

/// Completes a 2FA login. Same terminal outcomes as `verify_code`, minus
/// the escalation branch.
pub async fn verify_password(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
    password: &str,
) -> Result<AuthAdvance, AppError> {
    if password.is_empty() {
        return Err(AppError::InvalidInput("Password is required".to_string()));
    }

    let req = VerifyPasswordRequest {
        bot_id: bot.id,
        password: password.to_string(),
    };

    match backend.verify_password(req).await {
        Ok(reply) => match reply.session_string {
            Some(token) => {
                persist_session(db, bot, token).await?;
                Ok(AuthAdvance {
                    step: AuthStep::AwaitingPassword.apply(AuthEvent::SessionGranted),
                    info: reply.info,
                })
            }
            None => {
                let err =
                    BackendError::InvalidReply("sign-in reply carried no session".to_string());
                Err(record_failure(db, bot, err).await)
            }
        },
        Err(err) => Err(record_failure(db, bot, err).await),
    }
}

/// Validates a pasted session token before persisting it: the token is
/// probed against the backend's group listing and only a non-error reply
/// counts as proof of validity. A failed probe leaves the row untouched,
/// so a dead token is never stored as live.
pub async fn verify_string_session(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
    session_string: &str,
) -> Result<AuthAdvance, AppError> {
    if session_string.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Session string is required".to_string(),
        ));
    }

    let probe = FetchGroupsRequest {
        bot_id: bot.id,
        api_id: bot.api_id.clone(),
        api_hash: bot.api_hash.clone(),
        session_string: session_string.trim().to_string(),
    };

    match backend.fetch_groups(probe).await {
        Ok(_) => {
            persist_session(db, bot, session_string.trim().to_string()).await?;
            Ok(AuthAdvance {
                step: AuthStep::AwaitingStringSession.apply(AuthEvent::SessionGranted),
                info: Some("String session authorized successfully".to_string()),
            })
        }
        Err(_) => Err(AppError::InvalidInput(
            "Invalid or expired session".to_string(),
        )),
    }
}

/// Streams an uploaded session file to the backend's import endpoint and
/// persists the returned token exactly like a code-flow success.
pub async fn import_session_file(
    db: &DatabaseConnection,
    backend: &dyn AutomationBackend,
    bot: bot::Model,
    file_name: String,
    bytes: Vec<u8>,
) -> Result<AuthAdvance, AppError> {
    if bytes.is_empty() {
        return Err(AppError::InvalidInput("Session file is required".to_string()));
    }

    let req = ImportSessionRequest {
        bot_id: bot.id,
        api_id: bot.api_id.clone(),
        api_hash: bot.api_hash.clone(),
        phone_number: bot.phone_number.clone(),
        file_name,
        bytes,
    };

    match backend.import_session(req).await {
        Ok(reply) => match reply.session_string {
            Some(token) => {
                persist_session(db, bot, token).await?;
                Ok(AuthAdvance {
                    step: AuthStep::AwaitingSessionFile.apply(AuthEvent::SessionGranted),
                    info: reply.info.or_else(|| Some("Session imported".to_string())),
                })
            }
            None => {
                let err = BackendError::InvalidReply(
                    "import reply carried no session".to_string(),
                );
                Err(record_failure(db, bot, err).await)
            }
        },
        Err(err) => Err(record_failure(db, bot, err).await),
    }
}

/// Stores a freshly granted session and restores the pairing invariant:
/// `is_authorized` is true exactly when `session_string` is present, and a
/// completed login clears the code correlation hash and any stale error.
pub async fn persist_session(
    db: &DatabaseConnection,
    bot: bot::Model,
    session: String,
) -> Result<bot::Model, AppError> {
    let mut active: bot::ActiveModel = bot.into();
    active.is_authorized = Set(true);
    active.session_string = Set(Some(session));
    active.phone_code_hash = Set(None);
    active.auth_error = Set(None);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Reaction to a downstream expiry discovered on use: drop the dead
/// session, stop the bot and record why, so the UI prompts for
/// re-authorization.
pub async fn mark_session_expired(
    db: &DatabaseConnection,
    bot: bot::Model,
    message: &str,
) -> Result<bot::Model, AppError> {
    let mut active: bot::ActiveModel = bot.into();
    active.is_authorized = Set(false);
    active.session_string = Set(None);
    active.status = Set(bot::STATUS_STOPPED.to_string());
    active.auth_error = Set(Some(message.to_string()));
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

async fn record_failure(
    db: &DatabaseConnection,
    bot: bot::Model,
    err: BackendError,
) -> AppError {
    let message = err.to_string();
    let mut active: bot::ActiveModel = bot.into();
    active.auth_error = Set(Some(message));
    active.last_auth_attempt = Set(Some(Utc::now()));
    active.updated_at = Set(Utc::now());
    if let Err(db_err) = active.update(db).await {
        return AppError::from(db_err);
    }
    AppError::from(err)
}

/// Reloads the bot row by id; used by tests and polling loops that hold a
/// stale model.
pub async fn reload_bot(
    db: &DatabaseConnection,
    bot_id: Uuid,
) -> Result<bot::Model, AppError> {
    use sea_orm::EntityTrait;
    bot::Entity::find_by_id(bot_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Bot not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::telegram::models::{SendCodeReply, SignInReply};
    use crate::telegram::testing::MockBackend;

    fn granted(token: &str) -> SignInReply {
        SignInReply {
            session_string: Some(token.to_string()),
            requires_password: false,
            info: None,
        }
    }

    #[tokio::test]
    async fn code_flow_end_to_end() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        MockBackend::push(
            &backend.send_code_replies,
            Ok(SendCodeReply {
                phone_code_hash: Some("abc".to_string()),
                code_type: Some("app".to_string()),
                info: None,
            }),
        );

        let advance = send_code(&db, &backend, bot.clone()).await.unwrap();
        assert_eq!(advance.step, AuthStep::AwaitingCode);

        let bot = reload_bot(&db, bot.id).await.unwrap();
        assert_eq!(bot.phone_code_hash.as_deref(), Some("abc"));
        assert!(bot.last_auth_attempt.is_some());
        assert!(!bot.is_authorized);

        MockBackend::push(&backend.verify_code_replies, Ok(granted("tok")));
        let advance = verify_code(&db, &backend, bot.clone(), "12345").await.unwrap();
        assert_eq!(advance.step, AuthStep::Authorized);

        let bot = reload_bot(&db, bot.id).await.unwrap();
        assert!(bot.is_authorized);
        assert_eq!(bot.session_string.as_deref(), Some("tok"));
        assert_eq!(bot.phone_code_hash, None);
        assert_eq!(bot.auth_error, None);
    }

    #[tokio::test]
    async fn password_escalation_does_not_touch_authorization() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        MockBackend::push(
            &backend.verify_code_replies,
            Ok(SignInReply {
                session_string: None,
                requires_password: true,
                info: Some("2FA enabled".to_string()),
            }),
        );

        let advance = verify_code(&db, &backend, bot.clone(), "12345").await.unwrap();
        assert_eq!(advance.step, AuthStep::AwaitingPassword);

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert!(!row.is_authorized);
        assert_eq!(row.session_string, None);

        MockBackend::push(&backend.verify_password_replies, Ok(granted("tok2")));
        let advance = verify_password(&db, &backend, row, "hunter2").await.unwrap();
        assert_eq!(advance.step, AuthStep::Authorized);

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert!(row.is_authorized);
        assert_eq!(row.session_string.as_deref(), Some("tok2"));
    }

    #[tokio::test]
    async fn failed_verification_is_recorded() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        MockBackend::push(
            &backend.verify_code_replies,
            Err(BackendError::Api("Invalid code".to_string())),
        );

        let err = verify_code(&db, &backend, bot.clone(), "00000").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamError(_)));

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert_eq!(row.auth_error.as_deref(), Some("Invalid code"));
        assert!(!row.is_authorized);
    }

    #[tokio::test]
    async fn string_session_probe_failure_leaves_row_unchanged() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        MockBackend::push(
            &backend.fetch_groups_replies,
            Err(BackendError::Api("Session expired".to_string())),
        );

        let err = verify_string_session(&db, &backend, bot.clone(), "1AgAO...")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert!(!row.is_authorized);
        assert_eq!(row.session_string, None);
        assert_eq!(row.auth_error, None);
    }

    #[tokio::test]
    async fn string_session_is_persisted_only_after_probe() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        let advance = verify_string_session(&db, &backend, bot.clone(), " 1AgAO... ")
            .await
            .unwrap();
        assert_eq!(advance.step, AuthStep::Authorized);
        assert_eq!(backend.call_count("fetch_groups"), 1);

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert!(row.is_authorized);
        assert_eq!(row.session_string.as_deref(), Some("1AgAO..."));
    }

    #[tokio::test]
    async fn imported_file_persists_like_a_code_success() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let backend = MockBackend::default();

        MockBackend::push(&backend.import_session_replies, Ok(granted("imported")));

        let advance = import_session_file(
            &db,
            &backend,
            bot.clone(),
            "session_+1000.session".to_string(),
            vec![1, 2, 3],
        )
        .await
        .unwrap();
        assert_eq!(advance.step, AuthStep::Authorized);

        let row = reload_bot(&db, bot.id).await.unwrap();
        assert!(row.is_authorized);
        assert_eq!(row.session_string.as_deref(), Some("imported"));
        assert_eq!(row.auth_error, None);
    }

    #[tokio::test]
    async fn expired_session_reset_restores_the_invariant() {
        let db = test_db::connect().await;
        let owner = test_db::seed_user(&db, "owner").await;
        let bot = test_db::seed_bot(&db, owner.id).await;
        let bot = persist_session(&db, bot, "tok".to_string()).await.unwrap();
        assert!(bot.is_authorized);

        let row = mark_session_expired(&db, bot, "Session expired, please re-authenticate")
            .await
            .unwrap();
        assert!(!row.is_authorized);
        assert_eq!(row.session_string, None);
        assert_eq!(row.status, bot::STATUS_STOPPED);
        assert!(row.auth_error.is_some());
    }
}
