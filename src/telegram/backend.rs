use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use super::models::{
    ApiDetail, FetchGroupsReply, FetchGroupsRequest, ImportSessionRequest, QrGenerateRequest,
    QrLoginReply, QrStatusReply, SendCodeReply, SendCodeRequest, SignInReply, StartBotRequest,
    TestMessageRequest, VerifyCodeRequest, VerifyPasswordRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend replied with a structured error (`detail` field).
    #[error("{0}")]
    Api(String),
    /// The stored session is no longer valid server-side.
    #[error("Session expired, please re-authenticate")]
    SessionExpired,
    #[error("automation backend timed out: {0}")]
    Timeout(String),
    #[error("automation backend unreachable: {0}")]
    Network(String),
    /// Non-JSON reply, usually a misconfigured backend URL serving HTML.
    #[error("automation backend returned an invalid reply: {0}")]
    InvalidReply(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

/// Ensures an explicit scheme and no trailing slash.
pub fn normalize_backend_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Maps a structured backend error to its typed form. A 4xx reply whose
/// detail mentions an expired session gets its own variant so the lifecycle
/// layer can reset the stored authorization.
fn classify_api_error(status: StatusCode, detail: String) -> BackendError {
    if status.is_client_error() && detail.to_lowercase().contains("session expired") {
        BackendError::SessionExpired
    } else {
        BackendError::Api(detail)
    }
}

/// The narrow seam to the external automation backend. Everything that
/// touches the Telegram network goes through here, so tests swap in a
/// recording mock and the wire contract stays in one place.
#[async_trait]
pub trait AutomationBackend: Send + Sync {
    async fn send_code(&self, req: SendCodeRequest) -> Result<SendCodeReply, BackendError>;
    async fn verify_code(&self, req: VerifyCodeRequest) -> Result<SignInReply, BackendError>;
    async fn verify_password(&self, req: VerifyPasswordRequest)
    -> Result<SignInReply, BackendError>;
    async fn import_session(&self, req: ImportSessionRequest) -> Result<SignInReply, BackendError>;
    async fn qr_generate(&self, req: QrGenerateRequest) -> Result<QrLoginReply, BackendError>;
    async fn qr_check(&self, bot_id: Uuid) -> Result<QrStatusReply, BackendError>;
    async fn fetch_groups(&self, req: FetchGroupsRequest)
    -> Result<FetchGroupsReply, BackendError>;
    async fn start_bot(&self, req: StartBotRequest) -> Result<(), BackendError>;
    async fn stop_bot(&self, bot_id: Uuid) -> Result<(), BackendError>;
    async fn send_test_message(&self, req: TestMessageRequest) -> Result<(), BackendError>;
    async fn health(&self) -> Result<(), BackendError>;
}

/// reqwest-backed implementation of [`AutomationBackend`].
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_backend_url(base_url),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, BackendError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !content_type.starts_with("application/json") {
            return Err(BackendError::InvalidReply(format!(
                "status {status}, content-type {content_type:?} (check AUTOMATION_BACKEND_URL)"
            )));
        }

        if !status.is_success() {
            let detail = response
                .json::<ApiDetail>()
                .await
                .ok()
                .and_then(|d| d.detail)
                .unwrap_or_else(|| format!("automation backend returned {status}"));
            return Err(classify_api_error(status, detail));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::InvalidReply(e.to_string()))
    }
}

#[async_trait]
impl AutomationBackend for HttpBackend {
    async fn send_code(&self, req: SendCodeRequest) -> Result<SendCodeReply, BackendError> {
        self.post_json("/api/telegram/auth/send-code", &req).await
    }

    async fn verify_code(&self, req: VerifyCodeRequest) -> Result<SignInReply, BackendError> {
        self.post_json("/api/telegram/auth/verify-code", &req).await
    }

    async fn verify_password(
        &self,
        req: VerifyPasswordRequest,
    ) -> Result<SignInReply, BackendError> {
        self.post_json("/api/telegram/auth/verify-password", &req)
            .await
    }

    async fn import_session(&self, req: ImportSessionRequest) -> Result<SignInReply, BackendError> {
        let url = format!("{}/import-session", self.base_url);
        let part = reqwest::multipart::Part::bytes(req.bytes).file_name(req.file_name);
        let form = reqwest::multipart::Form::new()
            .part("session_file", part)
            .text("api_id", req.api_id)
            .text("api_hash", req.api_hash)
            .text("phone", req.phone_number);

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn qr_generate(&self, req: QrGenerateRequest) -> Result<QrLoginReply, BackendError> {
        self.post_json("/api/telegram/auth/qr-login", &req).await
    }

    async fn qr_check(&self, bot_id: Uuid) -> Result<QrStatusReply, BackendError> {
        self.post_json(
            "/api/telegram/auth/qr-check",
            &serde_json::json!({ "bot_id": bot_id }),
        )
        .await
    }

    async fn fetch_groups(
        &self,
        req: FetchGroupsRequest,
    ) -> Result<FetchGroupsReply, BackendError> {
        self.post_json("/api/telegram/groups/fetch", &req).await
    }

    async fn start_bot(&self, req: StartBotRequest) -> Result<(), BackendError> {
        self.post_json::<_, serde_json::Value>("/api/telegram/bot/start", &req)
            .await
            .map(|_| ())
    }

    async fn stop_bot(&self, bot_id: Uuid) -> Result<(), BackendError> {
        self.post_json::<_, serde_json::Value>(
            "/api/telegram/bot/stop",
            &serde_json::json!({ "bot_id": bot_id }),
        )
        .await
        .map(|_| ())
    }

    async fn send_test_message(&self, req: TestMessageRequest) -> Result<(), BackendError> {
        self.post_json::<_, serde_json::Value>("/api/telegram/test/send", &req)
            .await
            .map(|_| ())
    }

    async fn health(&self) -> Result<(), BackendError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Api(format!(
                "health probe returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_scheme_and_strips_trailing_slash() {
        assert_eq!(
            normalize_backend_url("backend.example.com/"),
            "https://backend.example.com"
        );
        assert_eq!(
            normalize_backend_url("http://localhost:8000//"),
            "http://localhost:8000"
        );
        assert_eq!(
            normalize_backend_url("https://api.example.com"),
            "https://api.example.com"
        );
    }

    #[test]
    fn expired_session_detail_gets_typed_variant() {
        let err = classify_api_error(
            StatusCode::BAD_REQUEST,
            "Session expired, please re-authenticate".to_string(),
        );
        assert!(matches!(err, BackendError::SessionExpired));

        let err = classify_api_error(StatusCode::BAD_REQUEST, "Invalid code".to_string());
        assert!(matches!(err, BackendError::Api(msg) if msg == "Invalid code"));

        // A 5xx mentioning sessions is not an auth reset signal.
        let err = classify_api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "session expired cache".to_string(),
        );
        assert!(matches!(err, BackendError::Api(_)));
    }
}
