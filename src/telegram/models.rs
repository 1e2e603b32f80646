//! Wire payloads exchanged with the automation backend.
//!
//! Field names mirror the backend's API (`detail` on errors, `info` hints,
//! `session_string` blobs). The shapes live here, behind the
//! [`AutomationBackend`](super::backend::AutomationBackend) seam, so the
//! contract can change without touching the orchestrator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct SendCodeRequest {
    pub bot_id: Uuid,
    pub api_id: String,
    pub api_hash: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendCodeReply {
    #[serde(default)]
    pub phone_code_hash: Option<String>,
    /// Delivery-channel hint ("app" vs "sms").
    #[serde(default)]
    pub code_type: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyCodeRequest {
    pub bot_id: Uuid,
    pub phone_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_code_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPasswordRequest {
    pub bot_id: Uuid,
    pub password: String,
}

/// Outcome of a sign-in attempt (code, password or file import).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignInReply {
    #[serde(default)]
    pub session_string: Option<String>,
    #[serde(default)]
    pub requires_password: bool,
    #[serde(default)]
    pub info: Option<String>,
}

/// Session file upload; the raw bytes are streamed through untouched.
#[derive(Debug, Clone)]
pub struct ImportSessionRequest {
    pub bot_id: Uuid,
    pub api_id: String,
    pub api_hash: String,
    pub phone_number: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QrGenerateRequest {
    pub bot_id: Uuid,
    pub api_id: String,
    pub api_hash: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QrLoginReply {
    /// Base64-encoded PNG, rendered by the client.
    pub qr_code: String,
    #[serde(default = "default_qr_expiry")]
    pub expires_in: u64,
}

fn default_qr_expiry() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QrStatusReply {
    #[serde(default)]
    pub authorized: bool,
    #[serde(default)]
    pub session_string: Option<String>,
    #[serde(default)]
    pub requires_password: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchGroupsRequest {
    pub bot_id: Uuid,
    pub api_id: String,
    pub api_hash: String,
    pub session_string: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteGroup {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub members_count: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchGroupsReply {
    #[serde(default)]
    pub groups: Vec<RemoteGroup>,
    #[serde(default)]
    pub total: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartBotRequest {
    pub bot_id: Uuid,
    pub api_id: String,
    pub api_hash: String,
    pub phone_number: String,
    pub session_string: String,
    pub message_template: String,
    pub min_delay: i32,
    pub max_delay: i32,
    pub group_ids: Vec<String>,
    pub auto_reply_enabled: bool,
    pub auto_reply_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestMessageRequest {
    pub bot_id: Uuid,
    pub api_id: String,
    pub api_hash: String,
    pub phone_number: String,
    pub session_string: String,
    pub group_id: String,
    pub message: String,
}

/// FastAPI-style error envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiDetail {
    #[serde(default)]
    pub detail: Option<String>,
}
