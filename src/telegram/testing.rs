//! Recording [`AutomationBackend`] double for tests. Replies are queued per
//! method; an empty queue yields the reply type's default.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::backend::{AutomationBackend, BackendError};
use super::models::{
    FetchGroupsReply, FetchGroupsRequest, ImportSessionRequest, QrGenerateRequest, QrLoginReply,
    QrStatusReply, SendCodeReply, SendCodeRequest, SignInReply, StartBotRequest,
    TestMessageRequest, VerifyCodeRequest, VerifyPasswordRequest,
};

type Queue<T> = Mutex<VecDeque<Result<T, BackendError>>>;

#[derive(Default)]
pub struct MockBackend {
    pub calls: Mutex<Vec<String>>,
    pub send_code_replies: Queue<SendCodeReply>,
    pub verify_code_replies: Queue<SignInReply>,
    pub verify_password_replies: Queue<SignInReply>,
    pub import_session_replies: Queue<SignInReply>,
    pub qr_generate_replies: Queue<QrLoginReply>,
    pub qr_check_replies: Queue<QrStatusReply>,
    pub fetch_groups_replies: Queue<FetchGroupsReply>,
    pub start_replies: Queue<()>,
    pub stop_replies: Queue<()>,
    pub test_send_replies: Queue<()>,
    pub health_replies: Queue<()>,
}

impl MockBackend {
    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn pop<T: Default>(queue: &Queue<T>) -> Result<T, BackendError> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(T::default()))
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    pub fn push<T>(queue: &Queue<T>, reply: Result<T, BackendError>) {
        queue.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl AutomationBackend for MockBackend {
    async fn send_code(&self, _req: SendCodeRequest) -> Result<SendCodeReply, BackendError> {
        self.record("send_code");
        Self::pop(&self.send_code_replies)
    }

    async fn verify_code(&self, _req: VerifyCodeRequest) -> Result<SignInReply, BackendError> {
        self.record("verify_code");
        Self::pop(&self.verify_code_replies)
    }

    async fn verify_password(
        &self,
        _req: VerifyPasswordRequest,
    ) -> Result<SignInReply, BackendError> {
        self.record("verify_password");
        Self::pop(&self.verify_password_replies)
    }

    async fn import_session(
        &self,
        _req: ImportSessionRequest,
    ) -> Result<SignInReply, BackendError> {
        self.record("import_session");
        Self::pop(&self.import_session_replies)
    }

    async fn qr_generate(&self, _req: QrGenerateRequest) -> Result<QrLoginReply, BackendError> {
        self.record("qr_generate");
        self.qr_generate_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(QrLoginReply {
                    qr_code: "cXItcGF5bG9hZA==".to_string(),
                    expires_in: 60,
                })
            })
    }

    async fn qr_check(&self, _bot_id: Uuid) -> Result<QrStatusReply, BackendError> {
        self.record("qr_check");
        Self::pop(&self.qr_check_replies)
    }

    async fn fetch_groups(
        &self,
        _req: FetchGroupsRequest,
    ) -> Result<FetchGroupsReply, BackendError> {
        self.record("fetch_groups");
        Self::pop(&self.fetch_groups_replies)
    }

    async fn start_bot(&self, _req: StartBotRequest) -> Result<(), BackendError> {
        self.record("start_bot");
        Self::pop(&self.start_replies)
    }

    async fn stop_bot(&self, _bot_id: Uuid) -> Result<(), BackendError> {
        self.record("stop_bot");
        Self::pop(&self.stop_replies)
    }

    async fn send_test_message(&self, _req: TestMessageRequest) -> Result<(), BackendError> {
        self.record("send_test_message");
        Self::pop(&self.test_send_replies)
    }

    async fn health(&self) -> Result<(), BackendError> {
        self.record("health");
        Self::pop(&self.health_replies)
    }
}
