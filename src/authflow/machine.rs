//! The authorization dialog as a pure state machine.
//!
//! All side effects (backend calls, row updates) live in the orchestrator;
//! the reducer here only maps (step, event) to the next step. Handlers
//! return the reduced step to the client so the dialog renders from it.

pub const QR_NEEDS_PASSWORD_MSG: &str =
    "This account has 2FA enabled. QR login cannot complete it; use the verification-code flow.";
pub const QR_EXPIRED_MSG: &str = "QR code expired. Generate a new one.";

/// Where the authorization dialog currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStep {
    /// Strategy picker; nothing in flight.
    MethodSelect,
    /// Code flow chosen, code not requested yet.
    AwaitingCodeRequest,
    /// Code sent to the account, waiting for the user to type it in.
    AwaitingCode,
    /// Backend signalled 2FA; waiting for the password.
    AwaitingPassword,
    /// Waiting for a pasted pre-generated session token.
    AwaitingStringSession,
    /// Waiting for an uploaded session file.
    AwaitingSessionFile,
    /// QR payload issued, waiting for a scan.
    AwaitingQrScan,
    /// Terminal: a session was obtained and persisted.
    Authorized,
    /// Terminal: last attempt failed with this message.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    ChooseCodeFlow,
    ChooseStringSession,
    ChooseImportFile,
    CodeSent,
    SessionGranted,
    PasswordRequired,
    QrIssued,
    QrExpired,
    Error(String),
    Reset,
}

impl AuthStep {
    /// The reducer. Events that make no sense in the current step leave it
    /// unchanged rather than corrupting the dialog.
    pub fn apply(self, event: AuthEvent) -> AuthStep {
        use AuthEvent::*;
        use AuthStep::*;

        match (self, event) {
            (_, Reset) => MethodSelect,
            (MethodSelect, ChooseCodeFlow) => AwaitingCodeRequest,
            (MethodSelect, ChooseStringSession) => AwaitingStringSession,
            (MethodSelect, ChooseImportFile) => AwaitingSessionFile,
            (MethodSelect | AwaitingCodeRequest | AwaitingCode, CodeSent) => AwaitingCode,
            (AwaitingCode, PasswordRequired) => AwaitingPassword,
            // QR login cannot complete 2FA; the user is sent to the code flow.
            (AwaitingQrScan, PasswordRequired) => Failed(QR_NEEDS_PASSWORD_MSG.to_string()),
            // Regenerating after a failure is a fresh attempt.
            (MethodSelect | AwaitingQrScan | Failed(_), QrIssued) => AwaitingQrScan,
            (AwaitingQrScan, QrExpired) => Failed(QR_EXPIRED_MSG.to_string()),
            (Authorized, _) => Authorized,
            (_, SessionGranted) => Authorized,
            (_, Error(msg)) => Failed(msg),
            (step, _) => step,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthStep::Authorized | AuthStep::Failed(_))
    }

    /// Step name as serialized to the client.
    pub fn name(&self) -> &'static str {
        match self {
            AuthStep::MethodSelect => "method",
            AuthStep::AwaitingCodeRequest => "initial",
            AuthStep::AwaitingCode => "code",
            AuthStep::AwaitingPassword => "password",
            AuthStep::AwaitingStringSession => "string-session",
            AuthStep::AwaitingSessionFile => "import-session",
            AuthStep::AwaitingQrScan => "qr",
            AuthStep::Authorized => "success",
            AuthStep::Failed(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_flow_happy_path() {
        let step = AuthStep::MethodSelect
            .apply(AuthEvent::ChooseCodeFlow)
            .apply(AuthEvent::CodeSent)
            .apply(AuthEvent::SessionGranted);
        assert_eq!(step, AuthStep::Authorized);
    }

    #[test]
    fn code_flow_escalates_to_password() {
        let step = AuthStep::AwaitingCode.apply(AuthEvent::PasswordRequired);
        assert_eq!(step, AuthStep::AwaitingPassword);
        assert_eq!(
            step.apply(AuthEvent::SessionGranted),
            AuthStep::Authorized
        );
    }

    #[test]
    fn resending_a_code_stays_in_code_entry() {
        assert_eq!(
            AuthStep::AwaitingCode.apply(AuthEvent::CodeSent),
            AuthStep::AwaitingCode
        );
    }

    #[test]
    fn qr_terminal_states() {
        let scanning = AuthStep::MethodSelect.apply(AuthEvent::QrIssued);
        assert_eq!(scanning, AuthStep::AwaitingQrScan);

        assert_eq!(
            scanning.clone().apply(AuthEvent::QrExpired),
            AuthStep::Failed(QR_EXPIRED_MSG.to_string())
        );
        assert_eq!(
            scanning.clone().apply(AuthEvent::PasswordRequired),
            AuthStep::Failed(QR_NEEDS_PASSWORD_MSG.to_string())
        );
        assert_eq!(
            scanning.apply(AuthEvent::SessionGranted),
            AuthStep::Authorized
        );
    }

    #[test]
    fn qr_can_be_regenerated_after_expiry() {
        let expired = AuthStep::AwaitingQrScan.apply(AuthEvent::QrExpired);
        assert!(expired.is_terminal());
        assert_eq!(expired.apply(AuthEvent::QrIssued), AuthStep::AwaitingQrScan);
    }

    #[test]
    fn errors_are_terminal_until_reset() {
        let failed = AuthStep::AwaitingCode.apply(AuthEvent::Error("boom".to_string()));
        assert_eq!(failed, AuthStep::Failed("boom".to_string()));
        assert!(failed.is_terminal());
        assert_eq!(failed.apply(AuthEvent::Reset), AuthStep::MethodSelect);
    }

    #[test]
    fn authorized_is_absorbing() {
        assert_eq!(
            AuthStep::Authorized.apply(AuthEvent::Error("late".to_string())),
            AuthStep::Authorized
        );
        assert_eq!(
            AuthStep::Authorized.apply(AuthEvent::QrIssued),
            AuthStep::Authorized
        );
    }

    #[test]
    fn each_strategy_is_reachable_from_method_select() {
        assert_eq!(
            AuthStep::MethodSelect.apply(AuthEvent::ChooseStringSession),
            AuthStep::AwaitingStringSession
        );
        assert_eq!(
            AuthStep::MethodSelect.apply(AuthEvent::ChooseImportFile),
            AuthStep::AwaitingSessionFile
        );
        assert_eq!(
            AuthStep::AwaitingStringSession.apply(AuthEvent::SessionGranted),
            AuthStep::Authorized
        );
        assert_eq!(
            AuthStep::AwaitingSessionFile.apply(AuthEvent::Error("bad file".to_string())),
            AuthStep::Failed("bad file".to_string())
        );
    }

    #[test]
    fn nonsense_events_leave_step_unchanged() {
        assert_eq!(
            AuthStep::MethodSelect.apply(AuthEvent::PasswordRequired),
            AuthStep::MethodSelect
        );
        assert_eq!(
            AuthStep::AwaitingPassword.apply(AuthEvent::CodeSent),
            AuthStep::AwaitingPassword
        );
    }
}
