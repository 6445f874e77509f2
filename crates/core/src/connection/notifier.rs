//! Failure notices and the default tracing-backed notifier

use serde::Serialize;
use workbridge_common::auth::DeviceCodeInfo;
use workbridge_common::error::{ErrorClassification, ErrorSeverity};
use workbridge_domain::ConnectionError;

use super::ports::ConnectionNotifier;
use super::state::ConnectionState;

/// Why the host should remind the user to sign in again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderReason {
    TokenExpired,
    RefreshFailed,
    AuthFailed,
}

/// Actions a host may offer next to a failure prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeAction {
    Retry,
    ViewLogs,
}

/// Emitted on entry of every failure state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotice {
    pub connection_id: String,
    #[serde(serialize_with = "serialize_state")]
    pub state: ConnectionState,
    /// Set only for `auth_failed`.
    pub reason: Option<ReminderReason>,
    pub message: String,
    pub network: bool,
    pub severity: ErrorSeverity,
}

impl FailureNotice {
    #[must_use]
    pub fn new(
        connection_id: impl Into<String>,
        state: ConnectionState,
        reason: Option<ReminderReason>,
        error: &ConnectionError,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            state,
            reason,
            message: error.to_string(),
            network: error.is_network(),
            severity: error.severity(),
        }
    }

    /// Network failures can be retried straight away; everything else points
    /// at the logs first.
    #[must_use]
    pub fn actions(&self) -> Vec<NoticeAction> {
        if self.network {
            vec![NoticeAction::Retry, NoticeAction::ViewLogs]
        } else {
            vec![NoticeAction::ViewLogs]
        }
    }
}

fn serialize_state<S: serde::Serializer>(
    state: &ConnectionState,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(state.path())
}

/// Notifier that only writes structured log events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl ConnectionNotifier for TracingNotifier {
    fn state_changed(&self, connection_id: &str, from: ConnectionState, to: ConnectionState) {
        tracing::debug!(connection_id, from = %from, to = %to, "connection state changed");
    }

    fn connected(&self, connection_id: &str) {
        tracing::info!(connection_id, "connection established");
    }

    fn connection_failed(&self, notice: &FailureNotice) {
        match notice.severity {
            ErrorSeverity::Error | ErrorSeverity::Critical => tracing::error!(
                connection_id = %notice.connection_id,
                state = %notice.state,
                reason = ?notice.reason,
                network = notice.network,
                error = %notice.message,
                "connection failed"
            ),
            ErrorSeverity::Info | ErrorSeverity::Warning => tracing::warn!(
                connection_id = %notice.connection_id,
                state = %notice.state,
                reason = ?notice.reason,
                network = notice.network,
                error = %notice.message,
                "connection failed"
            ),
        }
    }

    fn device_code(&self, connection_id: &str, info: &DeviceCodeInfo) {
        // The device code itself is a bearer secret
        tracing::info!(
            connection_id,
            user_code = %info.user_code,
            verification_uri = %info.verification_uri,
            expires_in_secs = info.expires_in_secs,
            "sign-in required: enter the code at the verification page"
        );
    }

    fn provider_message(&self, connection_id: &str, message: &serde_json::Value) {
        tracing::trace!(connection_id, %message, "provider message");
    }
}
