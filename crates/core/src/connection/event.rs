//! Machine inputs and outputs
//!
//! External callers send [`ConnectionEvent`]s. Asynchronous steps report back
//! as [`Completion`]s tagged with the generation they were started in. The
//! machine answers with [`Effect`]s for the driver to execute.

use std::fmt;
use std::sync::Arc;

use workbridge_domain::{ConnectionConfig, ConnectionError, ExpiryValue};

use super::notifier::FailureNotice;
use super::ports::{WorkClient, WorkItemsProvider};
use super::strategy::TenantSelection;

/// Events accepted from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connect { config: ConnectionConfig, force_interactive: bool },
    Disconnect,
    Reset,
    Retry,
    ConnectionFailed { reason: Option<String> },
    TokenExpired,
    RefreshAuth,
}

impl ConnectionEvent {
    #[must_use]
    pub fn connect(config: ConnectionConfig) -> Self {
        Self::Connect { config, force_interactive: false }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::Reset => "RESET",
            Self::Retry => "RETRY",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::RefreshAuth => "REFRESH_AUTH",
        }
    }
}

/// Token produced by an auth or refresh step, expiry not yet normalized
#[derive(Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_at: Option<ExpiryValue>,
}

impl TokenGrant {
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_at: Option<ExpiryValue>) -> Self {
        Self { access_token: access_token.into(), expires_at }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("token_len", &self.access_token.len())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Asynchronous step requested by a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    AuthenticatePat,
    CheckCachedToken,
    InteractiveAuth { force_interactive: bool },
    CreateClient,
    CreateProvider,
    RefreshToken,
}

impl Task {
    /// Completion reporting `error` for this task.
    #[must_use]
    pub fn failed(self, error: ConnectionError) -> Completion {
        match self {
            Self::AuthenticatePat => Completion::PatAuthenticated(Err(error)),
            Self::CheckCachedToken => Completion::CachedTokenChecked { tenant: None, result: Err(error) },
            Self::InteractiveAuth { .. } => {
                Completion::InteractiveAuthenticated { tenant: None, result: Err(error) }
            }
            Self::CreateClient => Completion::ClientCreated(Err(error)),
            Self::CreateProvider => Completion::ProviderCreated(Err(error)),
            Self::RefreshToken => Completion::TokenRefreshed(Err(error)),
        }
    }
}

/// Settled result of a [`Task`]
///
/// Entra steps also report the tenant they ran against so later steps of the
/// same connect cycle reuse it instead of discovering it again.
#[derive(Clone)]
pub enum Completion {
    PatAuthenticated(Result<String, ConnectionError>),
    CachedTokenChecked {
        tenant: Option<TenantSelection>,
        result: Result<Option<TokenGrant>, ConnectionError>,
    },
    InteractiveAuthenticated {
        tenant: Option<TenantSelection>,
        result: Result<TokenGrant, ConnectionError>,
    },
    ClientCreated(Result<Arc<dyn WorkClient>, ConnectionError>),
    ProviderCreated(Result<Arc<dyn WorkItemsProvider>, ConnectionError>),
    TokenRefreshed(Result<TokenGrant, ConnectionError>),
}

impl Completion {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PatAuthenticated(_) => "pat_authenticated",
            Self::CachedTokenChecked { .. } => "cached_token_checked",
            Self::InteractiveAuthenticated { .. } => "interactive_authenticated",
            Self::ClientCreated(_) => "client_created",
            Self::ProviderCreated(_) => "provider_created",
            Self::TokenRefreshed(_) => "token_refreshed",
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        match self {
            Self::PatAuthenticated(r) => r.is_ok(),
            Self::CachedTokenChecked { result, .. } => result.is_ok(),
            Self::InteractiveAuthenticated { result, .. } | Self::TokenRefreshed(result) => result.is_ok(),
            Self::ClientCreated(r) => r.is_ok(),
            Self::ProviderCreated(r) => r.is_ok(),
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Completion::{}(ok={})", self.name(), self.is_ok())
    }
}

/// Everything the machine reacts to
#[derive(Debug, Clone)]
pub enum Input {
    Event(ConnectionEvent),
    Completed { generation: u64, completion: Completion },
}

impl From<ConnectionEvent> for Input {
    fn from(event: ConnectionEvent) -> Self {
        Self::Event(event)
    }
}

/// Side effects requested by a transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Start the task, tagged with the new generation.
    Invoke(Task),
    /// Entry of `connected`: one fire-and-forget provider refresh.
    InitialRefresh { query: String },
    NotifyConnected,
    NotifyFailure(FailureNotice),
}
