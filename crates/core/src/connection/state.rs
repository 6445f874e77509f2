//! Connection states and the machine-owned context

use std::fmt;
use std::sync::Arc;

use workbridge_domain::{AuthMethod, ConnectionConfig};

use super::ports::{WorkClient, WorkItemsProvider};
use super::strategy::TenantSelection;

/// Sub-states of the Entra branch of `authenticating`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntraPhase {
    CheckingExistingToken,
    InteractiveAuth,
}

/// Branch taken inside `authenticating`, selected by the auth method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthPhase {
    Pat,
    Entra(EntraPhase),
}

/// Why a token refresh was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTrigger {
    TokenExpired,
    Requested,
}

/// Lifecycle state of one connection
///
/// Initial state is `Disconnected`; there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Authenticating(AuthPhase),
    CreatingClient,
    CreatingProvider,
    Connected,
    AuthFailed,
    ClientFailed,
    ProviderFailed,
    ConnectionError,
    TokenRefresh(RefreshTrigger),
}

impl ConnectionState {
    /// Dotted state path, e.g. `authenticating.entra_auth.interactive_auth`.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Authenticating(AuthPhase::Pat) => "authenticating.pat_auth",
            Self::Authenticating(AuthPhase::Entra(EntraPhase::CheckingExistingToken)) => {
                "authenticating.entra_auth.checking_existing_token"
            }
            Self::Authenticating(AuthPhase::Entra(EntraPhase::InteractiveAuth)) => {
                "authenticating.entra_auth.interactive_auth"
            }
            Self::CreatingClient => "creating_client",
            Self::CreatingProvider => "creating_provider",
            Self::Connected => "connected",
            Self::AuthFailed => "auth_failed",
            Self::ClientFailed => "client_failed",
            Self::ProviderFailed => "provider_failed",
            Self::ConnectionError => "connection_error",
            Self::TokenRefresh(_) => "token_refresh",
        }
    }

    /// Top-level state name without sub-states.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticating(_) => "authenticating",
            other => other.path(),
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthFailed | Self::ClientFailed | Self::ProviderFailed | Self::ConnectionError
        )
    }

    /// States that own an in-flight asynchronous step.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::Authenticating(_)
                | Self::CreatingClient
                | Self::CreatingProvider
                | Self::TokenRefresh(_)
        )
    }

    /// True when `self` equals `other` or is one of its sub-states.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let own = self.path();
        own == path || own.strip_prefix(path).is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Machine-owned context, mutated only by transition actions
#[derive(Clone, Default)]
pub struct ConnectionContext {
    pub connection_id: String,
    pub config: ConnectionConfig,
    pub auth_method: AuthMethod,
    pub credential: Option<String>,
    pub access_token: Option<String>,
    /// Always normalized epoch milliseconds.
    pub access_token_expires_at: Option<i64>,
    pub is_connected: bool,
    pub retry_count: u32,
    pub refresh_failure_count: u32,
    pub last_refresh_failure: Option<i64>,
    /// Earliest epoch-ms at which a new refresh may be attempted.
    pub refresh_backoff_until: Option<i64>,
    pub reauth_in_progress: bool,
    pub force_interactive: bool,
    pub last_error: Option<String>,
    /// Entra tenant selected once per connect cycle.
    pub tenant: Option<TenantSelection>,
    pub client: Option<Arc<dyn WorkClient>>,
    pub provider: Option<Arc<dyn WorkItemsProvider>>,
}

impl ConnectionContext {
    #[must_use]
    pub fn new(connection_id: impl Into<String>) -> Self {
        let connection_id = connection_id.into();
        Self {
            config: ConnectionConfig::new(connection_id.clone(), AuthMethod::default()),
            connection_id,
            ..Self::default()
        }
    }

    /// Entry action of `disconnected`, also run first on `CONNECT`: drop
    /// credentials, the selected tenant and downstream objects. Counters and
    /// backoff bookkeeping survive.
    pub(crate) fn clear_connection_state(&mut self) {
        self.client = None;
        self.provider = None;
        self.credential = None;
        self.access_token = None;
        self.access_token_expires_at = None;
        self.is_connected = false;
        self.last_error = None;
        self.force_interactive = false;
        self.reauth_in_progress = false;
        self.tenant = None;
    }

    /// `RESET`: zero every counter and the backoff window.
    pub(crate) fn reset_counters(&mut self) {
        self.retry_count = 0;
        self.refresh_failure_count = 0;
        self.last_refresh_failure = None;
        self.refresh_backoff_until = None;
        self.reauth_in_progress = false;
        self.last_error = None;
        self.force_interactive = false;
        self.access_token_expires_at = None;
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("connection_id", &self.connection_id)
            .field("auth_method", &self.auth_method)
            .field("has_credential", &self.credential.is_some())
            .field("has_access_token", &self.access_token.is_some())
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("is_connected", &self.is_connected)
            .field("retry_count", &self.retry_count)
            .field("refresh_failure_count", &self.refresh_failure_count)
            .field("refresh_backoff_until", &self.refresh_backoff_until)
            .field("reauth_in_progress", &self.reauth_in_progress)
            .field("force_interactive", &self.force_interactive)
            .field("last_error", &self.last_error)
            .field("tenant", &self.tenant)
            .field("has_client", &self.client.is_some())
            .field("has_provider", &self.provider.is_some())
            .finish()
    }
}

/// State, context and generation published after every transition
#[derive(Debug, Clone, Default)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub context: ConnectionContext,
    /// Bumped on every state change. Completions carrying an older
    /// generation are discarded.
    pub generation: u64,
}

impl ConnectionSnapshot {
    #[must_use]
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            context: ConnectionContext::new(connection_id),
            generation: 0,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.context.is_connected
    }
}
