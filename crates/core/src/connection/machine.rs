//! Pure connection state machine
//!
//! `transition` maps `(snapshot, input)` to the next snapshot plus the effects
//! the driver must execute. No I/O and no clock reads happen here; "now" and
//! the token validity predicate come in through [`TransitionEnv`].
//!
//! Every state entry bumps the snapshot generation. A [`Completion`] is only
//! applied when its generation matches the current one, so results of steps
//! abandoned by `DISCONNECT`/`RESET`/`CONNECT` are dropped.

use tracing::{debug, warn};
use workbridge_common::resilience::RefreshBackoff;
use workbridge_domain::constants::DEFAULT_INITIAL_QUERY;
use workbridge_domain::{normalize_expiry, ConnectionError};

use super::event::{Completion, ConnectionEvent, Effect, Input, Task, TokenGrant};
use super::guards::{
    can_retry, has_valid_token, is_entra_auth, should_force_interactive_auth, TokenValidator,
};
use super::notifier::{FailureNotice, ReminderReason};
use super::state::{
    AuthPhase, ConnectionContext, ConnectionSnapshot, ConnectionState, EntraPhase,
    RefreshTrigger,
};
use super::strategy::TenantSelection;

/// Inputs to a transition that do not live in the snapshot
#[derive(Clone, Copy)]
pub struct TransitionEnv<'a> {
    pub now_ms: i64,
    pub validator: &'a dyn TokenValidator,
    pub backoff: RefreshBackoff,
}

impl<'a> TransitionEnv<'a> {
    #[must_use]
    pub fn new(now_ms: i64, validator: &'a dyn TokenValidator) -> Self {
        Self { now_ms, validator, backoff: RefreshBackoff::default() }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: RefreshBackoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Next snapshot and the effects requested on the way there
#[derive(Debug, Clone)]
pub struct Transition {
    pub snapshot: ConnectionSnapshot,
    pub effects: Vec<Effect>,
}

impl Transition {
    /// The task to start for the new generation, if any.
    #[must_use]
    pub fn invoked_task(&self) -> Option<Task> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::Invoke(task) => Some(*task),
            _ => None,
        })
    }
}

/// Apply one input to a snapshot.
#[must_use]
pub fn transition(
    snapshot: ConnectionSnapshot,
    input: Input,
    env: &TransitionEnv<'_>,
) -> Transition {
    let mut machine = Machine {
        state: snapshot.state,
        ctx: snapshot.context,
        generation: snapshot.generation,
        effects: Vec::new(),
    };

    match input {
        Input::Event(event) => machine.on_event(event),
        Input::Completed { generation, completion } if generation == machine.generation => {
            machine.on_completion(completion, env);
        }
        Input::Completed { generation, completion } => {
            debug!(
                connection_id = %machine.ctx.connection_id,
                stale_generation = generation,
                current_generation = machine.generation,
                completion = completion.name(),
                "discarding stale completion"
            );
        }
    }

    Transition {
        snapshot: ConnectionSnapshot {
            state: machine.state,
            context: machine.ctx,
            generation: machine.generation,
        },
        effects: machine.effects,
    }
}

struct Machine {
    state: ConnectionState,
    ctx: ConnectionContext,
    generation: u64,
    effects: Vec<Effect>,
}

impl Machine {
    fn on_event(&mut self, event: ConnectionEvent) {
        let name = event.name();
        match (self.state, event) {
            (state, ConnectionEvent::Connect { config, force_interactive })
                if state == ConnectionState::Disconnected || state.is_failure() =>
            {
                // Nothing from a previous cycle may leak into this one
                self.ctx.clear_connection_state();
                self.ctx.connection_id = config.id.clone();
                self.ctx.auth_method = config.auth_method;
                self.ctx.config = config;
                self.ctx.force_interactive = force_interactive;
                self.ctx.retry_count = 0;
                self.enter_authenticating();
            }
            (ConnectionState::Disconnected, ConnectionEvent::Disconnect) => self.ignore(name),
            (_, ConnectionEvent::Disconnect) => self.enter(ConnectionState::Disconnected),
            (_, ConnectionEvent::Reset) => {
                self.ctx.reset_counters();
                self.enter(ConnectionState::Disconnected);
            }
            (state, ConnectionEvent::Retry) if state.is_failure() => {
                if !can_retry(&self.ctx) {
                    debug!(
                        connection_id = %self.ctx.connection_id,
                        retry_count = self.ctx.retry_count,
                        "retry limit reached, CONNECT or RESET required"
                    );
                    return;
                }
                match state {
                    ConnectionState::ClientFailed => self.enter(ConnectionState::CreatingClient),
                    ConnectionState::ProviderFailed => {
                        self.enter(ConnectionState::CreatingProvider);
                    }
                    _ => self.enter_authenticating(),
                }
            }
            (ConnectionState::Connected, ConnectionEvent::ConnectionFailed { reason }) => {
                let error = ConnectionError::GenericConnectionError(
                    reason.unwrap_or_else(|| "connection lost".to_string()),
                );
                self.fail(ConnectionState::ConnectionError, &error, None);
            }
            (ConnectionState::Connected, ConnectionEvent::TokenExpired) => {
                self.enter(ConnectionState::TokenRefresh(RefreshTrigger::TokenExpired));
            }
            (ConnectionState::Connected, ConnectionEvent::RefreshAuth) => {
                self.enter(ConnectionState::TokenRefresh(RefreshTrigger::Requested));
            }
            _ => self.ignore(name),
        }
    }

    fn on_completion(&mut self, completion: Completion, env: &TransitionEnv<'_>) {
        match (self.state, completion) {
            (ConnectionState::Authenticating(AuthPhase::Pat), Completion::PatAuthenticated(result)) => {
                match result {
                    Ok(pat) => {
                        self.ctx.credential = Some(pat);
                        self.enter(ConnectionState::CreatingClient);
                    }
                    Err(error) => {
                        self.bump_retry();
                        self.fail(ConnectionState::AuthFailed, &error, Some(ReminderReason::AuthFailed));
                    }
                }
            }
            (
                ConnectionState::Authenticating(AuthPhase::Entra(EntraPhase::CheckingExistingToken)),
                Completion::CachedTokenChecked { tenant, result },
            ) => {
                self.remember_tenant(tenant);
                match result {
                    Ok(Some(grant)) => {
                        let expires_at = normalize_expiry(grant.expires_at.as_ref());
                        if has_valid_token(
                            Some(grant.access_token.as_str()),
                            expires_at,
                            env.now_ms,
                            env.validator,
                        ) {
                            debug!(
                                connection_id = %self.ctx.connection_id,
                                token_len = grant.access_token.len(),
                                "cached token is valid"
                            );
                            self.store_token(grant);
                            self.enter(ConnectionState::CreatingClient);
                        } else {
                            debug!(connection_id = %self.ctx.connection_id, "cached token expired or near expiry");
                            self.enter_interactive();
                        }
                    }
                    Ok(None) => self.enter_interactive(),
                    Err(error) => {
                        debug!(connection_id = %self.ctx.connection_id, %error, "cached token check failed");
                        self.enter_interactive();
                    }
                }
            }
            (
                ConnectionState::Authenticating(AuthPhase::Entra(EntraPhase::InteractiveAuth)),
                Completion::InteractiveAuthenticated { tenant, result },
            ) => {
                self.remember_tenant(tenant);
                self.ctx.reauth_in_progress = false;
                self.ctx.force_interactive = false;
                match result {
                    Ok(grant) => {
                        self.store_token(grant);
                        self.enter(ConnectionState::CreatingClient);
                    }
                    Err(error) => {
                        self.bump_retry();
                        self.fail(ConnectionState::AuthFailed, &error, Some(ReminderReason::AuthFailed));
                    }
                }
            }
            (ConnectionState::CreatingClient, Completion::ClientCreated(result)) => match result {
                Ok(client) => {
                    self.ctx.client = Some(client);
                    self.enter(ConnectionState::CreatingProvider);
                }
                Err(error) => {
                    self.bump_retry();
                    self.fail(ConnectionState::ClientFailed, &error, None);
                }
            },
            (ConnectionState::CreatingProvider, Completion::ProviderCreated(result)) => match result {
                Ok(provider) => {
                    self.ctx.provider = Some(provider);
                    self.ctx.retry_count = 0;
                    self.ctx.last_error = None;
                    self.enter(ConnectionState::Connected);
                }
                Err(error) => {
                    self.bump_retry();
                    self.fail(ConnectionState::ProviderFailed, &error, None);
                }
            },
            (ConnectionState::TokenRefresh(trigger), Completion::TokenRefreshed(result)) => match result {
                Ok(grant) => {
                    self.store_token(grant);
                    self.ctx.refresh_failure_count = 0;
                    self.ctx.last_refresh_failure = None;
                    self.ctx.refresh_backoff_until = None;
                    self.ctx.last_error = None;
                    self.enter(ConnectionState::Connected);
                }
                Err(error) => {
                    let failures = self.ctx.refresh_failure_count;
                    self.ctx.refresh_backoff_until =
                        Some(env.backoff.next_allowed_at_ms(env.now_ms, failures));
                    self.ctx.refresh_failure_count = failures.saturating_add(1);
                    self.ctx.last_refresh_failure = Some(env.now_ms);
                    let reason = match trigger {
                        RefreshTrigger::TokenExpired => ReminderReason::TokenExpired,
                        RefreshTrigger::Requested => ReminderReason::RefreshFailed,
                    };
                    self.fail(ConnectionState::AuthFailed, &error, Some(reason));
                }
            },
            (state, completion) => {
                warn!(
                    connection_id = %self.ctx.connection_id,
                    state = %state,
                    completion = completion.name(),
                    "completion does not belong to the current state"
                );
            }
        }
    }

    fn ignore(&self, event: &str) {
        debug!(
            connection_id = %self.ctx.connection_id,
            state = %self.state,
            event,
            "event not accepted in current state"
        );
    }

    fn bump_retry(&mut self) {
        self.ctx.retry_count = self.ctx.retry_count.saturating_add(1);
    }

    fn store_token(&mut self, grant: TokenGrant) {
        self.ctx.access_token_expires_at = normalize_expiry(grant.expires_at.as_ref());
        self.ctx.credential = Some(grant.access_token.clone());
        self.ctx.access_token = Some(grant.access_token);
    }

    /// Resolve the `authenticating` branch from the auth method.
    fn enter_authenticating(&mut self) {
        if !is_entra_auth(&self.ctx) {
            self.enter(ConnectionState::Authenticating(AuthPhase::Pat));
            return;
        }
        if should_force_interactive_auth(&self.ctx) {
            self.enter_interactive();
        } else {
            self.enter(ConnectionState::Authenticating(AuthPhase::Entra(
                EntraPhase::CheckingExistingToken,
            )));
        }
    }

    fn enter_interactive(&mut self) {
        self.enter(ConnectionState::Authenticating(AuthPhase::Entra(EntraPhase::InteractiveAuth)));
    }

    fn fail(&mut self, state: ConnectionState, error: &ConnectionError, reason: Option<ReminderReason>) {
        debug_assert!(state.is_failure());
        self.ctx.last_error = Some(error.to_string());
        self.enter(state);
        let reason = if state == ConnectionState::AuthFailed { reason } else { None };
        self.effects.push(Effect::NotifyFailure(FailureNotice::new(
            self.ctx.connection_id.clone(),
            state,
            reason,
            error,
        )));
    }

    fn remember_tenant(&mut self, tenant: Option<TenantSelection>) {
        if tenant.is_some() {
            self.ctx.tenant = tenant;
        }
    }

    /// Move to `target`, bump the generation and run its entry actions.
    fn enter(&mut self, target: ConnectionState) {
        let from = self.state;
        self.state = target;
        self.generation = self.generation.wrapping_add(1);
        debug!(
            connection_id = %self.ctx.connection_id,
            from = %from,
            to = %target,
            generation = self.generation,
            "state transition"
        );

        if target != ConnectionState::Connected {
            self.ctx.is_connected = false;
        }

        match target {
            ConnectionState::Disconnected => self.ctx.clear_connection_state(),
            ConnectionState::Authenticating(AuthPhase::Pat) => {
                self.effects.push(Effect::Invoke(Task::AuthenticatePat));
            }
            ConnectionState::Authenticating(AuthPhase::Entra(EntraPhase::CheckingExistingToken)) => {
                self.effects.push(Effect::Invoke(Task::CheckCachedToken));
            }
            ConnectionState::Authenticating(AuthPhase::Entra(EntraPhase::InteractiveAuth)) => {
                self.ctx.reauth_in_progress = true;
                self.effects.push(Effect::Invoke(Task::InteractiveAuth {
                    force_interactive: self.ctx.force_interactive,
                }));
            }
            ConnectionState::CreatingClient => self.effects.push(Effect::Invoke(Task::CreateClient)),
            ConnectionState::CreatingProvider => {
                self.effects.push(Effect::Invoke(Task::CreateProvider));
            }
            ConnectionState::Connected => {
                self.ctx.is_connected = true;
                self.effects.push(Effect::NotifyConnected);
                self.effects
                    .push(Effect::InitialRefresh { query: DEFAULT_INITIAL_QUERY.to_string() });
            }
            ConnectionState::TokenRefresh(_) => self.effects.push(Effect::Invoke(Task::RefreshToken)),
            ConnectionState::AuthFailed
            | ConnectionState::ClientFailed
            | ConnectionState::ProviderFailed
            | ConnectionState::ConnectionError => {}
        }
    }
}
