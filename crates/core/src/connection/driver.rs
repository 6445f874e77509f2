//! Async driver for one connection machine
//!
//! Each [`ConnectionHandle`] owns an actor task that serializes every input
//! through [`transition`] and executes the resulting effects. Invoked steps run
//! on their own tasks and report back through the actor's inbox, tagged with
//! the generation they were started in. Leaving a state cancels its step.
//!
//! ```text
//! host ── ConnectionEvent ──► inbox ──► transition() ──► effects
//!                               ▲                          │
//!                               └── Completion{gen} ◄── task (select! on cancel)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use workbridge_common::resilience::{Clock, RefreshBackoff, SystemClock};
use workbridge_domain::{AuthMethod, ConnectionError, Result};

use super::client::ClientRequest;
use super::event::{Completion, ConnectionEvent, Effect, Input, Task};
use super::guards::{ExpiryMarginValidator, TokenValidator};
use super::machine::{transition, Transition, TransitionEnv};
use super::notifier::TracingNotifier;
use super::ports::{
    ClientFactory, ConnectionNotifier, DeviceCodeCallback, IdentityProviderFactory,
    ProviderEmitter, ProviderFactory, SecretStore, TenantResolver, WorkClient,
    WorkItemsProvider,
};
use super::state::{ConnectionContext, ConnectionSnapshot, ConnectionState};
use super::strategy::{AuthenticationStrategy, EntraOptions, EntraStrategy, PatStrategy};

/// Collaborators shared by every connection of a process
pub struct ConnectionServices {
    secrets: Arc<dyn SecretStore>,
    identity: Arc<dyn IdentityProviderFactory>,
    tenants: Arc<dyn TenantResolver>,
    clients: Arc<dyn ClientFactory>,
    providers: Arc<dyn ProviderFactory>,
    notifier: Arc<dyn ConnectionNotifier>,
    validator: Arc<dyn TokenValidator>,
    clock: Arc<dyn Clock>,
    entra: EntraOptions,
    backoff: RefreshBackoff,
}

impl ConnectionServices {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        identity: Arc<dyn IdentityProviderFactory>,
        tenants: Arc<dyn TenantResolver>,
        clients: Arc<dyn ClientFactory>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            secrets,
            identity,
            tenants,
            clients,
            providers,
            notifier: Arc::new(TracingNotifier),
            validator: Arc::new(ExpiryMarginValidator::default()),
            clock: Arc::new(SystemClock),
            entra: EntraOptions::default(),
            backoff: RefreshBackoff::default(),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ConnectionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn TokenValidator>) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_entra_options(mut self, entra: EntraOptions) -> Self {
        self.entra = entra;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: RefreshBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn notifier(&self) -> &Arc<dyn ConnectionNotifier> {
        &self.notifier
    }

    /// Build the strategy for one connection.
    pub fn strategy(&self, method: AuthMethod, connection_id: &str) -> AuthenticationStrategy {
        match method {
            AuthMethod::Pat => AuthenticationStrategy::Pat(PatStrategy::new(Arc::clone(&self.secrets))),
            AuthMethod::Entra => {
                let notifier = Arc::clone(&self.notifier);
                let id = connection_id.to_string();
                let callback: DeviceCodeCallback = Arc::new(move |info| notifier.device_code(&id, info));
                AuthenticationStrategy::Entra(EntraStrategy::new(
                    Arc::clone(&self.identity),
                    Arc::clone(&self.tenants),
                    self.entra.clone(),
                    callback,
                ))
            }
        }
    }

    async fn create_client(&self, ctx: &ConnectionContext) -> Result<Arc<dyn WorkClient>> {
        let request = ClientRequest::from_context(ctx);
        let validation = self.clients.validate_client_config(&request);
        if !validation.is_valid {
            warn!(connection_id = %ctx.connection_id, errors = ?validation.errors, "client configuration invalid");
            return Err(ConnectionError::ConfigInvalid(validation.errors));
        }
        let Some(config) = validation.config else {
            return Err(ConnectionError::ConfigInvalid(vec![
                "validation returned no configuration".to_string(),
            ]));
        };

        let client = self.clients.create_client(&request, &config).await.map_err(|error| match error {
            ConnectionError::ConfigInvalid(_) | ConnectionError::ClientConstructionFailure(_) => error,
            other => ConnectionError::ClientConstructionFailure(other.to_string()),
        })?;
        info!(
            connection_id = %ctx.connection_id,
            organization = %config.organization,
            project = %config.project,
            auth_type = config.credential.auth_type(),
            "client created"
        );
        Ok(client)
    }

    async fn create_provider(&self, ctx: &ConnectionContext) -> Result<Arc<dyn WorkItemsProvider>> {
        let client = ctx.client.clone().ok_or_else(|| {
            ConnectionError::ProviderConstructionFailure(
                "No client available for provider creation".to_string(),
            )
        })?;

        let notifier = Arc::clone(&self.notifier);
        let id = ctx.connection_id.clone();
        let emit: ProviderEmitter = Arc::new(move |message| notifier.provider_message(&id, &message));

        let provider = self
            .providers
            .create_provider(&ctx.connection_id, client, emit)
            .await
            .map_err(|error| match error {
                ConnectionError::ProviderConstructionFailure(_) => error,
                other => ConnectionError::ProviderConstructionFailure(other.to_string()),
            })?;
        info!(connection_id = %ctx.connection_id, "provider created");
        Ok(provider)
    }
}

/// Handle to one running connection machine
///
/// Clones share the same actor. The actor stops on [`shutdown`](Self::shutdown)
/// or once every handle is dropped.
#[derive(Clone)]
pub struct ConnectionHandle {
    connection_id: String,
    inbox: mpsc::UnboundedSender<Input>,
    snapshots: watch::Receiver<ConnectionSnapshot>,
    shutdown: CancellationToken,
}

impl ConnectionHandle {
    /// Start the actor in `disconnected`. Must be called inside a tokio runtime.
    pub fn spawn(connection_id: impl Into<String>, services: Arc<ConnectionServices>) -> Self {
        let connection_id = connection_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = ConnectionSnapshot::new(connection_id.clone());
        let (publisher, snapshots) = watch::channel(initial.clone());
        let shutdown = CancellationToken::new();

        let actor = ConnectionActor {
            connection_id: connection_id.clone(),
            services,
            snapshot: initial,
            publisher,
            inbox: rx,
            outbox: tx.downgrade(),
            in_flight: None,
            strategy: None,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(actor.run());
        debug!(connection_id = %connection_id, "connection actor started");

        Self { connection_id, inbox: tx, snapshots, shutdown }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn send(&self, event: ConnectionEvent) -> Result<()> {
        self.inbox.send(Input::Event(event)).map_err(|_| {
            ConnectionError::Internal(format!("connection {} is shut down", self.connection_id))
        })
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshots.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> Result<ConnectionSnapshot>
    where
        F: FnMut(&ConnectionSnapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let outcome = match tokio::time::timeout(timeout, rx.wait_for(predicate)).await {
            Ok(Ok(snapshot)) => Ok(snapshot.clone()),
            Ok(Err(_)) => Err(ConnectionError::Internal(format!(
                "connection {} stopped while waiting",
                self.connection_id
            ))),
            Err(_) => Err(ConnectionError::Internal(format!(
                "timed out waiting for connection {} (state {})",
                self.connection_id,
                self.state()
            ))),
        };
        outcome
    }

    /// Stop the actor and cancel the in-flight step.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled() || self.inbox.is_closed()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("connection_id", &self.connection_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct ConnectionActor {
    connection_id: String,
    services: Arc<ConnectionServices>,
    snapshot: ConnectionSnapshot,
    publisher: watch::Sender<ConnectionSnapshot>,
    inbox: mpsc::UnboundedReceiver<Input>,
    outbox: mpsc::WeakUnboundedSender<Input>,
    in_flight: Option<CancellationToken>,
    strategy: Option<AuthenticationStrategy>,
    shutdown: CancellationToken,
}

impl ConnectionActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                input = self.inbox.recv() => match input {
                    Some(input) => self.handle(input),
                    None => break,
                },
            }
        }

        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        debug!(connection_id = %self.connection_id, "connection actor stopped");
    }

    fn handle(&mut self, input: Input) {
        let env = TransitionEnv::new(self.services.clock.now_millis(), self.services.validator.as_ref())
            .with_backoff(self.services.backoff);
        let from = self.snapshot.state;
        let from_generation = self.snapshot.generation;

        let Transition { snapshot, effects } =
            transition(std::mem::take(&mut self.snapshot), input, &env);
        self.snapshot = snapshot;

        if self.snapshot.generation != from_generation {
            if let Some(token) = self.in_flight.take() {
                token.cancel();
            }
            self.services.notifier.state_changed(&self.connection_id, from, self.snapshot.state);
        }

        // Notifications land before observers see the new snapshot
        for effect in effects {
            self.apply(effect);
        }
        self.publisher.send_replace(self.snapshot.clone());
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Invoke(task) => self.invoke(task),
            Effect::InitialRefresh { query } => {
                let Some(provider) = self.snapshot.context.provider.clone() else {
                    warn!(connection_id = %self.connection_id, "connected without a provider");
                    return;
                };
                let id = self.connection_id.clone();
                tokio::spawn(async move {
                    if let Err(error) = provider.refresh(&query).await {
                        warn!(connection_id = %id, query = %query, %error, "initial refresh failed");
                    }
                });
            }
            Effect::NotifyConnected => self.services.notifier.connected(&self.connection_id),
            Effect::NotifyFailure(notice) => self.services.notifier.connection_failed(&notice),
        }
    }

    fn strategy(&mut self) -> AuthenticationStrategy {
        let method = self.snapshot.context.auth_method;
        match &self.strategy {
            Some(strategy) if strategy.method() == method => strategy.clone(),
            _ => {
                let strategy = self.services.strategy(method, &self.connection_id);
                self.strategy = Some(strategy.clone());
                strategy
            }
        }
    }

    fn invoke(&mut self, task: Task) {
        let cancel = CancellationToken::new();
        self.in_flight = Some(cancel.clone());

        let generation = self.snapshot.generation;
        let ctx = self.snapshot.context.clone();
        let strategy = self.strategy();
        let services = Arc::clone(&self.services);
        let outbox = self.outbox.clone();
        debug!(connection_id = %self.connection_id, ?task, generation, "invoking task");

        tokio::spawn(async move {
            let work = tokio::spawn(execute(task, ctx, services, strategy, cancel.clone()));
            let abort = work.abort_handle();

            let completion = tokio::select! {
                () = cancel.cancelled() => {
                    abort.abort();
                    debug!(?task, generation, "task cancelled");
                    return;
                }
                joined = work => match joined {
                    Ok(completion) => completion,
                    Err(error) => task.failed(ConnectionError::Internal(format!("{task:?} task failed: {error}"))),
                },
            };

            if let Some(inbox) = outbox.upgrade() {
                // A closed inbox means the actor already stopped
                let _ = inbox.send(Input::Completed { generation, completion });
            }
        });
    }
}

async fn execute(
    task: Task,
    ctx: ConnectionContext,
    services: Arc<ConnectionServices>,
    strategy: AuthenticationStrategy,
    cancel: CancellationToken,
) -> Completion {
    let id = ctx.connection_id.as_str();
    match task {
        Task::AuthenticatePat => Completion::PatAuthenticated(strategy.authenticate_pat(id).await),
        Task::CheckCachedToken => {
            let (tenant, result) = strategy.cached_token(id, &ctx.config, ctx.tenant.as_ref()).await;
            Completion::CachedTokenChecked { tenant, result }
        }
        Task::InteractiveAuth { force_interactive } => {
            let (tenant, result) = strategy
                .interactive(id, &ctx.config, ctx.tenant.as_ref(), force_interactive, cancel)
                .await;
            Completion::InteractiveAuthenticated { tenant, result }
        }
        Task::CreateClient => Completion::ClientCreated(services.create_client(&ctx).await),
        Task::CreateProvider => Completion::ProviderCreated(services.create_provider(&ctx).await),
        Task::RefreshToken => Completion::TokenRefreshed(
            strategy.refresh(id, &ctx.config, ctx.tenant.as_ref()).await,
        ),
    }
}
