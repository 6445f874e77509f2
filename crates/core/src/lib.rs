//! # Workbridge Core
//!
//! Connection and authentication lifecycle - no infrastructure dependencies.
//!
//! This crate contains:
//! - The connection state machine as a pure `transition` function
//! - Port interfaces (traits) for every collaborator: secret storage,
//!   identity provider, tenant discovery, client/provider factories, notifier
//! - The `AuthenticationStrategy` variant (PAT | Entra)
//! - The async driver running one machine per connection, and the
//!   multi-connection `ConnectionManager`
//!
//! ## Architecture Principles
//! - Only depends on `workbridge-common` and `workbridge-domain`
//! - No HTTP, keychain or platform code
//! - All external dependencies via traits

pub mod connection;

pub use connection::client::{
    default_client_validation, ClientCredential, ClientRequest, ClientValidation,
    ValidatedClientConfig,
};
pub use connection::driver::{ConnectionHandle, ConnectionServices};
pub use connection::event::{Completion, ConnectionEvent, Effect, Input, Task, TokenGrant};
pub use connection::guards::{ExpiryMarginValidator, TokenValidator};
pub use connection::machine::{transition, Transition, TransitionEnv};
pub use connection::manager::ConnectionManager;
pub use connection::notifier::{FailureNotice, NoticeAction, ReminderReason, TracingNotifier};
pub use connection::organization::{parse_organization, OrganizationHost, OrganizationRef};
pub use connection::ports::{
    AuthenticationResult, ClientFactory, ConnectionNotifier, DeviceCodeCallback,
    IdentityAuthProvider, IdentityProviderFactory, IdentityProviderOptions, ProviderEmitter,
    ProviderFactory, SecretStore, TenantResolver, TokenInfo, WorkClient, WorkItemsProvider,
};
pub use connection::state::{
    AuthPhase, ConnectionContext, ConnectionSnapshot, ConnectionState, EntraPhase,
    RefreshTrigger,
};
pub use connection::strategy::{
    resolve_scopes, AuthenticationStrategy, EntraOptions, EntraStrategy, PatStrategy,
    TenantSelection, TenantSource,
};
