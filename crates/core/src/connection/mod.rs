//! Connection lifecycle
//!
//! One state machine per connection. The machine itself is the pure
//! [`machine::transition`] function; [`driver`] runs it on a tokio task and
//! executes the effects it asks for, [`manager`] keeps one driver per
//! connection id.

pub mod client;
pub mod driver;
pub mod event;
pub mod guards;
pub mod machine;
pub mod manager;
pub mod notifier;
pub mod organization;
pub mod ports;
pub mod state;
pub mod strategy;
