//! # Workbridge Domain
//!
//! Domain types shared by every Workbridge crate.
//!
//! This crate contains:
//! - Connection configuration (`ConnectionConfig`, `AuthMethod`)
//! - Application settings loaded from env/files (`WorkbridgeSettings`)
//! - The connection error taxonomy and Result alias
//! - Domain constants (client id, scopes, tenant placeholder, backoff limits)
//! - Token expiry normalization
//!
//! ## Architecture
//! - No dependencies on other Workbridge crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
pub use utils::expiry::{normalize_expiry, ExpiryValue};
