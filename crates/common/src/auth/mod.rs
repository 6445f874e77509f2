//! OAuth 2.0 building blocks for the Entra device-code and refresh grants
//!
//! Only wire types live here; the HTTP exchanges are implemented by
//! `workbridge-infra`.

pub mod types;

pub use types::{DeviceCodeInfo, DeviceCodeResponse, OAuthError, OAuthErrorKind, TokenResponse, TokenSet};
