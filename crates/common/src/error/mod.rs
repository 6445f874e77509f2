//! Error classification
//!
//! **`ErrorClassification`** is a standard interface for classifying errors
//! by retryability, severity and criticality. Every error type that reaches
//! a notifier or a log line implements it.
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Discovery inconclusive |
//! | **Warning** | Degraded but recoverable | Network blips, refresh failures |
//! | **Error** | Needs user action | Bad configuration, rejected credentials |
//! | **Critical** | Invariant broken | Internal errors |
//!
//! ## Example
//!
//! ```rust,ignore
//! use workbridge_common::error::{ErrorClassification, ErrorSeverity};
//! use workbridge_domain::ConnectionError;
//!
//! let err = ConnectionError::Network("connection reset".into());
//! assert!(err.is_retryable());
//! assert_eq!(err.severity(), ErrorSeverity::Warning);
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use workbridge_domain::ConnectionError;

/// Standard interface for error classification
pub trait ErrorClassification {
    /// Transient failures that may succeed when attempted again.
    fn is_retryable(&self) -> bool;

    /// Used for monitoring and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Internal invariant violations and other integrity problems.
    fn is_critical(&self) -> bool;

    /// Suggested retry delay, when the failure carries one.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl ErrorClassification for ConnectionError {
    fn is_retryable(&self) -> bool {
        if self.is_network() {
            return true;
        }
        matches!(
            self,
            Self::ClientConstructionFailure(_)
                | Self::ProviderConstructionFailure(_)
                | Self::RefreshFailure(_)
                | Self::GenericConnectionError(_)
        )
    }

    fn severity(&self) -> ErrorSeverity {
        if self.is_network() {
            return ErrorSeverity::Warning;
        }
        match self {
            Self::DiscoveryInconclusive(_) => ErrorSeverity::Info,
            Self::RefreshFailure(_) | Self::GenericConnectionError(_) => ErrorSeverity::Warning,
            Self::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
