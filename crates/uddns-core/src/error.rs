//! Error types for uddns
//!
//! One enum carries the whole taxonomy. The loop treats every variant as
//! recoverable; the grouping only decides what gets committed and logged.

use crate::traits::IpFamily;
use thiserror::Error;

/// Result type alias for uddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for uddns
#[derive(Error, Debug)]
pub enum Error {
    /// No address of either family could be obtained this cycle
    #[error("Address resolution failed: {0}")]
    Resolution(String),

    /// Provider handed over something that is not an address of the claimed family
    #[error("Invalid {family} address: {value:?}")]
    Validation {
        /// Family the value was supposed to belong to
        family: IpFamily,
        /// The offending value
        value: String,
    },

    /// Existing records could not be queried
    #[error("{family} record lookup failed: {message}")]
    Lookup {
        /// Family whose record was being looked up
        family: IpFamily,
        /// Error message
        message: String,
    },

    /// The create/update call itself failed
    #[error("{family} record update failed: {message}")]
    RemoteUpdate {
        /// Family whose record was being written
        family: IpFamily,
        /// Error message
        message: String,
    },

    /// Notification channel failure
    #[error("Notification failed: {0}")]
    Notify(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Backend-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Backend name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a validation error for a value that failed to parse as `family`
    pub fn validation(family: IpFamily, value: impl Into<String>) -> Self {
        Self::Validation {
            family,
            value: value.into(),
        }
    }

    /// Create a record lookup error
    pub fn lookup(family: IpFamily, msg: impl Into<String>) -> Self {
        Self::Lookup {
            family,
            message: msg.into(),
        }
    }

    /// Create a remote update error
    pub fn remote_update(family: IpFamily, msg: impl Into<String>) -> Self {
        Self::RemoteUpdate {
            family,
            message: msg.into(),
        }
    }

    /// Create a notification error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a backend-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// True for the three kinds a `RecordUpdater` reports
    pub fn is_update_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Lookup { .. } | Self::RemoteUpdate { .. }
        )
    }

    /// The address family this error is tied to, if any
    pub fn family(&self) -> Option<IpFamily> {
        match self {
            Self::Validation { family, .. }
            | Self::Lookup { family, .. }
            | Self::RemoteUpdate { family, .. } => Some(*family),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_errors_carry_their_family() {
        let err = Error::lookup(IpFamily::V6, "zone missing");
        assert!(err.is_update_error());
        assert_eq!(err.family(), Some(IpFamily::V6));
        assert_eq!(err.to_string(), "IPv6 record lookup failed: zone missing");

        let err = Error::validation(IpFamily::V4, "300.1.1.1");
        assert!(err.is_update_error());
        assert_eq!(err.to_string(), "Invalid IPv4 address: \"300.1.1.1\"");
    }

    #[test]
    fn resolution_and_notify_are_not_update_errors() {
        assert!(!Error::resolution("no route").is_update_error());
        assert!(!Error::notify("telegram down").is_update_error());
        assert_eq!(Error::notify("x").family(), None);
    }
}
