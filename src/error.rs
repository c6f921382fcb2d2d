//! Error types for the ledger sync engine.
//!
//! [`LedgerError`] covers every failure a sync pass, a query or the report
//! listener can hit. Variants are grouped by the collaborator that failed:
//!
//! - [`LedgerError::ConfigError`]: environment and settings problems
//! - [`LedgerError::IndexerError`]: the chain-indexing API (pagination, HTTP)
//! - [`LedgerError::RpcError`]: JSON-RPC reads and the spot price API
//! - [`LedgerError::DecodingError`]: malformed upstream payloads
//! - [`LedgerError::DatabaseError`]: SQLite reads and writes
//! - [`LedgerError::RegistryError`]: the reporter registry task is gone
//! - [`LedgerError::SubscriptionError`]: the report event subscription
//!
//! A sync pass surfaces whichever of these aborted it; nothing is retried
//! internally, the caller decides.
//!
//! # Example
//!
//! ```
//! use oracle_ledger_sync::error::{LedgerError, LedgerResult};
//!
//! fn page_size(raw: u32) -> LedgerResult<u32> {
//!     if raw == 0 {
//!         return Err(LedgerError::config("page size cannot be zero", None));
//!     }
//!     Ok(raw)
//! }
//! # assert!(page_size(0).is_err());
//! ```

use std::fmt;

/// Boxed source error carried by most variants.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias using [`LedgerError`].
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Unified error type for the ledger sync engine.
#[derive(Debug)]
pub enum LedgerError {
    /// Configuration or environment variable errors.
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Chain-indexing API errors.
    ///
    /// Transient by nature: a failed page aborts the pass before anything is
    /// persisted, so retrying from the same cursor is always safe.
    IndexerError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// JSON-RPC provider or price API errors.
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Upstream payload could not be parsed.
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Database operation errors.
    DatabaseError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// The registry updater task stopped accepting commands.
    RegistryError {
        /// Human-readable error message
        message: String,
    },

    /// Report event subscription errors (connect, subscribe, stream end).
    SubscriptionError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Reconnection gave up.
    MaxReconnectAttemptsExceeded {
        /// Number of attempts made
        attempts: u32,
        /// Last error encountered
        last_error: String,
    },
}

impl LedgerError {
    /// Create a new configuration error.
    ///
    /// ```
    /// use oracle_ledger_sync::error::LedgerError;
    ///
    /// let err = LedgerError::config("MORALIS_API_KEY not set", None);
    /// assert!(matches!(err, LedgerError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new indexer error.
    #[must_use]
    pub fn indexer(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::IndexerError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC error.
    #[must_use]
    pub fn rpc(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a new database error.
    ///
    /// ```
    /// use oracle_ledger_sync::error::LedgerError;
    ///
    /// let err = LedgerError::database("Connection failed", None);
    /// assert!(matches!(err, LedgerError::DatabaseError { .. }));
    /// ```
    #[must_use]
    pub fn database(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source,
        }
    }

    /// Create a new registry error.
    #[must_use]
    pub fn registry(message: impl Into<String>) -> Self {
        Self::RegistryError {
            message: message.into(),
        }
    }

    /// Create a new subscription error.
    #[must_use]
    pub fn subscription(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::SubscriptionError {
            message: message.into(),
            source,
        }
    }

    /// Create a max reconnect attempts exceeded error.
    #[must_use]
    pub fn max_reconnect_exceeded(attempts: u32, last_error: impl Into<String>) -> Self {
        Self::MaxReconnectAttemptsExceeded {
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Whether retrying the same operation later can succeed without any
    /// intervention.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::IndexerError { .. }
                | Self::RpcError { .. }
                | Self::DatabaseError { .. }
                | Self::SubscriptionError { .. }
        )
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::IndexerError { message, .. } => write!(f, "Indexer error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::DatabaseError { message, .. } => write!(f, "Database error: {message}"),
            Self::RegistryError { message } => write!(f, "Registry error: {message}"),
            Self::SubscriptionError { message, .. } => {
                write!(f, "Subscription error: {message}")
            }
            Self::MaxReconnectAttemptsExceeded {
                attempts,
                last_error,
            } => write!(
                f,
                "Max reconnection attempts ({attempts}) exceeded. Last error: {last_error}"
            ),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::IndexerError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DecodingError { source, .. }
            | Self::DatabaseError { source, .. }
            | Self::SubscriptionError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::RegistryError { .. } | Self::MaxReconnectAttemptsExceeded { .. } => None,
        }
    }
}

/// The pubsub helpers report through `eyre`; anything arriving that way is a
/// subscription failure.
impl From<eyre::Report> for LedgerError {
    fn from(err: eyre::Report) -> Self {
        Self::SubscriptionError {
            message: err.to_string(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            LedgerError::config("bad", None).to_string(),
            "Configuration error: bad"
        );
        assert_eq!(
            LedgerError::indexer("page failed", None).to_string(),
            "Indexer error: page failed"
        );
        assert_eq!(
            LedgerError::registry("closed").to_string(),
            "Registry error: closed"
        );
        assert_eq!(
            LedgerError::max_reconnect_exceeded(3, "timeout").to_string(),
            "Max reconnection attempts (3) exceeded. Last error: timeout"
        );
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = LedgerError::indexer("page request failed", Some(Box::new(source)));

        assert!(err.source().is_some());
        assert!(LedgerError::registry("gone").source().is_none());
    }

    #[test]
    fn test_transient_classification() {
        assert!(LedgerError::indexer("x", None).is_transient());
        assert!(LedgerError::database("x", None).is_transient());
        assert!(!LedgerError::config("x", None).is_transient());
        assert!(!LedgerError::decoding("x", None).is_transient());
    }

    #[test]
    fn test_from_eyre() {
        let err: LedgerError = eyre::eyre!("stream ended").into();
        assert!(matches!(err, LedgerError::SubscriptionError { .. }));
    }
}
