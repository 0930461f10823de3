//! Error types for workflow delivery.
//!
//! `DeliveryError` describes why a single delivery to one endpoint failed and
//! is captured inside that endpoint's outcome. `DispatchError` is the only
//! error a dispatch call returns: either every attempted delivery failed, or
//! the message could not be serialized before anything was sent.

use std::fmt;

use relay_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

use crate::outcome::DeliveryOutcome;

/// Result type alias for single-delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Reasons a single delivery failed.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    NetworkError {
        /// Error message describing the network failure
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Endpoint answered with a 4xx status.
    #[error("client error: HTTP {status_code}")]
    ClientError {
        /// HTTP status code (4xx)
        status_code: u16,
    },

    /// Endpoint answered with a 5xx status.
    #[error("server error: HTTP {status_code}")]
    ServerError {
        /// HTTP status code (5xx)
        status_code: u16,
    },

    /// Endpoint answered 429.
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds the endpoint asked us to wait
        retry_after_seconds: u64,
    },

    /// Endpoint answered with a status that is neither success nor error.
    #[error("unexpected response: HTTP {status_code}")]
    UnexpectedStatus {
        /// HTTP status code (1xx or 3xx)
        status_code: u16,
    },

    /// Retry budget used up; carries the last attempt's failure.
    #[error("delivery failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Failure of the final attempt
        #[source]
        last_error: Box<DeliveryError>,
    },

    /// Transport or signer could not be configured.
    #[error("invalid delivery configuration: {message}")]
    ConfigurationError {
        /// Configuration error message
        message: String,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Creates a client error from an HTTP status.
    pub fn client_error(status_code: u16) -> Self {
        Self::ClientError { status_code }
    }

    /// Creates a server error from an HTTP status.
    pub fn server_error(status_code: u16) -> Self {
        Self::ServerError { status_code }
    }

    /// Creates a rate limit error with retry guidance.
    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        Self::RateLimited { retry_after_seconds }
    }

    /// Creates a retries exhausted error wrapping the final failure.
    pub fn retries_exhausted(attempts: u32, last_error: Self) -> Self {
        Self::RetriesExhausted { attempts, last_error: Box::new(last_error) }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status_code: u16, retry_after_seconds: Option<u64>) -> Self {
        match status_code {
            429 => Self::rate_limited(retry_after_seconds.unwrap_or(DEFAULT_RETRY_AFTER_SECONDS)),
            400..=499 => Self::client_error(status_code),
            500..=599 => Self::server_error(status_code),
            _ => Self::UnexpectedStatus { status_code },
        }
    }

    /// Determines if this error represents a temporary failure worth another
    /// attempt.
    ///
    /// Returns `true` for network errors, timeouts, server errors (5xx), and
    /// rate limits.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError { .. }
            | Self::Timeout { .. }
            | Self::ServerError { .. }
            | Self::RateLimited { .. } => true,

            Self::ClientError { .. }
            | Self::UnexpectedStatus { .. }
            | Self::RetriesExhausted { .. }
            | Self::ConfigurationError { .. } => false,
        }
    }

    /// Returns the suggested retry delay in seconds, if the endpoint gave one.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_seconds } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Returns the HTTP status the endpoint answered with, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ClientError { status_code }
            | Self::ServerError { status_code }
            | Self::UnexpectedStatus { status_code } => Some(*status_code),
            Self::RateLimited { .. } => Some(429),
            Self::RetriesExhausted { last_error, .. } => last_error.status_code(),
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::ConfigurationError { .. } => {
                None
            },
        }
    }

    /// Returns the number of attempts behind this failure.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

/// Delay assumed when a 429 response carries no usable Retry-After header.
pub const DEFAULT_RETRY_AFTER_SECONDS: u64 = 60;

/// Category of delivery error for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network connectivity issues and timeouts.
    Network,
    /// HTTP client errors (4xx) and unexpected statuses.
    Client,
    /// HTTP server errors (5xx).
    Server,
    /// Rate limiting.
    RateLimit,
    /// Configuration problems.
    Configuration,
}

impl From<&DeliveryError> for ErrorCategory {
    fn from(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::NetworkError { .. } | DeliveryError::Timeout { .. } => Self::Network,
            DeliveryError::ClientError { .. } | DeliveryError::UnexpectedStatus { .. } => {
                Self::Client
            },
            DeliveryError::ServerError { .. } => Self::Server,
            DeliveryError::RateLimited { .. } => Self::RateLimit,
            DeliveryError::RetriesExhausted { last_error, .. } => Self::from(last_error.as_ref()),
            DeliveryError::ConfigurationError { .. } => Self::Configuration,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Aggregate failure of one dispatch call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Every attempted delivery failed.
    #[error("all {} workflow deliveries failed", .failures.len())]
    AllFailed {
        /// Identifier of the failed dispatch
        dispatch_id: Uuid,
        /// Every failing outcome, in working set order
        failures: Vec<DeliveryOutcome>,
    },

    /// The message could not be serialized; nothing was sent.
    #[error("failed to serialize message: {0}")]
    Serialization(#[from] CoreError),
}

impl DispatchError {
    /// Returns the per-endpoint failures behind an aggregate failure.
    pub fn failures(&self) -> &[DeliveryOutcome] {
        match self {
            Self::AllFailed { failures, .. } => failures,
            Self::Serialization(_) => &[],
        }
    }
}
