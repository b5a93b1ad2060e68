//! Error types and handling for the Instapaper client.
//!
//! Every public operation reports failures through [`InstapaperError`], a flat
//! enumeration of outcomes a caller can act on. Lower-level transport failures are
//! described by [`TransportError`] and classified into an [`InstapaperError`] by
//! [`InstapaperError::from_transport`].
//!
//! ## Error Categories
//!
//! - **Input Errors**: blank username or URL (never touch the network)
//! - **Connectivity Errors**: service unreachable or failing with a 5xx (queueable on send)
//! - **Account Errors**: invalid or missing credentials, keychain failures (never retried)
//! - **Soft Outcomes**: a submission that was queued instead of sent
//!
//! ## Usage
//!
//! ```rust
//! use instapaper_rs::InstapaperError;
//! use instapaper_rs::error::ErrorSeverity;
//!
//! fn handle_error(error: InstapaperError) {
//!     if error.is_soft() {
//!         println!("saved for later: {error}");
//!         return;
//!     }
//!     match error.severity() {
//!         ErrorSeverity::Warning => println!("try again later: {error}"),
//!         ErrorSeverity::Error => println!("request failed: {error}"),
//!         ErrorSeverity::Critical => println!("account needs attention: {error}"),
//!     }
//! }
//! ```

use std::fmt;
use tracing::error;

/// Result type alias for Instapaper client operations.
pub type Result<T> = std::result::Result<T, InstapaperError>;

/// Error type for every public Instapaper client operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstapaperError {
    /// `authorize` was called with an empty or blank username
    #[error("A username is required")]
    NoUsername,

    /// The service could not be reached and nothing was queued
    #[error("Instapaper is unreachable")]
    Unreachable,

    /// The service could not be reached but the URL was queued for a later attempt
    #[error("Instapaper is unreachable, the URL was queued")]
    UnreachableUrlQueued,

    /// The service rejected the username/password pair
    #[error("Invalid Instapaper credentials")]
    InvalidCredentials,

    /// The service answered with a 5xx status
    #[error("Instapaper is having service issues")]
    ServiceIssues,

    /// The secure credential store failed
    #[error("Keychain error: {message}")]
    Keychain { message: String },

    /// No account has been stored yet
    #[error("No stored Instapaper account")]
    NoStoredAccount,

    /// `send` was called with an empty URL
    #[error("A URL is required")]
    NoUrl,

    /// The service reported that the rate limit was exceeded
    #[error("Instapaper rate limit exceeded")]
    RateLimit,

    /// Unclassified failure; the real cause is logged, not exposed
    #[error("Unknown Instapaper error")]
    Unknown,

    /// Configuration errors (not retryable)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The durable queue store could not be read or written
    #[error("Queue storage error: {message}")]
    Storage { message: String },
}

/// Numeric codes for [`InstapaperError`], stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    NoUsername = 0,
    Unreachable = 1,
    UnreachableUrlQueued = 2,
    InvalidCredentials = 3,
    ServiceIssues = 4,
    KeychainError = 5,
    NoStoredAccount = 6,
    NoUrl = 7,
    RateLimit = 8,
    Unknown = 9,
}

impl InstapaperError {
    /// Gets the public error code.
    ///
    /// Configuration and storage failures have no dedicated code and report as
    /// [`ErrorCode::Unknown`].
    pub fn code(&self) -> ErrorCode {
        match self {
            InstapaperError::NoUsername => ErrorCode::NoUsername,
            InstapaperError::Unreachable => ErrorCode::Unreachable,
            InstapaperError::UnreachableUrlQueued => ErrorCode::UnreachableUrlQueued,
            InstapaperError::InvalidCredentials => ErrorCode::InvalidCredentials,
            InstapaperError::ServiceIssues => ErrorCode::ServiceIssues,
            InstapaperError::Keychain { .. } => ErrorCode::KeychainError,
            InstapaperError::NoStoredAccount => ErrorCode::NoStoredAccount,
            InstapaperError::NoUrl => ErrorCode::NoUrl,
            InstapaperError::RateLimit => ErrorCode::RateLimit,
            InstapaperError::Unknown
            | InstapaperError::Config { .. }
            | InstapaperError::Storage { .. } => ErrorCode::Unknown,
        }
    }

    /// Determines if a failed submission may be deferred to the pending queue.
    ///
    /// Only connectivity problems qualify. Credential and keychain failures cannot
    /// be fixed by a later attempt.
    pub fn is_queueable(&self) -> bool {
        matches!(
            self,
            InstapaperError::Unreachable | InstapaperError::ServiceIssues
        )
    }

    /// True when the operation did not complete but nothing was lost.
    pub fn is_soft(&self) -> bool {
        matches!(self, InstapaperError::UnreachableUrlQueued)
    }

    /// Gets the severity level of the error for logging purposes.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            InstapaperError::Unreachable
            | InstapaperError::UnreachableUrlQueued
            | InstapaperError::ServiceIssues
            | InstapaperError::RateLimit => ErrorSeverity::Warning,

            InstapaperError::NoUsername
            | InstapaperError::NoUrl
            | InstapaperError::NoStoredAccount
            | InstapaperError::Unknown
            | InstapaperError::Config { .. } => ErrorSeverity::Error,

            InstapaperError::InvalidCredentials
            | InstapaperError::Keychain { .. }
            | InstapaperError::Storage { .. } => ErrorSeverity::Critical,
        }
    }

    /// Classifies a transport failure.
    ///
    /// The cause behind [`InstapaperError::Unknown`] is logged here and dropped.
    pub fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(_) => InstapaperError::Unreachable,
            TransportError::Status { status, body } => match status {
                500..=599 => InstapaperError::ServiceIssues,
                400 if body.to_ascii_lowercase().contains("rate limit") => {
                    InstapaperError::RateLimit
                }
                400..=499 => InstapaperError::InvalidCredentials,
                _ => {
                    error!(status, body = %body, "Unexpected Instapaper response");
                    InstapaperError::Unknown
                }
            },
            TransportError::Other(cause) => {
                error!(error = %cause, "Instapaper request failed");
                InstapaperError::Unknown
            }
        }
    }

    /// Creates a keychain error.
    pub fn keychain_error(message: impl Into<String>) -> Self {
        InstapaperError::Keychain {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        InstapaperError::Config {
            message: message.into(),
        }
    }

    /// Creates a queue storage error.
    pub fn storage_error(message: impl Into<String>) -> Self {
        InstapaperError::Storage {
            message: message.into(),
        }
    }
}

impl From<TransportError> for InstapaperError {
    fn from(err: TransportError) -> Self {
        InstapaperError::from_transport(err)
    }
}

/// Failure reported by a [`crate::traits::Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    /// The service answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Anything else
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            TransportError::Unreachable(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            TransportError::Other(anyhow::Error::new(err))
        }
    }
}

/// Error severity levels for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Transient errors that a later attempt may fix
    Warning,
    /// Standard errors that affect a single operation
    Error,
    /// Errors that need user action on the stored account
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
