//! Error types for Quill API operations.
//!
//! Errors are categorized so callers can decide between aborting the whole
//! command (setup problems), degrading gracefully (renewal hiccups), and
//! isolating a single item inside a batch (per-resource failures).

use std::fmt;
use std::io;

/// Result type alias for authkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors, used to pick propagation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid credentials; the operator must reconfigure.
    Auth,
    /// Transport-level failure (DNS, refused connection, timeout).
    Network,
    /// Non-2xx HTTP response.
    Http,
    /// Structurally malformed token; treated as "renew now", not fatal.
    Decode,
    /// Missing configuration (typically the app scope) for one operation.
    Config,
    /// Other/unexpected errors.
    Other,
}

impl ErrorCategory {
    /// Whether this category should abort the whole command immediately.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth)
    }

    /// Whether failures of this category may be isolated per item inside a
    /// batch operation instead of aborting the batch.
    #[must_use]
    pub fn is_isolatable(&self) -> bool {
        matches!(self, Self::Network | Self::Http | Self::Config)
    }

    /// User-facing description of this category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Auth => "Authentication problem",
            Self::Network => "Network connectivity issue",
            Self::Http => "API request rejected",
            Self::Decode => "Malformed token",
            Self::Config => "Missing configuration",
            Self::Other => "Unexpected error",
        }
    }

    /// Actionable advice for resolving this category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Auth => "Run `quill configure` to set up credentials",
            Self::Network => "Check your internet connection and try again",
            Self::Http => "Check the error details for the server's reason",
            Self::Decode => "The stored token will be renewed automatically",
            Self::Config => "Set an app scope with `quill configure --app <id>`",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the Quill API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable credentials; setup has not run or was wiped.
    #[error("not authenticated: {0}")]
    Auth(String),

    /// The refresh token is past its hard expiry; renewal returned 401.
    #[error("refresh token expired; run `quill configure` to sign in again")]
    TokenExpired,

    /// Transport-level failure before an HTTP status was received.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP response.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message derived from the response body or status line.
        message: String,
    },

    /// The token is not a structurally well-formed JWT.
    #[error("malformed token: {0}")]
    Decode(String),

    /// An operation needs configuration that is absent.
    #[error("missing configuration: {0}")]
    Config(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error from a status and message.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Get the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Auth(_) | Error::TokenExpired => ErrorCategory::Auth,
            Error::Network(_) => ErrorCategory::Network,
            Error::Http { .. } => ErrorCategory::Http,
            Error::Decode(_) => ErrorCategory::Decode,
            Error::Config(_) => ErrorCategory::Config,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error should abort the whole command.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// HTTP status code, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                status: code,
                message: format!("HTTP {}", code),
            },
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(format!("invalid API response: {err}"))
    }
}
