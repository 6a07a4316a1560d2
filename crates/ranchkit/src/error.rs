//! Error types for project reconciliation.
//!
//! Errors are categorized so the CLI can give appropriate user feedback.
//! Nothing here is retried: every failure surfaces to the caller of the
//! operation that produced it.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for ranchkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The server could not be reached or answered with something unreadable.
    Transport,
    /// The server answered but refused the operation.
    Rejected,
    /// The requested project or cluster does not exist.
    NotFound,
    /// A create succeeded but returned no usable identifier.
    Identity,
    /// Malformed input (config file, principal identifier).
    Format,
    /// The operation is not implemented.
    Unsupported,
    /// Local filesystem problem.
    Io,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transport => "Could not talk to the Rancher server",
            Self::Rejected => "Rancher rejected the request",
            Self::NotFound => "Resource not found",
            Self::Identity => "Missing identifier in server response",
            Self::Format => "Invalid input format",
            Self::Unsupported => "Unsupported operation",
            Self::Io => "File access failed",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transport => "Check --rancher-url and your network connection",
            Self::Rejected => "Check the token's permissions and the status code in the log",
            Self::NotFound => "Verify the project or cluster id with `rancherctl ls`",
            Self::Identity => "Look the project up with `rancherctl ls` before re-applying",
            Self::Format => "Fix the input and try again",
            Self::Unsupported => "Use the Rancher UI for this operation",
            Self::Io => "Check the file path and its permissions",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to Rancher or reading project files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request could not be sent, or the response could not be read/decoded.
    #[error("{operation} failed: {message}")]
    Transport {
        /// Operation being performed.
        operation: String,
        /// Underlying error message.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("{operation} rejected: status={status}")]
    Rejected {
        /// Operation being performed.
        operation: String,
        /// HTTP status code returned by the server.
        status: u16,
        /// Response body, for diagnosis.
        body: String,
    },

    /// Remote entity does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Kind of entity ("project", "cluster").
        kind: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// Create reported success but the response had no id.
    #[error("created project '{name}' but the response carried no id")]
    MissingIdentity {
        /// Name of the project that was created.
        name: String,
    },

    /// Principal identifier does not match `openldap_group://cn=<name>,...`.
    #[error("invalid principal id '{principal}': {reason}")]
    InvalidPrincipal {
        /// The offending principal identifier.
        principal: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Operation is deliberately not implemented.
    #[error("{operation} is not supported")]
    Unsupported {
        /// The requested operation.
        operation: String,
    },

    /// Project file could not be decoded or failed validation.
    #[error("invalid project file: {0}")]
    Decode(String),

    /// IO error while reading a file.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create a transport error for an operation.
    pub fn transport(operation: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Turn a 404 rejection into [`Error::NotFound`], leaving other errors alone.
    #[must_use]
    pub fn or_not_found(self, kind: &'static str, id: &str) -> Self {
        match self {
            Self::Rejected { status: 404, .. } => Self::NotFound {
                kind,
                id: id.to_string(),
            },
            other => other,
        }
    }

    /// Get the error category for user feedback.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Rejected { .. } => ErrorCategory::Rejected,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MissingIdentity { .. } => ErrorCategory::Identity,
            Self::InvalidPrincipal { .. } | Self::Decode(_) => ErrorCategory::Format,
            Self::Unsupported { .. } => ErrorCategory::Unsupported,
            Self::Io { .. } => ErrorCategory::Io,
        }
    }

    /// HTTP status attached to a rejection, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
