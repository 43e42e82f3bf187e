//! Error types and result handling for Magic Eye.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Magic Eye operations.
#[derive(Error, Debug)]
pub enum Error {
    // ===== I/O Errors =====
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Permission denied: {path}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Watcher Errors =====
    #[error("Failed to subscribe to filesystem events: {reason}")]
    WatchSubscription { reason: String },

    // ===== Sniffing Errors =====
    #[error("Content sniffing failed for {path}: {reason}")]
    Sniff { path: PathBuf, reason: String },

    // ===== Concurrency Errors =====
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::WatchSubscription {
            reason: err.to_string(),
        }
    }
}

impl Error {
    /// Create a file read error, mapping well-known I/O kinds to specific variants.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            _ => Self::FileRead { path, source },
        }
    }

    /// Create a sniffing error.
    pub fn sniff(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Sniff {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a subscription error.
    pub fn watch_subscription(reason: impl Into<String>) -> Self {
        Self::WatchSubscription {
            reason: reason.into(),
        }
    }

    /// Create a lock poisoned error.
    pub fn lock_poisoned(context: impl Into<String>) -> Self {
        Self::LockPoisoned {
            context: context.into(),
        }
    }

    /// Get a user-friendly suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::PermissionDenied { .. } => {
                Some("Try running with elevated privileges (sudo/administrator)")
            }
            Error::PathNotFound(_) => Some("The file may have been moved or deleted"),
            Error::ConfigLoad(_) | Error::ConfigInvalid { .. } => {
                Some("Check your configuration file for syntax errors or missing fields")
            }
            Error::WatchSubscription { .. } => {
                Some("Check the OS limit on watch handles (e.g. fs.inotify.max_user_watches)")
            }
            Error::LockPoisoned { .. } => Some("Internal error: restart the application"),
            _ => None,
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FileRead { .. } | Error::PathNotFound(_) | Error::PermissionDenied { .. } => {
                ErrorCategory::Io
            }

            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }

            Error::WatchSubscription { .. } => ErrorCategory::Watcher,

            Error::Sniff { .. } => ErrorCategory::Sniffing,

            Error::LockPoisoned { .. } => ErrorCategory::Concurrency,

            Error::JsonSerialize(_) => ErrorCategory::Serialization,

            Error::Internal(_) => ErrorCategory::Other,
        }
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Configuration,
    Watcher,
    Sniffing,
    Concurrency,
    Serialization,
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Watcher => write!(f, "Watcher"),
            Self::Sniffing => write!(f, "Sniffing"),
            Self::Concurrency => write!(f, "Concurrency"),
            Self::Serialization => write!(f, "Serialization"),
            Self::Other => write!(f, "Other"),
        }
    }
}
