//! Error types for civic-core

use thiserror::Error;

/// Result type alias using civic-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by remote data sources
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Classified failure of a remote call.
///
/// Data sources map transport and decoding failures into one of these
/// variants; raw `reqwest` errors never cross the data-source boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request did not complete within the configured timeout
    #[error("Request timed out")]
    RequestTimeout,

    /// The server rate-limited the client (HTTP 429)
    #[error("Too many requests")]
    TooManyRequests,

    /// No route to the server (DNS, connect or offline failure)
    #[error("No internet connection")]
    NoInternet,

    /// The server answered with a non-success status
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Anything the classifier could not place
    #[error("Unknown remote error: {0}")]
    Unknown(String),
}

/// Classified failure of the on-device store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalError {
    /// The device ran out of storage while writing
    #[error("Disk full")]
    DiskFull,

    /// Any other local storage failure
    #[error("Local storage error: {0}")]
    Unknown(String),
}

impl From<rusqlite::Error> for LocalError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(inner, _)
                if inner.code == rusqlite::ErrorCode::DiskFull =>
            {
                Self::DiskFull
            }
            _ => Self::Unknown(error.to_string()),
        }
    }
}

impl From<std::io::Error> for LocalError {
    fn from(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::StorageFull {
            Self::DiskFull
        } else {
            Self::Unknown(error.to_string())
        }
    }
}

/// Errors that can occur in civic-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote data source failure, passed through unchanged
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Local store failure
    #[error(transparent)]
    Local(#[from] LocalError),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        Self::Local(error.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Local(error.into())
    }
}

impl Error {
    /// Returns the remote classification when this error came from a data source.
    pub const fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(error) => Some(error),
            _ => None,
        }
    }
}

/// Failure reported by a platform notification service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The user or the platform withheld the needed permission
    #[error("Notification permission denied: {0}")]
    PermissionDenied(String),

    /// The service could not take the request right now
    #[error("Notification service unavailable: {0}")]
    Unavailable(String),
}

/// Failure to attach one staged image to a created ticket.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The staged file could not be read from disk
    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: LocalError,
    },

    /// The server rejected or never received the upload
    #[error("Upload failed: {0}")]
    Upload(#[from] RemoteError),
}

/// A best-effort side effect that failed after its primary operation succeeded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecondaryFailure {
    /// Staged images could not be attached to a freshly created entity
    #[error("Media attach failed for {failed} of {total} file(s): {last_error}")]
    MediaAttachFailed {
        failed: usize,
        total: usize,
        #[source]
        last_error: MediaError,
    },

    /// A reminder could not be scheduled with the notification sink
    #[error("Reminder scheduling failed: {0}")]
    ReminderScheduleFailed(#[from] SinkError),

    /// The server accepted the entity but the local store did not save it
    #[error("Saved on the server but not on this device: {0}")]
    LocalSaveFailed(#[source] LocalError),
}

/// Result of an operation whose primary effect succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub secondary_failure: Option<SecondaryFailure>,
}

impl<T> Outcome<T> {
    pub const fn complete(value: T) -> Self {
        Self {
            value,
            secondary_failure: None,
        }
    }

    pub const fn with_failure(value: T, failure: SecondaryFailure) -> Self {
        Self {
            value,
            secondary_failure: Some(failure),
        }
    }

    pub const fn is_complete(&self) -> bool {
        self.secondary_failure.is_none()
    }
}
