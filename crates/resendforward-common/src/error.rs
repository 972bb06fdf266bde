//! Error types for ResendForward

use thiserror::Error;

/// Main error type for ResendForward
#[derive(Error, Debug)]
pub enum Error {
    /// A request was superseded by a newer one for the same query before it
    /// resolved. Never shown to the user.
    #[error("The request was cancelled because a newer request superseded it")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for ResendForward
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the benign cancellation of a superseded request
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True when a lookup found no matching record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Copy of this error for every waiter on a shared request.
    ///
    /// `Other` has no clone and is carried over as `Internal` with its message.
    pub fn replicate(&self) -> Error {
        match self {
            Error::Cancelled => Error::Cancelled,
            Error::Config(m) => Error::Config(m.clone()),
            Error::NotFound(m) => Error::NotFound(m.clone()),
            Error::Validation(m) => Error::Validation(m.clone()),
            Error::Auth(m) => Error::Auth(m.clone()),
            Error::Backend { status, message } => Error::Backend {
                status: *status,
                message: message.clone(),
            },
            Error::Network(m) => Error::Network(m.clone()),
            Error::Decode(m) => Error::Decode(m.clone()),
            Error::Internal(m) => Error::Internal(m.clone()),
            Error::Other(e) => Error::Internal(e.to_string()),
        }
    }

    /// Returns the HTTP-like status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Cancelled => 0,
            Error::Config(_) => 500,
            Error::NotFound(_) => 404,
            Error::Validation(_) => 400,
            Error::Auth(_) => 401,
            Error::Backend { status, .. } => *status,
            Error::Network(_) => 0,
            Error::Decode(_) => 500,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Cancelled => "CANCELLED",
            Error::Config(_) => "CONFIG_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Auth(_) => "UNAUTHORIZED",
            Error::Backend { .. } => "BACKEND_ERROR",
            Error::Network(_) => "NETWORK_ERROR",
            Error::Decode(_) => "DECODE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
