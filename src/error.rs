//! Application-wide error types.
//!
//! [`ServiceError`] is the taxonomy every session/todo operation returns to
//! the transport boundary.  [`AppError`] covers process bootstrap (config,
//! logger, store backends) and wraps service failures that escape to `main`.

use std::fmt;

use thiserror::Error;

/// Resource kinds that can be reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    List,
    Item,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::User => write!(f, "user"),
            Resource::List => write!(f, "list"),
            Resource::Item => write!(f, "item"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token is expired")]
    TokenExpired,

    #[error("access denied")]
    AccessDenied,

    #[error("{0} was not found")]
    NotFound(Resource),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("password too simple")]
    WeakPassword,

    #[error("login failed")]
    LoginFailed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage timed out")]
    StorageTimeout,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("signing error: {0}")]
    Signing(String),

    /// Argon2 failed, or a stored hash is not a valid PHC string.
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl ServiceError {
    /// Only a timed-out store call is worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::StorageTimeout)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
