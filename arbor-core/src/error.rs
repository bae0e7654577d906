//! Error types for Arbor

use std::fmt;

use thiserror::Error;

/// Result type alias for Arbor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a failure, independent of the concrete error value
///
/// This is what callers match on, and what travels with a task completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Path, branch or remote does not exist
    NotFound,
    /// Branch name collision
    AlreadyExists,
    /// Remote connect or fetch failure
    ConnectionFailed,
    /// Working tree could not be materialized
    CheckoutFailed,
    /// Operation on a removed, stale or unresolved handle
    InvalidHandle,
    /// Unexpected backend error
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::ConnectionFailed => "connection failed",
            ErrorKind::CheckoutFailed => "checkout failed",
            ErrorKind::InvalidHandle => "invalid handle",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// Error type for Arbor operations
#[derive(Error, Debug)]
pub enum Error {
    /// Path, branch or remote absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Branch name collision
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Remote connect or fetch failure
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Working tree materialization failure
    #[error("Checkout failed: {0}")]
    CheckoutFailed(String),

    /// Operation on a removed or stale handle
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Backend error that fits no other category
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            Error::CheckoutFailed(_) => ErrorKind::CheckoutFailed,
            Error::InvalidHandle(_) => ErrorKind::InvalidHandle,
            Error::Git(e) => match e.code() {
                git2::ErrorCode::NotFound => ErrorKind::NotFound,
                git2::ErrorCode::Exists => ErrorKind::AlreadyExists,
                _ => ErrorKind::Internal,
            },
            Error::Io(_) | Error::Config(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Map a backend error with context, picking the closest category
    pub(crate) fn from_git2(err: git2::Error, context: &str) -> Self {
        match (err.code(), err.class()) {
            (git2::ErrorCode::NotFound, _) => Error::NotFound(format!("{}: {}", context, err.message())),
            (git2::ErrorCode::Exists, _) => {
                Error::AlreadyExists(format!("{}: {}", context, err.message()))
            }
            (git2::ErrorCode::Certificate | git2::ErrorCode::Auth, _)
            | (_, git2::ErrorClass::Net | git2::ErrorClass::Ssl | git2::ErrorClass::Http) => {
                Error::ConnectionFailed(format!("{}: {}", context, err.message()))
            }
            (git2::ErrorCode::Conflict, _) | (_, git2::ErrorClass::Checkout) => {
                Error::CheckoutFailed(format!("{}: {}", context, err.message()))
            }
            _ => Error::Git(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_explicit_variants() {
        assert_eq!(Error::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::AlreadyExists("x".into()).kind(), ErrorKind::AlreadyExists);
        assert_eq!(Error::InvalidHandle("x".into()).kind(), ErrorKind::InvalidHandle);
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_git2_maps_codes() {
        let err = git2::Error::new(git2::ErrorCode::NotFound, git2::ErrorClass::Reference, "gone");
        assert_eq!(Error::from_git2(err, "lookup").kind(), ErrorKind::NotFound);

        let err = git2::Error::new(git2::ErrorCode::Exists, git2::ErrorClass::Reference, "dup");
        assert_eq!(Error::from_git2(err, "create").kind(), ErrorKind::AlreadyExists);

        let err = git2::Error::new(git2::ErrorCode::GenericError, git2::ErrorClass::Net, "down");
        assert_eq!(Error::from_git2(err, "clone").kind(), ErrorKind::ConnectionFailed);

        let err = git2::Error::new(git2::ErrorCode::Conflict, git2::ErrorClass::Checkout, "dirty");
        assert_eq!(Error::from_git2(err, "reset").kind(), ErrorKind::CheckoutFailed);
    }

    #[test]
    fn test_display_includes_context() {
        let err = git2::Error::new(git2::ErrorCode::NotFound, git2::ErrorClass::Reference, "gone");
        let msg = Error::from_git2(err, "branch 'x'").to_string();
        assert!(msg.contains("branch 'x'"));
        assert!(msg.contains("gone"));
    }
}
