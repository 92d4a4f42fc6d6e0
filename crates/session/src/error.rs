//! Session error types

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An operation needed a signed-in account and there is none
    #[error("no active session")]
    NoActiveSession,

    #[error("{event} is not valid while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
