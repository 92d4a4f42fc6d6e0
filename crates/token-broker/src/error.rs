//! Error types for token acquisition

use identity::IdentityError;

/// Errors from token acquisition.
///
/// `Clone` because one settled acquisition is delivered to every caller that
/// joined it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Silent acquisition failed for a reason a prompt cannot fix
    #[error("silent token acquisition failed: {0}")]
    Silent(IdentityError),

    /// Silent acquisition needed interaction and the prompt failed too
    #[error("interactive token acquisition failed: {0}")]
    Interactive(IdentityError),

    #[error("no active session")]
    NoActiveSession,

    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

impl Error {
    /// Whether this is a failed acquisition (as opposed to a caller error).
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Error::Silent(_) | Error::Interactive(_))
    }
}

/// Result alias for token operations.
pub type Result<T> = std::result::Result<T, Error>;
