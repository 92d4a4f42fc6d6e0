//! Errors reported by the identity provider

/// Coarse classification of identity-provider failures.
///
/// Only the first two kinds are recoverable locally: silent acquisition falls
/// back to an interactive prompt on `InteractionRequired`, and redirect
/// completion is retried once on `InteractionInProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The cached session cannot satisfy the request without user interaction
    InteractionRequired,
    /// Another login or token prompt is already running
    InteractionInProgress,
    /// Anything else; never recovered from locally
    Other,
}

impl ErrorKind {
    /// Label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::InteractionRequired => "interaction_required",
            ErrorKind::InteractionInProgress => "interaction_in_progress",
            ErrorKind::Other => "other",
        }
    }
}

/// Error codes that mean the user has to see a prompt before a token can be issued.
const INTERACTION_REQUIRED_CODES: &[&str] = &[
    "interaction_required",
    "consent_required",
    "login_required",
    "no_tokens_found",
    // B2C: the session has expired and the user must sign in again
    "AADB2C90077",
];

const INTERACTION_IN_PROGRESS_CODE: &str = "interaction_in_progress";

/// A failed identity-provider call.
///
/// `Clone` so that one failure can be handed to every caller waiting on the
/// same acquisition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct IdentityError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

impl IdentityError {
    /// Build an error of an explicit kind.
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classify a provider error code.
    ///
    /// B2C tends to put its `AADB2C…` code in the message rather than the
    /// code field, so both are checked.
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        let kind = if code == INTERACTION_IN_PROGRESS_CODE {
            ErrorKind::InteractionInProgress
        } else if INTERACTION_REQUIRED_CODES
            .iter()
            .any(|c| code == *c || message.contains(c))
        {
            ErrorKind::InteractionRequired
        } else {
            ErrorKind::Other
        };
        Self {
            kind,
            code,
            message,
        }
    }

    pub fn interaction_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InteractionRequired, "interaction_required", message)
    }

    pub fn interaction_in_progress(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InteractionInProgress,
            INTERACTION_IN_PROGRESS_CODE,
            message,
        )
    }

    pub fn other(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, code, message)
    }

    pub fn is_interaction_required(&self) -> bool {
        self.kind == ErrorKind::InteractionRequired
    }

    pub fn is_interaction_in_progress(&self) -> bool {
        self.kind == ErrorKind::InteractionInProgress
    }
}

/// Result alias for identity-provider calls.
pub type Result<T> = std::result::Result<T, IdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_interaction_required_codes() {
        for code in ["interaction_required", "consent_required", "login_required"] {
            let err = IdentityError::from_code(code, "user interaction is required");
            assert!(err.is_interaction_required(), "{code} should need interaction");
        }
    }

    #[test]
    fn classifies_b2c_session_expiry_from_message() {
        let err = IdentityError::from_code(
            "server_error",
            "AADB2C90077: User does not have an existing session",
        );
        assert_eq!(err.kind, ErrorKind::InteractionRequired);
    }

    #[test]
    fn classifies_interaction_in_progress() {
        let err = IdentityError::from_code("interaction_in_progress", "popup already open");
        assert!(err.is_interaction_in_progress());
        assert!(!err.is_interaction_required());
    }

    #[test]
    fn unknown_codes_are_other() {
        let err = IdentityError::from_code("network_error", "connection reset");
        assert_eq!(err.kind, ErrorKind::Other);
        assert_eq!(err.kind.label(), "other");
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = IdentityError::other("invalid_grant", "refresh token revoked");
        assert_eq!(err.to_string(), "invalid_grant: refresh token revoked");
    }
}
