//! Error types for backend calls

/// Errors from the Resume Match Pro backend client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    /// No bearer token could be obtained for the API scopes
    #[error("token acquisition failed: {0}")]
    Token(#[from] token_broker::Error),
}

/// Result alias for backend calls.
pub type Result<T> = std::result::Result<T, Error>;
