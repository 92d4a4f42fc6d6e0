//! Resume Match Pro backend client
//!
//! Typed access to the file, matching and user-administration endpoints.
//! Each request carries a bearer token from `token_broker::TokenCoordinator`
//! for the configured API scopes; the user id sent to the backend is the
//! account's `local_account_id`.

pub mod client;
pub mod error;
pub mod model;

pub use client::ApiClient;
pub use error::{Error, Result};
pub use model::{CvMatch, FileType, MatchResult, Profile, RmpFile, UploadFile, UserDetails};
