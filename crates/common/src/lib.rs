//! Common types for the Resume Match Pro client workspace
//!
//! Holds the pieces every other crate leans on: the `Secret` wrapper used for
//! bearer tokens, the shared configuration error, and the TOML configuration
//! describing the identity tenant, the application URLs and token timing.

mod config;
mod error;
mod secret;

pub use config::{AppConfig, Config, IdentityConfig, TokensConfig};
pub use error::{Error, Result};
pub use secret::Secret;
