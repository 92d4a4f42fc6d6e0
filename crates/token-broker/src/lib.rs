//! Bearer token cache and acquisition coordinator
//!
//! Sits between UI code that needs a token for a scope set and the identity
//! provider that issues them. Tokens are cached per (account, scope set) and
//! reused until five minutes before expiry; misses are de-duplicated so that
//! concurrent callers for the same key share one provider round trip.
//!
//! Acquisition flow:
//! 1. `TokenCache::get`: a valid entry returns immediately
//! 2. Join an in-flight acquisition for the same key, if any
//! 3. `IdentityProvider::acquire_token_silent`
//! 4. On `InteractionRequired`, `IdentityProvider::acquire_token_interactive`
//!    with `select_account`
//! 5. Write through to the cache and release the in-flight entry

pub mod cache;
pub mod coordinator;
pub mod error;
pub mod headers;
pub mod metrics;

pub use cache::{CacheKey, CachedToken, DEFAULT_EXPIRY_MARGIN, DEFAULT_TOKEN_LIFETIME, TokenCache};
pub use coordinator::TokenCoordinator;
pub use error::{Error, Result};
pub use headers::bearer_headers;
