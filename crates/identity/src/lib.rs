//! Identity-provider capability interface
//!
//! Defines the `IdentityProvider` trait that decouples session and token logic
//! from the concrete OAuth2/OIDC client library. The provider owns the login
//! protocol, token issuance and validation; this crate only describes the
//! capabilities the rest of the workspace calls:
//! - complete a pending redirect login on page load
//! - acquire a token silently from the existing session
//! - acquire a token through a visible prompt
//! - list known accounts, report and record the active one
//! - start an interactive login redirect
//!
//! The provider is passed around as `Arc<dyn IdentityProvider>` so tests can
//! substitute a double without global state.

pub mod account;
pub mod error;
pub mod request;
pub mod scope;

pub use account::{ADMIN_CLAIM, Account};
pub use error::{ErrorKind, IdentityError, Result};
pub use request::{AuthenticationResult, InteractiveRequest, Prompt, SilentRequest, TokenResponse};
pub use scope::ScopeSet;

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by provider capabilities.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Capabilities of an OAuth2/OIDC public-client library.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn IdentityProvider>`). Every call may suspend; none of them is
/// wrapped in a timeout here, that policy belongs to the provider.
pub trait IdentityProvider: Send + Sync {
    /// Finish a redirect login that brought the browser back to the app.
    ///
    /// Returns `None` when the page load was not the end of a redirect.
    fn complete_redirect_session(&self) -> ProviderFuture<'_, Option<AuthenticationResult>>;

    /// Acquire a token from the cached session without showing UI.
    ///
    /// Fails with `ErrorKind::InteractionRequired` when only a prompt can help.
    fn acquire_token_silent<'a>(&'a self, request: &'a SilentRequest)
    -> ProviderFuture<'a, TokenResponse>;

    /// Acquire a token through a popup or similar visible prompt.
    fn acquire_token_interactive<'a>(
        &'a self,
        request: &'a InteractiveRequest,
    ) -> ProviderFuture<'a, TokenResponse>;

    /// Accounts the provider currently knows about, in its own order.
    fn all_accounts(&self) -> Vec<Account>;

    /// Account the provider considers active, if one was set.
    fn active_account(&self) -> Option<Account>;

    /// Record the account the session authenticated, or forget it on sign-out.
    /// Later `active_account` calls return it.
    fn set_active_account(&self, account: Option<Account>);

    /// Navigate away to the login page. The page reloads on return, so the
    /// future resolving only means the navigation was started.
    fn initiate_login<'a>(&'a self, request: &'a InteractiveRequest) -> ProviderFuture<'a, ()>;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing;
