//! Token request and response shapes exchanged with the identity provider

use std::time::SystemTime;

use common::Secret;

use crate::account::Account;
use crate::scope::ScopeSet;

/// Which screen the provider should show during interactive acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    SelectAccount,
    Login,
    Consent,
    /// B2C sign-up page
    Create,
    None,
}

impl Prompt {
    /// Value of the OAuth `prompt` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Prompt::SelectAccount => "select_account",
            Prompt::Login => "login",
            Prompt::Consent => "consent",
            Prompt::Create => "create",
            Prompt::None => "none",
        }
    }
}

/// Request for a token using the existing session, without UI.
#[derive(Debug, Clone)]
pub struct SilentRequest {
    pub account: Account,
    pub scopes: ScopeSet,
    pub force_refresh: bool,
}

/// Request for a token (or a login) through a visible prompt.
#[derive(Debug, Clone)]
pub struct InteractiveRequest {
    pub scopes: ScopeSet,
    pub account: Option<Account>,
    pub prompt: Prompt,
}

impl InteractiveRequest {
    pub fn new(scopes: ScopeSet, prompt: Prompt) -> Self {
        Self {
            scopes,
            account: None,
            prompt,
        }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }
}

/// Successful token acquisition.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: Secret<String>,
    /// Absolute expiry; `None` when the provider did not report one
    pub expires_on: Option<SystemTime>,
    pub account: Option<Account>,
    pub scopes: ScopeSet,
}

/// Outcome of completing a redirect-based login on page load.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationResult {
    pub account: Option<Account>,
}
