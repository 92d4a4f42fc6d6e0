//! Login requests built from configuration

use common::Config;
use identity::{InteractiveRequest, Prompt, ScopeSet};

/// Sign-in with account picker, requesting the configured login scopes.
pub fn login_request(config: &Config) -> InteractiveRequest {
    InteractiveRequest::new(ScopeSet::new(config.login_scopes()), Prompt::SelectAccount)
}

/// Sign-up flow: same scopes, B2C `create` prompt.
pub fn sign_up_request(config: &Config) -> InteractiveRequest {
    InteractiveRequest::new(ScopeSet::new(config.login_scopes()), Prompt::Create)
}
