//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The identity tenant
//! values mirror the B2C app registration; `base_url` has no default because
//! the redirect URI is derived from it and a wrong value silently breaks login.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub identity: IdentityConfig,
    pub app: AppConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
}

/// Identity tenant and app registration
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub tenant: String,
    /// Client ID of the browser application registration
    pub client_id: String,
    /// Host serving the B2C user flows, e.g. `contoso.b2clogin.com`
    pub authority_domain: String,
    /// Client ID of the backend API registration; used to build API scopes
    pub backend_client_id: String,
    #[serde(default = "default_sign_in_policy")]
    pub sign_in_policy: String,
    #[serde(default = "default_password_reset_policy")]
    pub password_reset_policy: String,
}

/// Application URLs
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub base_url: String,
    /// Backend REST base. Empty means `{base_url}/api`.
    #[serde(default)]
    pub backend_url: String,
}

/// Token cache timing
#[derive(Debug, Clone, Deserialize)]
pub struct TokensConfig {
    #[serde(default = "default_expiry_margin")]
    pub expiry_margin_secs: u64,
    #[serde(default = "default_lifetime")]
    pub default_lifetime_secs: u64,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            expiry_margin_secs: default_expiry_margin(),
            default_lifetime_secs: default_lifetime(),
        }
    }
}

impl TokensConfig {
    /// Window before expiry in which a cached token is no longer handed out.
    pub fn expiry_margin(&self) -> Duration {
        Duration::from_secs(self.expiry_margin_secs)
    }

    /// Lifetime assumed when the provider omits `expiresOn`.
    pub fn default_lifetime(&self) -> Duration {
        Duration::from_secs(self.default_lifetime_secs)
    }
}

fn default_sign_in_policy() -> String {
    "B2C_1_signupsignin".into()
}

fn default_password_reset_policy() -> String {
    "B2C_1_passwordreset".into()
}

fn default_expiry_margin() -> u64 {
    300
}

fn default_lifetime() -> u64 {
    3600
}

/// Environment overrides, applied after the file is parsed.
const ENV_OVERRIDES: &[&str] = &[
    "RMP_B2C_TENANT",
    "RMP_FRONTEND_CLIENT_ID",
    "RMP_B2C_AUTHORITY_DOMAIN",
    "RMP_BACKEND_CLIENT_ID",
    "RMP_BASE_URL",
    "RMP_BACKEND_URL",
];

impl Config {
    /// Load configuration from a TOML file, overlay environment variables,
    /// then validate.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text, overlay environment variables,
    /// then validate.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        for name in ENV_OVERRIDES {
            let Ok(value) = std::env::var(name) else {
                continue;
            };
            let value = value.trim().to_owned();
            if value.is_empty() {
                continue;
            }
            debug!(var = name, "config value overridden from environment");
            match *name {
                "RMP_B2C_TENANT" => self.identity.tenant = value,
                "RMP_FRONTEND_CLIENT_ID" => self.identity.client_id = value,
                "RMP_B2C_AUTHORITY_DOMAIN" => self.identity.authority_domain = value,
                "RMP_BACKEND_CLIENT_ID" => self.identity.backend_client_id = value,
                "RMP_BASE_URL" => self.app.base_url = value,
                "RMP_BACKEND_URL" => self.app.backend_url = value,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.app.base_url.is_empty() {
            return Err(Error::Config(
                "base_url is required (set [app].base_url or RMP_BASE_URL)".into(),
            ));
        }
        if !is_http_url(&self.app.base_url) {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.app.base_url
            )));
        }
        if !self.app.backend_url.is_empty() && !is_http_url(&self.app.backend_url) {
            return Err(Error::Config(format!(
                "backend_url must start with http:// or https://, got: {}",
                self.app.backend_url
            )));
        }
        for (field, value) in [
            ("tenant", &self.identity.tenant),
            ("client_id", &self.identity.client_id),
            ("authority_domain", &self.identity.authority_domain),
            ("backend_client_id", &self.identity.backend_client_id),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("identity.{field} must not be empty")));
            }
        }
        if self.tokens.default_lifetime_secs == 0 {
            return Err(Error::Config(
                "default_lifetime_secs must be greater than 0".into(),
            ));
        }
        if self.tokens.expiry_margin_secs >= self.tokens.default_lifetime_secs {
            return Err(Error::Config(format!(
                "expiry_margin_secs ({}) must be shorter than default_lifetime_secs ({})",
                self.tokens.expiry_margin_secs, self.tokens.default_lifetime_secs
            )));
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("resume-match.toml")
    }

    fn authority_base(&self) -> String {
        format!(
            "https://{}/{}.onmicrosoft.com",
            self.identity.authority_domain, self.identity.tenant
        )
    }

    /// Authority URL of the sign-up/sign-in user flow.
    pub fn authority(&self) -> String {
        format!(
            "{}/{}/v2.0",
            self.authority_base(),
            self.identity.sign_in_policy
        )
    }

    /// Authority URL of the password reset user flow.
    pub fn password_reset_authority(&self) -> String {
        format!(
            "{}/{}/v2.0",
            self.authority_base(),
            self.identity.password_reset_policy
        )
    }

    /// Where the identity provider sends the browser back after login.
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth-callback/", self.app.base_url.trim_end_matches('/'))
    }

    /// Backend REST base URL without a trailing slash.
    pub fn backend_url(&self) -> String {
        if self.app.backend_url.is_empty() {
            format!("{}/api", self.app.base_url.trim_end_matches('/'))
        } else {
            self.app.backend_url.trim_end_matches('/').to_owned()
        }
    }

    /// Scopes requested at sign-in. The client ID is required for B2C to
    /// issue an access token alongside the ID token.
    pub fn login_scopes(&self) -> Vec<String> {
        vec![
            "openid".into(),
            "profile".into(),
            "offline_access".into(),
            self.identity.client_id.clone(),
        ]
    }

    /// Scopes carried by tokens sent to the backend API.
    pub fn api_scopes(&self) -> Vec<String> {
        vec![format!(
            "api://{}/Files.ReadWrite",
            self.identity.backend_client_id
        )]
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
