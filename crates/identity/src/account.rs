//! Signed-in principal as reported by the identity provider

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim carrying the B2C custom attribute that marks administrators.
pub const ADMIN_CLAIM: &str = "extension_IsAdmin";

/// An identity-provider account record.
///
/// Owned by the provider. Callers keep clones and never mutate them; a
/// re-authentication produces a whole new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Stable identifier across tenants; the token cache keys on this
    pub home_account_id: String,
    /// Object ID in the home tenant; the backend's `user_id`
    pub local_account_id: String,
    #[serde(default)]
    pub environment: String,
    pub tenant_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub id_token_claims: Map<String, Value>,
}

impl Account {
    /// Name to show in the UI, falling back to the username.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.username)
    }

    /// Whether the provider marked this principal as an administrator.
    ///
    /// The claim is trusted as issued; no further authorization happens here.
    pub fn is_admin(&self) -> bool {
        match self.id_token_claims.get(ADMIN_CLAIM) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}
