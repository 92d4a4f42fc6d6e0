//! Permission scopes requested from the identity provider

use std::fmt;

use serde::{Deserialize, Serialize};

/// A set of scope strings, stored sorted.
///
/// Two sets are equivalent exactly when their sorted sequences match, so the
/// order in which scopes were listed never changes equality or hashing.
/// Duplicates are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut scopes: Vec<String> = scopes.into_iter().map(Into::into).collect();
        scopes.sort();
        Self(scopes)
    }

    /// Parse a space-delimited scope string as used on the wire.
    pub fn from_whitespace(scopes: &str) -> Self {
        Self::new(scopes.split_whitespace())
    }

    /// Sorted scopes joined with `,`.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for ScopeSet {
    fn from(scopes: Vec<String>) -> Self {
        Self::new(scopes)
    }
}

impl From<ScopeSet> for Vec<String> {
    fn from(scopes: ScopeSet) -> Self {
        scopes.0
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn order_does_not_affect_equality() {
        let a = ScopeSet::new(["openid", "api://backend/Files.ReadWrite", "profile"]);
        let b = ScopeSet::new(["profile", "openid", "api://backend/Files.ReadWrite"]);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn joined_is_sorted() {
        let scopes = ScopeSet::new(["profile", "openid"]);
        assert_eq!(scopes.joined(), "openid,profile");
        assert_eq!(scopes.to_string(), "openid,profile");
    }

    #[test]
    fn different_sets_are_distinct() {
        assert_ne!(ScopeSet::new(["openid"]), ScopeSet::new(["openid", "profile"]));
    }

    #[test]
    fn parses_whitespace_delimited() {
        let scopes = ScopeSet::from_whitespace(" profile  openid offline_access ");
        assert_eq!(scopes.as_slice(), ["offline_access", "openid", "profile"]);
        assert_eq!(scopes.len(), 3);
    }

    #[test]
    fn deserializes_from_list_into_sorted_form() {
        let scopes: ScopeSet = serde_json::from_str(r#"["b", "a"]"#).unwrap();
        assert_eq!(scopes.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(serde_json::to_string(&scopes).unwrap(), r#"["a","b"]"#);
    }
}
