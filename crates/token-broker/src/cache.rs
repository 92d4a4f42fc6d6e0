//! In-memory bearer token cache
//!
//! Maps (account, scope set) to the last token acquired for it. Entries are
//! only written by successful acquisitions and only removed by `clear`,
//! `invalidate`, or being overwritten. Nothing is persisted: a fresh process
//! starts empty and re-acquires.
//!
//! Every `clear` starts a new generation. Acquisitions record the generation
//! they started in and write through with `put_if_current`, so a token
//! requested before a logout is never stored after it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use common::Secret;
use identity::{Account, ScopeSet};
use tokio::sync::Mutex;
use tracing::debug;

/// Tokens are treated as expired this long before their real expiry, so a
/// token cannot lapse between the cache lookup and the backend call.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Lifetime assumed when the provider does not report an expiry.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Cache key: the account's home ID plus its sorted scope set.
///
/// Both parts are hashed as-is rather than concatenated, so a scope string
/// containing `,` cannot collide with a split scope set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    home_account_id: String,
    scopes: ScopeSet,
}

impl CacheKey {
    pub fn new(account: &Account, scopes: &ScopeSet) -> Self {
        Self {
            home_account_id: account.home_account_id.clone(),
            scopes: scopes.clone(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.home_account_id, self.scopes)
    }
}

/// A cached bearer token.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: Secret<String>,
    pub expires_at: SystemTime,
    pub account: Account,
    pub scopes: ScopeSet,
}

impl CachedToken {
    /// Whether the token may still be handed out at `now`.
    pub fn is_usable_at(&self, now: SystemTime, margin: Duration) -> bool {
        match self.expires_at.checked_sub(margin) {
            Some(deadline) => now < deadline,
            None => false,
        }
    }
}

pub struct TokenCache {
    entries: Mutex<HashMap<CacheKey, CachedToken>>,
    /// Bumped by `clear` while the entries lock is held
    generation: AtomicU64,
    margin: Duration,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::with_margin(DEFAULT_EXPIRY_MARGIN)
    }

    /// Cache that stops handing out tokens `margin` before they expire.
    pub fn with_margin(margin: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            margin,
        }
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Cached token for (account, scopes), if present and not within the
    /// expiry margin. A miss is not an error.
    pub async fn get(&self, account: &Account, scopes: &ScopeSet) -> Option<Secret<String>> {
        self.get_at(account, scopes, SystemTime::now()).await
    }

    /// `get` evaluated at an explicit point in time.
    pub async fn get_at(
        &self,
        account: &Account,
        scopes: &ScopeSet,
        now: SystemTime,
    ) -> Option<Secret<String>> {
        let key = CacheKey::new(account, scopes);
        let entries = self.entries.lock().await;
        match entries.get(&key) {
            Some(entry) if entry.is_usable_at(now, self.margin) => {
                Some(entry.access_token.clone())
            }
            Some(_) => {
                debug!(key = %key, "cached token inside expiry margin");
                None
            }
            None => None,
        }
    }

    /// Write (or overwrite) the entry for (account, scopes).
    pub async fn put(
        &self,
        account: &Account,
        scopes: &ScopeSet,
        access_token: Secret<String>,
        expires_at: SystemTime,
    ) {
        let (key, entry) = entry(account, scopes, access_token, expires_at);
        self.entries.lock().await.insert(key, entry);
    }

    /// Current clear generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// `put`, unless the cache was cleared since `generation` was read.
    /// Returns whether the entry was written.
    pub async fn put_if_current(
        &self,
        account: &Account,
        scopes: &ScopeSet,
        access_token: Secret<String>,
        expires_at: SystemTime,
        generation: u64,
    ) -> bool {
        let (key, entry) = entry(account, scopes, access_token, expires_at);
        let mut entries = self.entries.lock().await;
        if self.generation() != generation {
            debug!(key = %key, "cache cleared during acquisition, token dropped");
            return false;
        }
        entries.insert(key, entry);
        true
    }

    /// Drop the entry for (account, scopes). Returns whether one existed.
    pub async fn invalidate(&self, account: &Account, scopes: &ScopeSet) -> bool {
        let key = CacheKey::new(account, scopes);
        let removed = self.entries.lock().await.remove(&key).is_some();
        if removed {
            debug!(key = %key, "cached token invalidated");
        }
        removed
    }

    /// Empty the cache (logout, test isolation).
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        let dropped = entries.len();
        entries.clear();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(dropped, generation, "token cache cleared");
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn entry(
    account: &Account,
    scopes: &ScopeSet,
    access_token: Secret<String>,
    expires_at: SystemTime,
) -> (CacheKey, CachedToken) {
    let entry = CachedToken {
        access_token,
        expires_at,
        account: account.clone(),
        scopes: scopes.clone(),
    };
    (CacheKey::new(account, scopes), entry)
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}
