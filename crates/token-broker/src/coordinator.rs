//! Token acquisition coordinator
//!
//! Hands out bearer tokens for (account, scope set) pairs. Lookup order:
//! 1. Token cache (no provider call on a hit)
//! 2. An acquisition already in flight for the same key (joined, not repeated)
//! 3. Silent acquisition, falling back to an interactive prompt only when the
//!    provider says interaction is required
//!
//! The in-flight registry maps each key to one shared future. Every caller
//! for that key awaits the same future and receives the same result, so at
//! most one provider round trip per key is outstanding at any instant. The
//! shared future removes its own registry entry once it settles. If every
//! caller gives up early the entry stays parked, and the next caller for that
//! key joins it and drives it to completion.
//!
//! Registry entries carry the cache generation they started in. After a
//! `clear` an older acquisition is neither joined nor allowed to write
//! through, so the next caller acquires afresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use common::Secret;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use identity::{Account, IdentityProvider, InteractiveRequest, Prompt, ScopeSet, SilentRequest};
use reqwest::header::HeaderMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, DEFAULT_TOKEN_LIFETIME, TokenCache};
use crate::error::{Error, Result};
use crate::headers::bearer_headers;
use crate::metrics;

type SharedAcquisition = Shared<BoxFuture<'static, Result<Secret<String>>>>;
type InFlight = Arc<Mutex<HashMap<CacheKey, Pending>>>;

/// In-flight acquisition tagged with the cache generation it started in.
struct Pending {
    generation: u64,
    acquisition: SharedAcquisition,
}

pub struct TokenCoordinator {
    provider: Arc<dyn IdentityProvider>,
    cache: Arc<TokenCache>,
    in_flight: InFlight,
    default_lifetime: Duration,
}

impl TokenCoordinator {
    /// Coordinator over `provider`, writing through to `cache`.
    ///
    /// The cache is shared so the session controller can clear it on sign-out.
    pub fn new(provider: Arc<dyn IdentityProvider>, cache: Arc<TokenCache>) -> Self {
        Self {
            provider,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            default_lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }

    /// Coordinator with cache margin and default lifetime from `[tokens]`.
    pub fn from_config(provider: Arc<dyn IdentityProvider>, config: &common::Config) -> Self {
        let cache = Arc::new(TokenCache::with_margin(config.tokens.expiry_margin()));
        Self::new(provider, cache).with_default_lifetime(config.tokens.default_lifetime())
    }

    /// Lifetime assumed when the provider omits `expires_on`.
    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Bearer token for `account` carrying `scopes`.
    ///
    /// Fails with `Error::Silent` when silent acquisition fails for a reason
    /// other than required interaction, and with `Error::Interactive` when
    /// the prompt fallback fails.
    pub async fn get_access_token(
        &self,
        account: &Account,
        scopes: &ScopeSet,
    ) -> Result<Secret<String>> {
        if let Some(token) = self.cache.get(account, scopes).await {
            metrics::record_cache_lookup(true);
            debug!(account = %account.home_account_id, scopes = %scopes, "token cache hit");
            return Ok(token);
        }
        metrics::record_cache_lookup(false);

        let key = CacheKey::new(account, scopes);
        let acquisition = {
            let mut in_flight = self.in_flight.lock().await;
            let generation = self.cache.generation();
            let joinable = in_flight
                .get(&key)
                .filter(|pending| pending.generation == generation)
                .map(|pending| pending.acquisition.clone());
            match joinable {
                Some(acquisition) => {
                    metrics::record_joined();
                    debug!(key = %key, "joining in-flight token acquisition");
                    acquisition
                }
                None => {
                    // An acquisition may have settled between the cache
                    // lookup and taking the registry lock
                    if let Some(token) = self.cache.get(account, scopes).await {
                        return Ok(token);
                    }
                    debug!(key = %key, "starting token acquisition");
                    let acquisition =
                        self.start_acquisition(key.clone(), account, scopes, generation);
                    in_flight.insert(
                        key,
                        Pending {
                            generation,
                            acquisition: acquisition.clone(),
                        },
                    );
                    acquisition
                }
            }
        };

        acquisition.await
    }

    /// Token for the provider's active account, or its first known account.
    pub async fn get_access_token_for_active(&self, scopes: &ScopeSet) -> Result<Secret<String>> {
        let account = self.current_account().ok_or(Error::NoActiveSession)?;
        self.get_access_token(&account, scopes).await
    }

    /// JSON request headers authorized with a token for (account, scopes).
    pub async fn auth_headers(&self, account: &Account, scopes: &ScopeSet) -> Result<HeaderMap> {
        let token = self.get_access_token(account, scopes).await?;
        bearer_headers(&token)
    }

    /// Drop every cached token and forget in-flight acquisitions.
    ///
    /// Callers already waiting on an acquisition still receive its result,
    /// but it is not cached and later callers start a new one.
    pub async fn clear_cache(&self) {
        let mut in_flight = self.in_flight.lock().await;
        self.cache.clear().await;
        in_flight.clear();
    }

    fn current_account(&self) -> Option<Account> {
        self.provider
            .active_account()
            .or_else(|| self.provider.all_accounts().into_iter().next())
    }

    fn start_acquisition(
        &self,
        key: CacheKey,
        account: &Account,
        scopes: &ScopeSet,
        generation: u64,
    ) -> SharedAcquisition {
        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let default_lifetime = self.default_lifetime;
        let account = account.clone();
        let scopes = scopes.clone();

        async move {
            let result = acquire(
                provider.as_ref(),
                &cache,
                &account,
                &scopes,
                default_lifetime,
                generation,
            )
            .await;
            let mut in_flight = in_flight.lock().await;
            if in_flight
                .get(&key)
                .is_some_and(|pending| pending.generation == generation)
            {
                in_flight.remove(&key);
            }
            result
        }
        .boxed()
        .shared()
    }
}

/// Silent acquisition with interactive fallback, writing through to the cache.
async fn acquire(
    provider: &dyn IdentityProvider,
    cache: &TokenCache,
    account: &Account,
    scopes: &ScopeSet,
    default_lifetime: Duration,
    generation: u64,
) -> Result<Secret<String>> {
    let silent = SilentRequest {
        account: account.clone(),
        scopes: scopes.clone(),
        force_refresh: false,
    };

    let response = match provider.acquire_token_silent(&silent).await {
        Ok(response) => {
            metrics::record_acquisition("silent", true);
            response
        }
        Err(e) if e.is_interaction_required() => {
            metrics::record_acquisition("silent", false);
            info!(
                account = %account.home_account_id,
                scopes = %scopes,
                code = %e.code,
                "silent acquisition needs interaction, prompting"
            );
            let request = InteractiveRequest::new(scopes.clone(), Prompt::SelectAccount)
                .with_account(account.clone());
            match provider.acquire_token_interactive(&request).await {
                Ok(response) => {
                    metrics::record_acquisition("interactive", true);
                    response
                }
                Err(e) => {
                    metrics::record_acquisition("interactive", false);
                    warn!(account = %account.home_account_id, error = %e, "interactive acquisition failed");
                    return Err(Error::Interactive(e));
                }
            }
        }
        Err(e) => {
            metrics::record_acquisition("silent", false);
            warn!(
                account = %account.home_account_id,
                kind = e.kind.label(),
                error = %e,
                "silent acquisition failed"
            );
            return Err(Error::Silent(e));
        }
    };

    let expires_at = response
        .expires_on
        .unwrap_or_else(|| SystemTime::now() + default_lifetime);
    let cached = cache
        .put_if_current(
            account,
            scopes,
            response.access_token.clone(),
            expires_at,
            generation,
        )
        .await;
    if cached {
        debug!(account = %account.home_account_id, scopes = %scopes, "token cached");
    }

    Ok(response.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity::IdentityError;
    use identity::testing::{ScriptedProvider, account, token};

    fn api_scopes() -> ScopeSet {
        ScopeSet::new(["api://backend/Files.ReadWrite"])
    }

    fn coordinator(provider: &Arc<ScriptedProvider>) -> TokenCoordinator {
        TokenCoordinator::new(provider.clone(), Arc::new(TokenCache::new()))
    }

    #[tokio::test]
    async fn cache_hit_makes_no_provider_call() {
        let provider = Arc::new(ScriptedProvider::new());
        let coordinator = coordinator(&provider);
        let acct = account("a");
        coordinator
            .cache()
            .put(
                &acct,
                &api_scopes(),
                "at_cached".into(),
                SystemTime::now() + Duration::from_secs(3600),
            )
            .await;

        let token = coordinator
            .get_access_token(&acct, &api_scopes())
            .await
            .unwrap();

        assert_eq!(token.expose(), "at_cached");
        assert_eq!(provider.silent_calls(), 0);
        assert_eq!(provider.interactive_calls(), 0);
    }

    #[tokio::test]
    async fn entry_inside_expiry_margin_is_reacquired() {
        let provider = Arc::new(ScriptedProvider::new());
        let coordinator = coordinator(&provider);
        let acct = account("a");
        coordinator
            .cache()
            .put(
                &acct,
                &api_scopes(),
                "at_stale".into(),
                SystemTime::now() + Duration::from_secs(4 * 60),
            )
            .await;

        let token = coordinator
            .get_access_token(&acct, &api_scopes())
            .await
            .unwrap();

        assert_eq!(token.expose(), "at_silent_1");
        assert_eq!(provider.silent_calls(), 1);
    }

    #[tokio::test]
    async fn entry_outside_expiry_margin_is_reused() {
        let provider = Arc::new(ScriptedProvider::new());
        let coordinator = coordinator(&provider);
        let acct = account("a");
        coordinator
            .cache()
            .put(
                &acct,
                &api_scopes(),
                "at_fresh".into(),
                SystemTime::now() + Duration::from_secs(10 * 60),
            )
            .await;

        let token = coordinator
            .get_access_token(&acct, &api_scopes())
            .await
            .unwrap();

        assert_eq!(token.expose(), "at_fresh");
        assert_eq!(provider.silent_calls(), 0);
    }

    #[tokio::test]
    async fn silent_success_is_cached() {
        let provider = Arc::new(ScriptedProvider::new());
        let coordinator = coordinator(&provider);
        let acct = account("a");

        let first = coordinator.get_access_token(&acct, &api_scopes()).await.unwrap();
        let second = coordinator.get_access_token(&acct, &api_scopes()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.silent_calls(), 1);

        let request = &provider.silent_requests()[0];
        assert_eq!(request.account, acct);
        assert_eq!(request.scopes, api_scopes());
        assert!(!request.force_refresh);
    }

    #[tokio::test]
    async fn interaction_required_falls_back_to_prompt_once() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_silent(Err(IdentityError::interaction_required("session expired")));
        provider.push_interactive(Ok(token("at_popup", Duration::from_secs(3600))));
        let coordinator = coordinator(&provider);
        let acct = account("a");

        let token = coordinator
            .get_access_token(&acct, &api_scopes())
            .await
            .unwrap();

        assert_eq!(token.expose(), "at_popup");
        assert_eq!(provider.interactive_calls(), 1);
        let request = &provider.interactive_requests()[0];
        assert_eq!(request.prompt, Prompt::SelectAccount);
        assert_eq!(request.account.as_ref(), Some(&acct));
        assert_eq!(request.scopes, api_scopes());

        // Written through: the next call is served from cache
        let again = coordinator
            .get_access_token(&acct, &api_scopes())
            .await
            .unwrap();
        assert_eq!(again.expose(), "at_popup");
        assert_eq!(provider.silent_calls(), 1);
        assert_eq!(provider.interactive_calls(), 1);
    }

    #[tokio::test]
    async fn other_silent_failure_does_not_prompt() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_silent(Err(IdentityError::other("network_error", "connection reset")));
        let coordinator = coordinator(&provider);

        let err = coordinator
            .get_access_token(&account("a"), &api_scopes())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Silent(ref e) if e.code == "network_error"));
        assert!(err.is_acquisition());
        assert_eq!(provider.interactive_calls(), 0);
        assert!(coordinator.cache().is_empty().await);
    }

    #[tokio::test]
    async fn failed_prompt_is_an_acquisition_error() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_silent(Err(IdentityError::interaction_required("consent needed")));
        provider.push_interactive(Err(IdentityError::other("user_cancelled", "popup closed")));
        let coordinator = coordinator(&provider);

        let err = coordinator
            .get_access_token(&account("a"), &api_scopes())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Interactive(_)));
        assert!(coordinator.cache().is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_acquisition() {
        let provider = Arc::new(ScriptedProvider::new());
        let gate = provider.hold_silent();
        let coordinator = coordinator(&provider);
        let acct = account("a");
        let scopes = api_scopes();

        let (first, second, ()) = tokio::join!(
            coordinator.get_access_token(&acct, &scopes),
            coordinator.get_access_token(&acct, &scopes),
            async {
                while provider.silent_calls() == 0 {
                    tokio::task::yield_now().await;
                }
                gate.add_permits(1);
            }
        );

        assert_eq!(provider.silent_calls(), 1);
        assert_eq!(first.unwrap().expose(), "at_silent_1");
        assert_eq!(second.unwrap().expose(), "at_silent_1");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_failure() {
        let provider = Arc::new(ScriptedProvider::new());
        let gate = provider.hold_silent();
        provider.push_silent(Err(IdentityError::other("server_error", "boom")));
        let coordinator = coordinator(&provider);
        let acct = account("a");
        let scopes = api_scopes();

        let (first, second, ()) = tokio::join!(
            coordinator.get_access_token(&acct, &scopes),
            coordinator.get_access_token(&acct, &scopes),
            async {
                while provider.silent_calls() == 0 {
                    tokio::task::yield_now().await;
                }
                gate.add_permits(1);
            }
        );

        assert_eq!(provider.silent_calls(), 1);
        assert!(matches!(first, Err(Error::Silent(_))));
        assert!(matches!(second, Err(Error::Silent(_))));
    }

    #[tokio::test]
    async fn distinct_scope_sets_acquire_independently() {
        let provider = Arc::new(ScriptedProvider::new());
        let gate = provider.hold_silent();
        let coordinator = coordinator(&provider);
        let acct = account("a");
        let api = api_scopes();
        let login = ScopeSet::new(["openid", "profile"]);

        let (api_token, basic, ()) = tokio::join!(
            coordinator.get_access_token(&acct, &api),
            coordinator.get_access_token(&acct, &login),
            async {
                while provider.silent_calls() < 2 {
                    tokio::task::yield_now().await;
                }
                gate.add_permits(2);
            }
        );

        assert_eq!(provider.silent_calls(), 2);
        assert_ne!(api_token.unwrap(), basic.unwrap());
    }

    #[tokio::test]
    async fn failure_for_one_scope_set_does_not_block_another() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_silent(Err(IdentityError::other("invalid_scope", "unknown scope")));
        let coordinator = coordinator(&provider);
        let acct = account("a");

        assert!(
            coordinator
                .get_access_token(&acct, &ScopeSet::new(["bogus"]))
                .await
                .is_err()
        );
        let token = coordinator
            .get_access_token(&acct, &api_scopes())
            .await
            .unwrap();
        assert_eq!(token.expose(), "at_silent_2");
    }

    #[tokio::test]
    async fn settled_failure_allows_retry() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_silent(Err(IdentityError::other("network_error", "timeout")));
        let coordinator = coordinator(&provider);
        let acct = account("a");

        assert!(coordinator.get_access_token(&acct, &api_scopes()).await.is_err());
        let token = coordinator
            .get_access_token(&acct, &api_scopes())
            .await
            .unwrap();

        assert_eq!(token.expose(), "at_silent_2");
        assert_eq!(provider.silent_calls(), 2);
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_strand_acquisition() {
        let provider = Arc::new(ScriptedProvider::new());
        let gate = provider.hold_silent();
        let coordinator = coordinator(&provider);
        let acct = account("a");

        // The first caller gives up while the provider call is still pending
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            coordinator.get_access_token(&acct, &api_scopes()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(provider.silent_calls(), 1);

        gate.add_permits(1);
        let token = coordinator
            .get_access_token(&acct, &api_scopes())
            .await
            .unwrap();

        assert_eq!(token.expose(), "at_silent_1");
        assert_eq!(provider.silent_calls(), 1);
        assert!(coordinator.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn clear_during_acquisition_discards_its_token() {
        let provider = Arc::new(ScriptedProvider::new());
        let gate = provider.hold_silent();
        let coordinator = coordinator(&provider);
        let acct = account("a");
        let scopes = api_scopes();

        let (before_clear, ()) = tokio::join!(
            coordinator.get_access_token(&acct, &scopes),
            async {
                while provider.silent_calls() == 0 {
                    tokio::task::yield_now().await;
                }
                coordinator.clear_cache().await;
                gate.add_permits(1);
            }
        );

        // The caller that asked before the clear still gets its answer
        assert_eq!(before_clear.unwrap().expose(), "at_silent_1");
        assert!(coordinator.cache().is_empty().await);
        assert!(coordinator.in_flight.lock().await.is_empty());

        gate.add_permits(1);
        let after_clear = coordinator.get_access_token(&acct, &scopes).await.unwrap();
        assert_eq!(after_clear.expose(), "at_silent_2");
        assert_eq!(provider.silent_calls(), 2);
    }

    #[tokio::test]
    async fn caller_after_clear_does_not_join_older_acquisition() {
        let provider = Arc::new(ScriptedProvider::new());
        let gate = provider.hold_silent();
        let coordinator = coordinator(&provider);
        let acct = account("a");
        let scopes = api_scopes();

        let (old, new) = tokio::join!(
            coordinator.get_access_token(&acct, &scopes),
            async {
                while provider.silent_calls() == 0 {
                    tokio::task::yield_now().await;
                }
                coordinator.cache().clear().await;
                gate.add_permits(2);
                coordinator.get_access_token(&acct, &scopes).await
            }
        );

        assert_eq!(provider.silent_calls(), 2);
        assert_eq!(old.unwrap().expose(), "at_silent_1");
        assert_eq!(new.unwrap().expose(), "at_silent_2");
        assert_eq!(
            coordinator.cache().get(&acct, &scopes).await.unwrap().expose(),
            "at_silent_2"
        );
        assert!(coordinator.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn clear_forces_fresh_acquisition() {
        let provider = Arc::new(ScriptedProvider::new());
        let coordinator = coordinator(&provider);
        let acct = account("a");

        coordinator.get_access_token(&acct, &api_scopes()).await.unwrap();
        coordinator.clear_cache().await;
        let token = coordinator
            .get_access_token(&acct, &api_scopes())
            .await
            .unwrap();

        assert_eq!(token.expose(), "at_silent_2");
        assert_eq!(provider.silent_calls(), 2);
    }

    #[tokio::test]
    async fn missing_expiry_defaults_to_configured_lifetime() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut response = token("at_no_expiry", Duration::ZERO);
        response.expires_on = None;
        provider.push_silent(Ok(response));
        let coordinator = coordinator(&provider);
        let acct = account("a");

        coordinator.get_access_token(&acct, &api_scopes()).await.unwrap();

        let now = SystemTime::now();
        let cache = coordinator.cache();
        let in_50_min = now + Duration::from_secs(50 * 60);
        let in_56_min = now + Duration::from_secs(56 * 60);
        assert!(cache.get_at(&acct, &api_scopes(), in_50_min).await.is_some());
        assert!(cache.get_at(&acct, &api_scopes(), in_56_min).await.is_none());
    }

    #[tokio::test]
    async fn active_account_is_preferred() {
        let provider = Arc::new(ScriptedProvider::with_accounts(vec![account("first")]));
        provider.set_active_account(Some(account("active")));
        let coordinator = coordinator(&provider);

        coordinator
            .get_access_token_for_active(&api_scopes())
            .await
            .unwrap();

        assert_eq!(provider.silent_requests()[0].account, account("active"));
    }

    #[tokio::test]
    async fn first_known_account_is_used_without_active() {
        let provider = Arc::new(ScriptedProvider::with_accounts(vec![
            account("first"),
            account("second"),
        ]));
        let coordinator = coordinator(&provider);

        coordinator
            .get_access_token_for_active(&api_scopes())
            .await
            .unwrap();

        assert_eq!(provider.silent_requests()[0].account, account("first"));
    }

    #[tokio::test]
    async fn no_account_is_no_active_session() {
        let provider = Arc::new(ScriptedProvider::new());
        let coordinator = coordinator(&provider);

        let err = coordinator
            .get_access_token_for_active(&api_scopes())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoActiveSession));
        assert_eq!(provider.silent_calls(), 0);
    }

    #[tokio::test]
    async fn auth_headers_carry_bearer_token() {
        let provider = Arc::new(ScriptedProvider::new());
        let coordinator = coordinator(&provider);

        let headers = coordinator
            .auth_headers(&account("a"), &api_scopes())
            .await
            .unwrap();

        assert_eq!(headers[reqwest::header::AUTHORIZATION], "Bearer at_silent_1");
    }

    #[test]
    fn from_config_uses_token_settings() {
        let config = common::Config::from_toml_str(
            r#"
[identity]
tenant = "t"
client_id = "c"
authority_domain = "t.b2clogin.com"
backend_client_id = "b"

[app]
base_url = "https://app.example.com"

[tokens]
expiry_margin_secs = 60
default_lifetime_secs = 1800
"#,
        )
        .unwrap();
        let provider: Arc<dyn IdentityProvider> = Arc::new(ScriptedProvider::new());

        let coordinator = TokenCoordinator::from_config(provider, &config);

        assert_eq!(coordinator.cache().margin(), Duration::from_secs(60));
        assert_eq!(coordinator.default_lifetime, Duration::from_secs(1800));
    }
}
