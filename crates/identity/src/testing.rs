//! Scripted in-memory `IdentityProvider` for tests
//!
//! Each capability pops the next scripted outcome from its queue; when the
//! queue is empty a default outcome is produced (fresh one-hour tokens, no
//! redirect result, successful login navigation). Every call is counted and
//! its request recorded. Silent acquisition can be held open with
//! `hold_silent` to make concurrent callers overlap deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::sync::Semaphore;

use crate::{
    Account, AuthenticationResult, IdentityProvider, InteractiveRequest, ProviderFuture, Result,
    ScopeSet, SilentRequest, TokenResponse,
};

/// Build an account with predictable identifiers derived from `id`.
pub fn account(id: &str) -> Account {
    Account {
        home_account_id: format!("{id}.tenant"),
        local_account_id: id.to_owned(),
        environment: "login.example.com".into(),
        tenant_id: "tenant".into(),
        username: format!("{id}@example.com"),
        name: Some(format!("User {id}")),
        id_token_claims: Default::default(),
    }
}

/// Token response expiring `ttl` from now.
pub fn token(access: &str, ttl: Duration) -> TokenResponse {
    TokenResponse {
        access_token: access.into(),
        expires_on: Some(SystemTime::now() + ttl),
        account: None,
        scopes: ScopeSet::default(),
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct ScriptedProvider {
    redirect: Mutex<VecDeque<Result<Option<AuthenticationResult>>>>,
    silent: Mutex<VecDeque<Result<TokenResponse>>>,
    interactive: Mutex<VecDeque<Result<TokenResponse>>>,
    login: Mutex<VecDeque<Result<()>>>,
    accounts: Mutex<Vec<Account>>,
    active: Mutex<Option<Account>>,
    silent_gate: Mutex<Option<Arc<Semaphore>>>,
    silent_requests: Mutex<Vec<SilentRequest>>,
    interactive_requests: Mutex<Vec<InteractiveRequest>>,
    login_requests: Mutex<Vec<InteractiveRequest>>,
    redirect_calls: AtomicUsize,
    silent_calls: AtomicUsize,
    interactive_calls: AtomicUsize,
    login_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let provider = Self::default();
        *lock(&provider.accounts) = accounts;
        provider
    }

    pub fn push_redirect(&self, outcome: Result<Option<AuthenticationResult>>) {
        lock(&self.redirect).push_back(outcome);
    }

    pub fn push_silent(&self, outcome: Result<TokenResponse>) {
        lock(&self.silent).push_back(outcome);
    }

    pub fn push_interactive(&self, outcome: Result<TokenResponse>) {
        lock(&self.interactive).push_back(outcome);
    }

    pub fn push_login(&self, outcome: Result<()>) {
        lock(&self.login).push_back(outcome);
    }

    /// Make every silent call wait for a permit on the returned semaphore.
    pub fn hold_silent(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *lock(&self.silent_gate) = Some(gate.clone());
        gate
    }

    pub fn redirect_calls(&self) -> usize {
        self.redirect_calls.load(Ordering::SeqCst)
    }

    pub fn silent_calls(&self) -> usize {
        self.silent_calls.load(Ordering::SeqCst)
    }

    pub fn interactive_calls(&self) -> usize {
        self.interactive_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn silent_requests(&self) -> Vec<SilentRequest> {
        lock(&self.silent_requests).clone()
    }

    pub fn interactive_requests(&self) -> Vec<InteractiveRequest> {
        lock(&self.interactive_requests).clone()
    }

    pub fn login_requests(&self) -> Vec<InteractiveRequest> {
        lock(&self.login_requests).clone()
    }
}

impl IdentityProvider for ScriptedProvider {
    fn complete_redirect_session(&self) -> ProviderFuture<'_, Option<AuthenticationResult>> {
        Box::pin(async move {
            self.redirect_calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.redirect).pop_front().unwrap_or(Ok(None))
        })
    }

    fn acquire_token_silent<'a>(
        &'a self,
        request: &'a SilentRequest,
    ) -> ProviderFuture<'a, TokenResponse> {
        Box::pin(async move {
            let n = self.silent_calls.fetch_add(1, Ordering::SeqCst) + 1;
            lock(&self.silent_requests).push(request.clone());

            let gate = lock(&self.silent_gate).clone();
            if let Some(gate) = gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }

            lock(&self.silent)
                .pop_front()
                .unwrap_or_else(|| Ok(token(&format!("at_silent_{n}"), Duration::from_secs(3600))))
        })
    }

    fn acquire_token_interactive<'a>(
        &'a self,
        request: &'a InteractiveRequest,
    ) -> ProviderFuture<'a, TokenResponse> {
        Box::pin(async move {
            let n = self.interactive_calls.fetch_add(1, Ordering::SeqCst) + 1;
            lock(&self.interactive_requests).push(request.clone());
            lock(&self.interactive).pop_front().unwrap_or_else(|| {
                Ok(token(
                    &format!("at_interactive_{n}"),
                    Duration::from_secs(3600),
                ))
            })
        })
    }

    fn all_accounts(&self) -> Vec<Account> {
        lock(&self.accounts).clone()
    }

    fn active_account(&self) -> Option<Account> {
        lock(&self.active).clone()
    }

    fn set_active_account(&self, account: Option<Account>) {
        *lock(&self.active) = account;
    }

    fn initiate_login<'a>(&'a self, request: &'a InteractiveRequest) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.login_requests).push(request.clone());
            lock(&self.login).pop_front().unwrap_or(Ok(()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdentityError;

    #[tokio::test]
    async fn scripted_outcomes_are_returned_in_order() {
        let provider = ScriptedProvider::new();
        provider.push_silent(Err(IdentityError::interaction_required("expired")));
        let request = SilentRequest {
            account: account("a"),
            scopes: ScopeSet::new(["openid"]),
            force_refresh: false,
        };

        assert!(provider.acquire_token_silent(&request).await.is_err());
        let second = provider.acquire_token_silent(&request).await.unwrap();
        assert_eq!(second.access_token.expose(), "at_silent_2");
        assert_eq!(provider.silent_calls(), 2);
        assert_eq!(provider.silent_requests().len(), 2);
    }

    #[tokio::test]
    async fn defaults_when_nothing_scripted() {
        let provider = ScriptedProvider::with_accounts(vec![account("a")]);
        assert!(provider.complete_redirect_session().await.unwrap().is_none());
        assert_eq!(provider.all_accounts().len(), 1);
        assert!(provider.active_account().is_none());
    }

    #[test]
    fn active_account_is_recorded_and_cleared() {
        let provider = ScriptedProvider::with_accounts(vec![account("a"), account("b")]);
        provider.set_active_account(Some(account("b")));
        assert_eq!(provider.active_account(), Some(account("b")));

        provider.set_active_account(None);
        assert!(provider.active_account().is_none());
    }
}
