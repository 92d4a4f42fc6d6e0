//! Authentication session controller
//!
//! Drives the session state machine against the identity provider. On page
//! load, `initialize` completes any pending redirect exactly once, then either
//! resumes a known account or starts an interactive login. The current state
//! is published on a `watch` channel so UI code can gate rendering on it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use identity::{Account, IdentityProvider, InteractiveRequest, Prompt};
use token_broker::TokenCache;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::requests::{login_request, sign_up_request};
use crate::state::{SessionAction, SessionEvent, SessionState, handle_event};

/// Called with the account once the session is authenticated.
pub type AuthenticatedCallback = Box<dyn Fn(&Account) + Send + Sync>;

pub struct SessionController {
    provider: Arc<dyn IdentityProvider>,
    cache: Arc<TokenCache>,
    login_request: InteractiveRequest,
    sign_up_request: InteractiveRequest,
    on_authenticated: Option<AuthenticatedCallback>,
    state: watch::Sender<SessionState>,
    initialized: AtomicBool,
    /// Serializes drivers so two transitions never interleave their I/O
    driver: Mutex<()>,
}

impl SessionController {
    /// Controller that logs in with `login_request` and clears `cache` on sign-out.
    ///
    /// Sign-up uses the same scopes with the `create` prompt unless
    /// `with_sign_up_request` overrides it.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        cache: Arc<TokenCache>,
        login_request: InteractiveRequest,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        let sign_up_request = InteractiveRequest::new(login_request.scopes.clone(), Prompt::Create);
        Self {
            provider,
            cache,
            login_request,
            sign_up_request,
            on_authenticated: None,
            state,
            initialized: AtomicBool::new(false),
            driver: Mutex::new(()),
        }
    }

    /// Controller using the configured login scopes.
    pub fn from_config(
        provider: Arc<dyn IdentityProvider>,
        cache: Arc<TokenCache>,
        config: &common::Config,
    ) -> Self {
        Self::new(provider, cache, login_request(config))
            .with_sign_up_request(sign_up_request(config))
    }

    pub fn with_sign_up_request(mut self, request: InteractiveRequest) -> Self {
        self.sign_up_request = request;
        self
    }

    /// Register the callback invoked when the session becomes authenticated.
    pub fn on_authenticated(mut self, callback: impl Fn(&Account) + Send + Sync + 'static) -> Self {
        self.on_authenticated = Some(Box::new(callback));
        self
    }

    /// Complete the page-load redirect flow.
    ///
    /// Runs once per controller; later calls return the current state
    /// without touching the provider.
    pub async fn initialize(&self) -> SessionState {
        let _driver = self.driver.lock().await;
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!(state = self.state().label(), "session already initialized");
            return self.state();
        }

        let action = self.apply(SessionEvent::PageLoaded);
        self.run(action).await
    }

    /// Start a new interactive login from `Unauthenticated` or `Error`.
    pub async fn login(&self) -> Result<SessionState> {
        let _driver = self.driver.lock().await;
        self.drive(SessionEvent::LoginRequested).await
    }

    /// Start account creation from `Unauthenticated` or `Error`.
    pub async fn sign_up(&self) -> Result<SessionState> {
        let _driver = self.driver.lock().await;
        self.drive(SessionEvent::SignUpRequested).await
    }

    /// Sign out: drop cached tokens and return to `Unauthenticated`.
    pub async fn sign_out(&self) -> Result<SessionState> {
        let _driver = self.driver.lock().await;
        self.drive(SessionEvent::SignedOut).await
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Signed-in account, if any.
    pub fn account(&self) -> Option<Account> {
        self.state.borrow().account().cloned()
    }

    /// Signed-in account, or `NoActiveSession`.
    pub fn require_account(&self) -> Result<Account> {
        self.account().ok_or(Error::NoActiveSession)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Authenticated { .. })
    }

    /// Whether the signed-in account carries the provider's admin claim.
    pub fn is_admin(&self) -> bool {
        self.state
            .borrow()
            .account()
            .is_some_and(Account::is_admin)
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run `render` only while authenticated.
    pub fn gate<T>(&self, render: impl FnOnce(&Account) -> T) -> Option<T> {
        self.account().as_ref().map(render)
    }

    async fn drive(&self, event: SessionEvent) -> Result<SessionState> {
        let from = self.state().label();
        let event_label = event.label();
        match self.apply(event) {
            SessionAction::None => Err(Error::InvalidTransition {
                state: from,
                event: event_label,
            }),
            action => Ok(self.run(action).await),
        }
    }

    /// Apply an event to the published state and return the implied action.
    fn apply(&self, event: SessionEvent) -> SessionAction {
        let event_label = event.label();
        let mut action = SessionAction::None;
        self.state.send_modify(|state| {
            let current = std::mem::replace(state, SessionState::Uninitialized);
            let from = current.label();
            let (next, next_action) = handle_event(current, event);
            debug!(from, to = next.label(), event = event_label, "session transition");
            *state = next;
            action = next_action;
        });
        action
    }

    /// Execute actions until one ends the flow.
    async fn run(&self, mut action: SessionAction) -> SessionState {
        loop {
            action = match action {
                SessionAction::CompleteRedirect => {
                    let event = match self.provider.complete_redirect_session().await {
                        Ok(result) => SessionEvent::RedirectResolved {
                            result,
                            known_accounts: self.provider.all_accounts(),
                        },
                        Err(error) => {
                            if error.is_interaction_in_progress() {
                                warn!(error = %error, "redirect completion raced another interaction");
                            }
                            SessionEvent::RedirectFailed { error }
                        }
                    };
                    self.apply(event)
                }
                SessionAction::InitiateLogin => match self.navigate(&self.login_request).await {
                    Some(event) => self.apply(event),
                    None => break,
                },
                SessionAction::InitiateSignUp => match self.navigate(&self.sign_up_request).await {
                    Some(event) => self.apply(event),
                    None => break,
                },
                SessionAction::NotifyAuthenticated(account) => {
                    self.provider.set_active_account(Some(account.clone()));
                    info!(account = %account.home_account_id, "session authenticated");
                    if let Some(callback) = &self.on_authenticated {
                        callback(&account);
                    }
                    break;
                }
                SessionAction::ReportFailure(message) => {
                    error!(error = %message, "session initialization failed");
                    break;
                }
                SessionAction::ClearTokens => {
                    self.provider.set_active_account(None);
                    self.cache.clear().await;
                    info!("signed out, cached tokens dropped");
                    break;
                }
                SessionAction::None => break,
            };
        }
        self.state()
    }

    /// Start a login-style redirect. Returns the failure event if it could
    /// not be started.
    async fn navigate(&self, request: &InteractiveRequest) -> Option<SessionEvent> {
        match self.provider.initiate_login(request).await {
            Ok(()) => {
                info!(prompt = request.prompt.as_str(), "login redirect started");
                None
            }
            Err(error) => Some(SessionEvent::LoginFailed { error }),
        }
    }
}
