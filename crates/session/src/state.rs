//! Session state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! `SessionController` executes the I/O implied by each action.

use identity::{Account, AuthenticationResult, IdentityError};

/// Authentication state of one page load.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Nothing has run yet
    Uninitialized,
    /// Waiting on redirect completion, or navigating away to log in.
    /// `retried` records that the one retry after `InteractionInProgress`
    /// has been used.
    CompletingRedirect { retried: bool },
    /// Signed in; gated content may render
    Authenticated { account: Account },
    /// Signed out in this page load
    Unauthenticated,
    /// Initialization failed; treated as not signed in
    Error { message: String },
}

impl SessionState {
    /// State label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::CompletingRedirect { .. } => "completing_redirect",
            SessionState::Authenticated { .. } => "authenticated",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Error { .. } => "error",
        }
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            SessionState::Authenticated { account } => Some(account),
            _ => None,
        }
    }
}

/// Events that drive state transitions.
#[derive(Debug)]
pub enum SessionEvent {
    /// Application started; run redirect completion
    PageLoaded,
    /// Redirect completion settled. `known_accounts` is the provider's
    /// account list read after completion.
    RedirectResolved {
        result: Option<AuthenticationResult>,
        known_accounts: Vec<Account>,
    },
    RedirectFailed { error: IdentityError },
    /// Starting the login navigation failed
    LoginFailed { error: IdentityError },
    /// User asked to sign in
    LoginRequested,
    /// User asked to create an account
    SignUpRequested,
    /// User signed out
    SignedOut,
}

impl SessionEvent {
    /// Event label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            SessionEvent::PageLoaded => "page_loaded",
            SessionEvent::RedirectResolved { .. } => "redirect_resolved",
            SessionEvent::RedirectFailed { .. } => "redirect_failed",
            SessionEvent::LoginFailed { .. } => "login_failed",
            SessionEvent::LoginRequested => "login_requested",
            SessionEvent::SignUpRequested => "sign_up_requested",
            SessionEvent::SignedOut => "signed_out",
        }
    }
}

/// Actions the controller should execute after a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Call the provider's redirect completion
    CompleteRedirect,
    /// Navigate to the interactive login
    InitiateLogin,
    /// Navigate to the account-creation flow
    InitiateSignUp,
    /// Hand the account to the registered callback
    NotifyAuthenticated(Account),
    /// Log the failure; never passed to the callback
    ReportFailure(String),
    /// Drop cached tokens
    ClearTokens,
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: SessionState, event: SessionEvent) -> (SessionState, SessionAction) {
    match (state, event) {
        // --- Uninitialized ---
        (SessionState::Uninitialized, SessionEvent::PageLoaded) => (
            SessionState::CompletingRedirect { retried: false },
            SessionAction::CompleteRedirect,
        ),

        // --- CompletingRedirect ---
        (
            SessionState::CompletingRedirect { .. },
            SessionEvent::RedirectResolved {
                result:
                    Some(AuthenticationResult {
                        account: Some(account),
                    }),
                ..
            },
        ) => authenticated(account),

        (
            SessionState::CompletingRedirect { retried },
            SessionEvent::RedirectResolved { known_accounts, .. },
        ) => match known_accounts.into_iter().next() {
            Some(account) => authenticated(account),
            // Browser navigates away; the state is rebuilt on return
            None => (
                SessionState::CompletingRedirect { retried },
                SessionAction::InitiateLogin,
            ),
        },

        (SessionState::CompletingRedirect { retried: false }, SessionEvent::RedirectFailed { error })
            if error.is_interaction_in_progress() =>
        {
            (
                SessionState::CompletingRedirect { retried: true },
                SessionAction::CompleteRedirect,
            )
        }

        (
            SessionState::CompletingRedirect { .. },
            SessionEvent::RedirectFailed { error } | SessionEvent::LoginFailed { error },
        ) => {
            let message = error.to_string();
            (
                SessionState::Error {
                    message: message.clone(),
                },
                SessionAction::ReportFailure(message),
            )
        }

        // --- Signed out or failed: a new login starts over ---
        (
            SessionState::Unauthenticated | SessionState::Error { .. },
            SessionEvent::LoginRequested,
        ) => (
            SessionState::CompletingRedirect { retried: false },
            SessionAction::InitiateLogin,
        ),
        (
            SessionState::Unauthenticated | SessionState::Error { .. },
            SessionEvent::SignUpRequested,
        ) => (
            SessionState::CompletingRedirect { retried: false },
            SessionAction::InitiateSignUp,
        ),

        (
            SessionState::Authenticated { .. }
            | SessionState::Unauthenticated
            | SessionState::Error { .. },
            SessionEvent::SignedOut,
        ) => (SessionState::Unauthenticated, SessionAction::ClearTokens),

        // Anything else leaves the state untouched
        (state, _) => (state, SessionAction::None),
    }
}

fn authenticated(account: Account) -> (SessionState, SessionAction) {
    (
        SessionState::Authenticated {
            account: account.clone(),
        },
        SessionAction::NotifyAuthenticated(account),
    )
}
