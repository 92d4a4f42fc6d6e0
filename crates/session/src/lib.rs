//! Authentication session for the Resume Match Pro client
//!
//! Decides, once per page load, whether the user is signed in:
//! 1. Complete any redirect login the browser is returning from
//! 2. Redirect carried an account → `Authenticated`, callback notified
//! 3. No redirect and no known accounts → start interactive login
//! 4. No redirect but a known account → `Authenticated` with the first one
//! 5. `InteractionInProgress` → retry redirect completion once; any other
//!    failure → `Error` (logged, treated as signed out)
//!
//! Content gated on the controller must not render outside `Authenticated`.

pub mod controller;
pub mod error;
pub mod requests;
pub mod state;

pub use controller::{AuthenticatedCallback, SessionController};
pub use error::{Error, Result};
pub use requests::{login_request, sign_up_request};
pub use state::{SessionAction, SessionEvent, SessionState, handle_event};
