//! Authentication flows over the session store, backend and identity provider.

mod error;
mod orchestrator;

pub use error::{AuthError, GENERIC_LOGIN_FAILURE};
pub use orchestrator::{AuthOrchestrator, AuthSettings, LOGOUT_FAILED};
