//! Session state and its transitions.
//!
//! Every transition goes through [`SessionState::apply`], which finishes by
//! reconciling `status` with the rest of the record:
//! - `LoggedIn` iff both `user` and `token` are present
//! - `Failed` implies `error` is set

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::ProviderAccount;

/// Role assigned when the backend does not supply one.
pub const DEFAULT_ROLE: &str = "user";

/// Identity record of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

impl User {
    /// Builds a user from provider claims (the backend returns no profile).
    pub fn from_account(account: &ProviderAccount) -> Self {
        Self {
            id: account.home_account_id.clone(),
            name: account.name.clone(),
            email: account.username.clone(),
            role: DEFAULT_ROLE.to_string(),
            department: None,
        }
    }
}

/// Authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthStatus {
    #[default]
    Initial,
    LoggedIn,
    Failed,
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthStatus::Initial => "initial",
            AuthStatus::LoggedIn => "logged in",
            AuthStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Snapshot of the client-side authentication session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub user: Option<User>,
    pub token: Option<String>,
    /// Provider account remembered from the last sign-in.
    pub account: Option<ProviderAccount>,
    pub status: AuthStatus,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Named transitions.
#[derive(Debug, Clone)]
pub(crate) enum SessionAction {
    SetLoading(bool),
    SetUser(User),
    SetToken(String),
    SetAccount(Option<ProviderAccount>),
    SetError(Option<String>),
    Login { user: User, token: String },
    Logout,
    ClearError,
}

/// Durable-storage side effect of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StorageEffect {
    Write(String),
    Remove,
}

impl SessionAction {
    pub(crate) fn storage_effect(&self) -> Option<StorageEffect> {
        match self {
            SessionAction::SetToken(token) | SessionAction::Login { token, .. } => {
                Some(StorageEffect::Write(token.clone()))
            }
            SessionAction::Logout => Some(StorageEffect::Remove),
            _ => None,
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::LoggedIn
    }

    /// Applies a transition. Total: never fails, always yields a valid state.
    pub(crate) fn apply(&mut self, action: SessionAction) {
        match action {
            SessionAction::SetLoading(flag) => self.is_loading = flag,
            SessionAction::SetUser(user) => {
                self.user = Some(user);
                self.error = None;
                self.status = AuthStatus::LoggedIn;
            }
            SessionAction::SetToken(token) => self.token = Some(token),
            SessionAction::SetAccount(account) => self.account = account,
            SessionAction::SetError(message) => {
                if message.is_some() {
                    self.status = AuthStatus::Failed;
                }
                self.error = message;
            }
            SessionAction::Login { user, token } => {
                self.user = Some(user);
                self.token = Some(token);
                self.is_loading = false;
                self.error = None;
                self.status = AuthStatus::LoggedIn;
            }
            SessionAction::Logout => *self = SessionState::default(),
            SessionAction::ClearError => self.error = None,
        }
        self.reconcile();
    }

    fn reconcile(&mut self) {
        let has_session = self.user.is_some() && self.token.is_some();
        self.status = match self.status {
            // An error while a full session is held is reported, not demoting.
            _ if has_session => AuthStatus::LoggedIn,
            AuthStatus::LoggedIn => AuthStatus::Initial,
            AuthStatus::Failed if self.error.is_none() => AuthStatus::Initial,
            status => status,
        };
    }
}
