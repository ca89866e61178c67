//! Session store: the single source of truth for authentication state.
//!
//! The store is an explicitly constructed handle, cheap to clone and share
//! between the gateway and the orchestrator. State changes only through the
//! named transitions below; each one publishes at most one update to
//! subscribers, and a transition that changes nothing publishes none.
//!
//! Durable writes happen while the state lock is held, so a reader never sees
//! the in-memory token and the stored token disagree.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::state::{SessionAction, SessionState, StorageEffect, User};
use super::storage::{MemoryTokenStorage, TokenStorage};
use crate::identity::ProviderAccount;

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<SessionState>,
    storage: Box<dyn TokenStorage>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("status", &self.inner.state.borrow().status)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(storage: impl TokenStorage + 'static) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                state,
                storage: Box::new(storage),
            }),
        }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(MemoryTokenStorage::new())
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Returns the current bearer token.
    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token.clone()
    }

    /// Subscribes to state updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn set_loading(&self, flag: bool) {
        self.dispatch(SessionAction::SetLoading(flag));
    }

    pub fn set_user(&self, user: User) {
        self.dispatch(SessionAction::SetUser(user));
    }

    /// Sets the token in memory and in durable storage.
    pub fn set_token(&self, token: impl Into<String>) {
        self.dispatch(SessionAction::SetToken(token.into()));
    }

    pub fn set_account(&self, account: Option<ProviderAccount>) {
        self.dispatch(SessionAction::SetAccount(account));
    }

    /// Records an error; a message forces `Failed` unless a session is held.
    pub fn set_error(&self, message: Option<String>) {
        self.dispatch(SessionAction::SetError(message));
    }

    /// Compound sign-in: user, token, status, loading and error in one update.
    pub fn login(&self, user: User, token: impl Into<String>) {
        self.dispatch(SessionAction::Login {
            user,
            token: token.into(),
        });
    }

    /// Clears the session and removes the stored token. Idempotent.
    pub fn logout(&self) {
        self.dispatch(SessionAction::Logout);
    }

    pub fn clear_error(&self) {
        self.dispatch(SessionAction::ClearError);
    }

    /// Loads a previously stored token into memory.
    ///
    /// Returns true if a token was found.
    pub fn restore(&self) -> bool {
        match self.inner.storage.load() {
            Ok(Some(token)) if !token.is_empty() => {
                debug!("restored session token from storage");
                self.set_token(token);
                true
            }
            Ok(_) => false,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to read stored session token");
                false
            }
        }
    }

    fn dispatch(&self, action: SessionAction) {
        let storage = &self.inner.storage;
        self.inner.state.send_if_modified(|state| {
            let before = state.clone();
            let effect = action.storage_effect();
            state.apply(action);
            match effect {
                Some(StorageEffect::Write(token)) => {
                    if let Err(err) = storage.store(&token) {
                        warn!(error = %format!("{err:#}"), "failed to persist session token");
                    }
                }
                Some(StorageEffect::Remove) => {
                    if let Err(err) = storage.remove() {
                        warn!(error = %format!("{err:#}"), "failed to remove stored session token");
                    }
                }
                None => {}
            }
            *state != before
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::state::{AuthStatus, DEFAULT_ROLE};

    fn user() -> User {
        User {
            id: "h1".to_string(),
            name: "A B".to_string(),
            email: "a@b.com".to_string(),
            role: DEFAULT_ROLE.to_string(),
            department: None,
        }
    }

    fn shared_store() -> (SessionStore, Arc<MemoryTokenStorage>) {
        let storage = Arc::new(MemoryTokenStorage::new());
        (SessionStore::new(Arc::clone(&storage)), storage)
    }

    #[test]
    fn test_login_writes_token_to_storage() {
        let (store, storage) = shared_store();
        store.login(user(), "abc");

        let state = store.snapshot();
        assert_eq!(state.status, AuthStatus::LoggedIn);
        assert_eq!(state.user, Some(user()));
        assert_eq!(store.token().as_deref(), Some("abc"));
        assert_eq!(storage.peek().as_deref(), Some("abc"));
    }

    #[test]
    fn test_set_token_mirrors_storage() {
        let (store, storage) = shared_store();
        store.set_token("t1");
        assert_eq!(storage.peek().as_deref(), Some("t1"));
        store.set_token("t2");
        assert_eq!(storage.peek().as_deref(), Some("t2"));
        assert_eq!(store.token().as_deref(), Some("t2"));
    }

    #[test]
    fn test_logout_removes_storage_entry() {
        let (store, storage) = shared_store();
        store.login(user(), "abc");
        store.set_loading(true);
        store.logout();

        let state = store.snapshot();
        assert_eq!(state, SessionState::default());
        assert!(storage.peek().is_none());
    }

    #[test]
    fn test_login_publishes_single_update() {
        let store = SessionStore::in_memory();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.login(user(), "abc");
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert!(seen.is_authenticated());
        assert_eq!(seen.token.as_deref(), Some("abc"));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_second_logout_is_silent() {
        let store = SessionStore::in_memory();
        let mut rx = store.subscribe();
        store.login(user(), "abc");
        store.logout();
        rx.borrow_and_update();
        let after_first = store.snapshot();

        store.logout();
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.snapshot(), after_first);
    }

    #[test]
    fn test_restore_loads_stored_token() {
        let store = SessionStore::new(MemoryTokenStorage::with_token("persisted"));
        assert!(store.token().is_none());

        assert!(store.restore());
        let state = store.snapshot();
        assert_eq!(state.token.as_deref(), Some("persisted"));
        assert_eq!(state.status, AuthStatus::Initial);
    }

    #[test]
    fn test_restore_without_token() {
        let store = SessionStore::in_memory();
        assert!(!store.restore());
        assert!(store.token().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::in_memory();
        let other = store.clone();
        other.set_error(Some("boom".to_string()));

        let state = store.snapshot();
        assert_eq!(state.status, AuthStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("boom"));

        store.clear_error();
        assert_eq!(other.snapshot().status, AuthStatus::Initial);
    }

    #[test]
    fn test_isolated_instances() {
        let a = SessionStore::in_memory();
        let b = SessionStore::in_memory();
        a.login(user(), "abc");
        assert!(b.token().is_none());
    }
}
