//! Sign-in, sign-out and refresh flows.
//!
//! Each flow raises `is_loading` on entry and always lowers it on exit. A
//! failure is written to the session's `error` field and also returned.

use tracing::{debug, error, info, warn};

use super::error::AuthError;
use crate::api::{AuthApi, SessionGrant};
use crate::config::Config;
use crate::identity::{IdentityProvider, ProviderCredential, ProviderError};
use crate::session::state::DEFAULT_ROLE;
use crate::session::{SessionStore, User};
use crate::token::{self, DEFAULT_EXPIRY_BUFFER_SECS};

/// Message recorded when the provider sign-out fails.
pub const LOGOUT_FAILED: &str = "Logout failed";

/// Knobs for the flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    /// Silent sign-in falls back to interactive when acquisition fails.
    pub interactive_fallback: bool,
    /// `restore` attempts a silent sign-in when no usable token is held.
    pub auto_login: bool,
    pub expiry_buffer_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            interactive_fallback: true,
            auto_login: true,
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS,
        }
    }
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interactive_fallback: config.identity.interactive_fallback,
            auto_login: config.session.auto_login,
            expiry_buffer_secs: config.session.expiry_buffer_secs,
        }
    }
}

/// Sequences provider acquisition with the backend exchange.
pub struct AuthOrchestrator<P> {
    store: SessionStore,
    api: AuthApi,
    provider: P,
    settings: AuthSettings,
}

impl<P: IdentityProvider> AuthOrchestrator<P> {
    pub fn new(store: SessionStore, api: AuthApi, provider: P) -> Self {
        Self {
            store,
            api,
            provider,
            settings: AuthSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: AuthSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Interactive sign-in through the identity provider.
    ///
    /// # Errors
    /// Returns the provider or backend failure after recording it.
    pub async fn login(&self) -> Result<(), AuthError> {
        self.store.set_loading(true);
        let result = self.interactive_flow().await;
        self.finish(result, "interactive login failed")
    }

    /// Sign-in with the cached provider account and no user interaction.
    ///
    /// When acquisition fails and fallback is enabled, one interactive
    /// attempt follows; that attempt never comes back here.
    ///
    /// # Errors
    /// Returns the failure of the last attempt made.
    pub async fn login_silent(&self) -> Result<(), AuthError> {
        self.store.set_loading(true);
        let result = match self.silent_flow().await {
            Err(AuthError::Provider(err)) if self.settings.interactive_fallback => {
                warn!(error = %err, "silent acquisition failed, falling back to interactive login");
                self.interactive_flow().await
            }
            other => other,
        };
        self.finish(result, "silent login failed")
    }

    /// Startup sign-in: one silent attempt when a cached account exists.
    ///
    /// Failure is logged and swallowed, leaving the session at `initial`.
    /// Returns true if a session was established.
    pub async fn auto_login(&self) -> bool {
        let Some(account) = self.provider.cached_account() else {
            debug!("no cached account, skipping auto-login");
            return false;
        };
        self.store.set_account(Some(account));

        self.store.set_loading(true);
        let result = self.silent_flow().await;
        self.store.set_loading(false);

        match result {
            Ok(()) => true,
            Err(err) => {
                info!(error = %err, "silent login failed, user interaction required");
                self.store.clear_error();
                false
            }
        }
    }

    /// Signs out of the backend (best effort) and the identity provider.
    ///
    /// # Errors
    /// Returns `Logout` if the provider sign-out failed; the session is kept.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.store.set_loading(true);

        if self.store.token().is_some()
            && let Err(err) = self.api.logout().await
        {
            warn!(error = %err, "backend logout failed");
        }

        let result = match self.provider.logout_interactive().await {
            Ok(()) => {
                self.store.logout();
                info!("signed out");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "provider logout failed");
                self.store.set_error(Some(LOGOUT_FAILED.to_string()));
                Err(AuthError::Logout(LOGOUT_FAILED.to_string()))
            }
        };

        self.store.set_loading(false);
        result
    }

    /// Username/password sign-in against the backend only.
    ///
    /// # Errors
    /// Returns the backend failure after recording it.
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.store.set_loading(true);
        let result = match self.api.login_with_password(email, password).await {
            Ok(grant) => {
                let user = grant.user.unwrap_or_else(|| User {
                    id: email.to_string(),
                    name: email.to_string(),
                    email: email.to_string(),
                    role: DEFAULT_ROLE.to_string(),
                    department: None,
                });
                info!(user = %user.email, "signed in with password");
                self.store.login(user, grant.session_token);
                Ok(())
            }
            Err(err) => Err(err),
        };
        self.finish(result, "password login failed")
    }

    /// Replaces the session token with a fresh one from the backend.
    ///
    /// # Errors
    /// Returns the backend failure after recording it.
    pub async fn refresh_session(&self) -> Result<(), AuthError> {
        self.store.set_loading(true);
        let result = match self.api.refresh().await {
            Ok(SessionGrant {
                session_token,
                user,
            }) => {
                self.store.set_token(session_token);
                if let Some(user) = user {
                    self.store.set_user(user);
                }
                debug!("session token refreshed");
                Ok(())
            }
            Err(err) => Err(err),
        };
        self.finish(result, "session refresh failed")
    }

    /// Startup: loads the durable token and cached account, then signs in
    /// silently if configured and no usable token is held.
    ///
    /// Returns true if a token is held afterwards.
    pub async fn restore(&self) -> bool {
        self.store.restore();
        if let Some(account) = self.provider.cached_account() {
            self.store.set_account(Some(account));
        }

        let token = self.store.token();
        if self.settings.auto_login
            && token::is_token_expired(token.as_deref(), self.settings.expiry_buffer_secs)
        {
            debug!(has_token = token.is_some(), "no usable token, trying auto-login");
            self.auto_login().await;
        }
        self.store.token().is_some()
    }

    fn finish(&self, result: Result<(), AuthError>, what: &str) -> Result<(), AuthError> {
        if let Err(err) = &result {
            error!(error = %err, "{what}");
            self.store.set_error(Some(err.user_message()));
        }
        self.store.set_loading(false);
        result
    }

    async fn interactive_flow(&self) -> Result<(), AuthError> {
        let credential = self.provider.acquire_interactive().await?;
        self.complete(credential).await
    }

    async fn silent_flow(&self) -> Result<(), AuthError> {
        let account = self
            .store
            .snapshot()
            .account
            .or_else(|| self.provider.cached_account())
            .ok_or(ProviderError::NoAccount)?;
        let credential = self.provider.acquire_silent(&account).await?;
        self.complete(credential).await
    }

    async fn complete(&self, credential: ProviderCredential) -> Result<(), AuthError> {
        if credential.access_token.is_empty() {
            warn!("identity provider returned no access token, nothing to exchange");
            return Ok(());
        }

        let grant = self.api.exchange(&credential).await?;
        let ProviderCredential { account, .. } = credential;
        let user = grant
            .user
            .unwrap_or_else(|| User::from_account(&account));
        info!(user = %user.email, "signed in");

        self.store.set_account(Some(account));
        self.store.login(user, grant.session_token);
        Ok(())
    }
}
