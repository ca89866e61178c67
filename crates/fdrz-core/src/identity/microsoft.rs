//! Microsoft identity platform provider.
//!
//! Interactive sign-in is an authorization-code flow with PKCE: the system
//! browser is pointed at `{authority}/oauth2/v2.0/authorize` and the code comes
//! back through the loopback listener (or a pasted redirect URL). The signed-in
//! account and its refresh token are cached in `accounts.json` so later runs can
//! acquire tokens silently.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use super::callback::{self, CALLBACK_TIMEOUT, CallbackListener, Redirect};
use super::{IdentityProvider, ProviderAccount, ProviderCredential, ProviderError};
use crate::config::IdentityConfig;
use crate::session::storage::write_private;
use crate::token::decode_claims;

/// Account cache filename.
const ACCOUNTS_FILE: &str = "accounts.json";

/// Set to skip opening the system browser.
pub const ENV_NO_BROWSER: &str = "FDRZ_NO_BROWSER";

/// Scopes always requested alongside the configured ones.
const BASE_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// Terminal-side hooks for the interactive flow.
pub trait AuthorizationUi: Send + Sync {
    /// Called with the sign-in URL before waiting for the redirect.
    fn show_sign_in_url(&self, url: &str);

    /// Called with the provider sign-out URL.
    fn show_sign_out_url(&self, _url: &str) {}

    /// Asks for a pasted redirect URL when the loopback listener got nothing.
    fn read_redirect(&self) -> Option<String>;
}

/// Headless UI: shows nothing and cannot prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUi;

impl AuthorizationUi for NoUi {
    fn show_sign_in_url(&self, _url: &str) {}

    fn read_redirect(&self) -> Option<String> {
        None
    }
}

/// PKCE code verifier and challenge.
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

/// Generates a PKCE verifier (32 random bytes) and its S256 challenge.
pub fn generate_pkce() -> Pkce {
    let mut verifier_bytes = [0u8; 32];
    verifier_bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    verifier_bytes[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    Pkce {
        verifier,
        challenge,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountCache {
    account: ProviderAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Identity provider backed by the Microsoft identity platform.
#[derive(Clone)]
pub struct MicrosoftIdentity {
    client_id: String,
    authority: String,
    redirect_uri: Url,
    scopes: Vec<String>,
    cache_path: PathBuf,
    http: reqwest::Client,
    ui: Arc<dyn AuthorizationUi>,
    open_browser: bool,
    callback_timeout: Duration,
}

impl std::fmt::Debug for MicrosoftIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrosoftIdentity")
            .field("client_id", &self.client_id)
            .field("authority", &self.authority)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .finish_non_exhaustive()
    }
}

impl MicrosoftIdentity {
    /// Builds the provider from configuration, caching accounts under `home`.
    ///
    /// # Errors
    /// Returns an error if the redirect URI is not a valid URL.
    pub fn from_config(config: &IdentityConfig, home: &Path) -> Result<Self> {
        let redirect_uri = Url::parse(&config.redirect_uri)
            .with_context(|| format!("Invalid redirect URI '{}'", config.redirect_uri))?;

        let mut scopes = config.scopes.clone();
        for scope in BASE_SCOPES {
            if !scopes.iter().any(|s| s == scope) {
                scopes.push(scope.to_string());
            }
        }

        Ok(Self {
            client_id: config.client_id.clone(),
            authority: config.authority.trim_end_matches('/').to_string(),
            redirect_uri,
            scopes,
            cache_path: home.join(ACCOUNTS_FILE),
            http: reqwest::Client::new(),
            ui: Arc::new(NoUi),
            open_browser: std::env::var_os(ENV_NO_BROWSER).is_none(),
            callback_timeout: CALLBACK_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_ui(mut self, ui: impl AuthorizationUi + 'static) -> Self {
        self.ui = Arc::new(ui);
        self
    }

    #[must_use]
    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    #[must_use]
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/oauth2/v2.0/{name}", self.authority)
    }

    fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    /// Builds the authorization URL for one sign-in attempt.
    pub fn authorize_url(&self, pkce: &Pkce, state: &str, redirect_uri: &str) -> String {
        let scope = self.scope_param();
        let params = [
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("response_mode", "query"),
            ("scope", scope.as_str()),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", state),
            ("prompt", "select_account"),
        ];
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        format!("{}?{query}", self.endpoint("authorize"))
    }

    /// Builds the sign-out URL.
    pub fn logout_url(&self) -> String {
        let mut post_logout = self.redirect_uri.clone();
        post_logout.set_path("/");
        post_logout.set_query(None);
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("post_logout_redirect_uri", post_logout.as_str())
            .finish();
        format!("{}?{query}", self.endpoint("logout"))
    }

    fn open(&self, url: &str) {
        if self.open_browser
            && let Err(err) = open::that(url)
        {
            debug!(error = %err, "could not open browser");
        }
    }

    fn load_cache(&self) -> Result<Option<AccountCache>> {
        if !self.cache_path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.cache_path)
            .with_context(|| format!("Failed to read {}", self.cache_path.display()))?;
        let cache = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.cache_path.display()))?;
        Ok(Some(cache))
    }

    fn save_cache(&self, cache: &AccountCache) {
        let result = serde_json::to_string_pretty(cache)
            .context("Failed to serialize account cache")
            .and_then(|json| write_private(&self.cache_path, &json));
        if let Err(err) = result {
            warn!(error = %format!("{err:#}"), "failed to save account cache");
        }
    }

    fn clear_cache(&self) -> Result<bool> {
        if !self.cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.cache_path)
            .with_context(|| format!("Failed to remove {}", self.cache_path.display()))?;
        Ok(true)
    }

    /// Binds the loopback listener; a port of 0 becomes an ephemeral port.
    fn bind_callback(&self) -> (Option<CallbackListener>, Url) {
        let mut redirect_uri = self.redirect_uri.clone();
        let is_loopback = matches!(
            redirect_uri.host_str(),
            Some("localhost" | "127.0.0.1")
        );
        if !is_loopback {
            return (None, redirect_uri);
        }
        let port = redirect_uri.port_or_known_default().unwrap_or(0);
        match CallbackListener::bind(port, redirect_uri.path()) {
            Ok(listener) => {
                if port == 0
                    && let Ok(addr) = listener.local_addr()
                {
                    let _ = redirect_uri.set_port(Some(addr.port()));
                }
                (Some(listener), redirect_uri)
            }
            Err(err) => {
                debug!(port, error = %err, "callback port unavailable, using paste fallback");
                (None, redirect_uri)
            }
        }
    }

    async fn wait_for_code(
        &self,
        listener: Option<CallbackListener>,
        state: &str,
    ) -> Result<String, ProviderError> {
        if let Some(listener) = listener {
            let expected = state.to_string();
            let timeout = self.callback_timeout;
            let redirect = tokio::task::spawn_blocking(move || listener.wait(&expected, timeout))
                .await
                .map_err(|err| ProviderError::Failed(format!("Callback listener failed: {err}")))?;
            if let Some(redirect) = redirect {
                return redirect.into_code();
            }
        }

        let ui = Arc::clone(&self.ui);
        let input = tokio::task::spawn_blocking(move || ui.read_redirect())
            .await
            .map_err(|err| ProviderError::Failed(format!("Prompt failed: {err}")))?
            .ok_or(ProviderError::Cancelled)?;

        let (code, provided_state) = callback::parse_authorization_input(&input);
        if let Some(provided) = provided_state
            && provided != state
        {
            return Err(ProviderError::StateMismatch);
        }
        match code {
            Some(code) => Redirect::Code(code).into_code(),
            None => Err(ProviderError::Cancelled),
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ProviderError> {
        let response = self
            .http
            .post(self.endpoint("token"))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            let message = parsed
                .error_description
                .or(parsed.error)
                .unwrap_or_else(|| format!("Token request failed (HTTP {status})"));
            return Err(ProviderError::Failed(message));
        }

        Ok(response.json().await?)
    }

    fn credential_from(
        &self,
        token: TokenResponse,
        fallback: Option<&ProviderAccount>,
    ) -> Result<ProviderCredential, ProviderError> {
        let account = token
            .id_token
            .as_deref()
            .and_then(account_from_id_token)
            .or_else(|| fallback.cloned())
            .ok_or_else(|| {
                ProviderError::Failed("Token response did not identify the account".to_string())
            })?;

        self.save_cache(&AccountCache {
            account: account.clone(),
            refresh_token: token.refresh_token,
        });

        Ok(ProviderCredential {
            access_token: token.access_token,
            account,
        })
    }
}

/// Projects ID token claims onto the account fields the client reads.
fn account_from_id_token(id_token: &str) -> Option<ProviderAccount> {
    let claims = decode_claims(id_token)?;
    let text = |key: &str| claims.get(key).and_then(|v| v.as_str()).map(str::to_string);

    let home_account_id = match (text("oid"), text("tid")) {
        (Some(oid), Some(tid)) => format!("{oid}.{tid}"),
        _ => text("sub")?,
    };
    let username = text("preferred_username")
        .or_else(|| text("email"))
        .unwrap_or_default();
    let name = text("name").unwrap_or_else(|| username.clone());

    Some(ProviderAccount {
        home_account_id,
        username,
        name,
    })
}

impl IdentityProvider for MicrosoftIdentity {
    fn cached_account(&self) -> Option<ProviderAccount> {
        match self.load_cache() {
            Ok(cache) => cache.map(|c| c.account),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "ignoring unreadable account cache");
                None
            }
        }
    }

    async fn acquire_interactive(&self) -> Result<ProviderCredential, ProviderError> {
        let pkce = generate_pkce();
        let state = uuid::Uuid::new_v4().to_string();
        let (listener, redirect_uri) = self.bind_callback();
        let auth_url = self.authorize_url(&pkce, &state, redirect_uri.as_str());

        self.ui.show_sign_in_url(&auth_url);
        self.open(&auth_url);

        let code = self.wait_for_code(listener, &state).await?;
        debug!("authorization code received, exchanging");

        let scope = self.scope_param();
        let token = self
            .token_request(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("code_verifier", pkce.verifier.as_str()),
                ("scope", scope.as_str()),
            ])
            .await?;

        let credential = self.credential_from(token, None)?;
        info!(account = %credential.account.username, "signed in to Microsoft identity");
        Ok(credential)
    }

    async fn acquire_silent(
        &self,
        account: &ProviderAccount,
    ) -> Result<ProviderCredential, ProviderError> {
        let cache = self
            .load_cache()
            .map_err(|err| ProviderError::Failed(format!("{err:#}")))?
            .filter(|cache| cache.account.home_account_id == account.home_account_id)
            .ok_or(ProviderError::NoAccount)?;
        let refresh_token = cache.refresh_token.ok_or_else(|| {
            ProviderError::Failed("Interaction required: no refresh token cached".to_string())
        })?;

        let scope = self.scope_param();
        let token = self
            .token_request(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("scope", scope.as_str()),
            ])
            .await?;

        let token = TokenResponse {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or(Some(refresh_token)),
            id_token: token.id_token,
        };
        self.credential_from(token, Some(&cache.account))
    }

    async fn logout_interactive(&self) -> Result<(), ProviderError> {
        self.clear_cache()
            .map_err(|err| ProviderError::Failed(format!("{err:#}")))?;
        let url = self.logout_url();
        self.ui.show_sign_out_url(&url);
        self.open(&url);
        Ok(())
    }
}
