//! CLI command handlers.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use fdrz_core::api::{ApiError, AuthApi, Gateway};
use fdrz_core::auth::{AuthError, AuthOrchestrator, AuthSettings};
use fdrz_core::config::Config;
use fdrz_core::identity::microsoft::{AuthorizationUi, MicrosoftIdentity};
use fdrz_core::session::{FileTokenStorage, SessionStore};

pub mod auth;
pub mod config;
pub mod users;
pub mod workflows;

const NOT_LOGGED_IN: &str = "Not logged in. Run `fdrz login`.";
const SESSION_EXPIRED: &str = "Session expired. Run `fdrz login` again.";

/// Everything a command needs, wired once per invocation.
pub struct App {
    pub config: Config,
    pub store: SessionStore,
    pub gateway: Gateway,
    pub auth: AuthOrchestrator<MicrosoftIdentity>,
    session_path: PathBuf,
}

impl App {
    pub fn new(config: Config, home: &Path) -> Result<Self> {
        let storage = FileTokenStorage::in_home(home);
        let session_path = storage.path().to_path_buf();
        let store = SessionStore::new(storage);

        let gateway =
            Gateway::from_config(&config.api, store.clone()).context("build API client")?;
        let provider = MicrosoftIdentity::from_config(&config.identity, home)
            .context("configure Microsoft sign-in")?
            .with_ui(TerminalUi);
        let auth = AuthOrchestrator::new(
            store.clone(),
            AuthApi::new(gateway.clone(), config.api.variant),
            provider,
        )
        .with_settings(AuthSettings::from_config(&config));

        Ok(Self {
            config,
            store,
            gateway,
            auth,
            session_path,
        })
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Restores the stored session and returns its token.
    pub async fn require_token(&self) -> Result<String> {
        self.auth.restore().await;
        self.store.token().ok_or_else(|| anyhow!(NOT_LOGGED_IN))
    }
}

/// Maps a backend failure to a user-facing error.
pub fn api_error(err: ApiError) -> anyhow::Error {
    if err.is_unauthorized() {
        anyhow!(SESSION_EXPIRED)
    } else {
        anyhow::Error::new(err)
    }
}

/// Maps a flow failure to the message recorded on the session.
pub fn auth_error(err: AuthError) -> anyhow::Error {
    match err {
        AuthError::Api(err) if err.is_unauthorized() => anyhow!(SESSION_EXPIRED),
        other => anyhow!(other.user_message()),
    }
}

/// Prints sign-in instructions and reads a pasted redirect from the terminal.
struct TerminalUi;

impl AuthorizationUi for TerminalUi {
    fn show_sign_in_url(&self, url: &str) {
        println!("To sign in with your Microsoft account:");
        println!();
        println!("  1. A browser window will open (or visit the URL below)");
        println!("  2. Sign in and approve access");
        println!("  3. If redirected to localhost, return here to continue");
        println!("  4. Otherwise, paste the full redirect URL");
        println!();
        println!("Authorization URL:");
        println!("  {url}");
        println!();
    }

    fn show_sign_out_url(&self, url: &str) {
        println!("To finish signing out of Microsoft, visit:");
        println!("  {url}");
    }

    fn read_redirect(&self) -> Option<String> {
        if !io::stdin().is_terminal() {
            return None;
        }
        print!("Paste the redirect URL (or authorization code): ");
        io::stdout().flush().ok()?;
        let mut input = String::new();
        io::stdin().lock().read_line(&mut input).ok()?;
        let input = input.trim();
        (!input.is_empty()).then(|| input.to_string())
    }
}
