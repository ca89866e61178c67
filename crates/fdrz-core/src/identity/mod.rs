//! Identity provider seam.
//!
//! The orchestrator only reads three fields from a provider account, so the
//! provider's full account shape never leaks past this module.

pub mod callback;
pub mod microsoft;

use std::future::Future;

use serde::{Deserialize, Serialize};

pub use microsoft::{AuthorizationUi, MicrosoftIdentity, NoUi};

/// Narrow projection of a signed-in provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAccount {
    pub home_account_id: String,
    pub username: String,
    pub name: String,
}

/// Credential returned by the identity provider.
#[derive(Debug, Clone)]
pub struct ProviderCredential {
    pub access_token: String,
    pub account: ProviderAccount,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("No saved accounts found")]
    NoAccount,
    #[error("Sign-in was cancelled or timed out")]
    Cancelled,
    #[error("State mismatch in authorization response")]
    StateMismatch,
    #[error("Identity provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{0}")]
    Failed(String),
}

/// External identity service (popup/silent acquisition, interactive logout).
pub trait IdentityProvider: Send + Sync {
    /// Returns the account remembered from a previous sign-in, if any.
    fn cached_account(&self) -> Option<ProviderAccount>;

    /// Acquires a credential with user interaction.
    fn acquire_interactive(
        &self,
    ) -> impl Future<Output = Result<ProviderCredential, ProviderError>> + Send;

    /// Acquires a credential for a cached account without user interaction.
    fn acquire_silent(
        &self,
        account: &ProviderAccount,
    ) -> impl Future<Output = Result<ProviderCredential, ProviderError>> + Send;

    /// Signs the user out of the provider.
    fn logout_interactive(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;
}
