//! Backend authentication endpoints.
//!
//! Two response shapes exist in the wild and are not wire-compatible:
//! - `envelope`: `{message, statusCode, succeeded, data: {sessionToken}}`
//! - `direct`: `{user, token, refreshToken?}`
//!
//! Both are normalised into a [`SessionGrant`]. `refreshToken` is ignored;
//! renewal goes through `/auth/refresh` with the session token.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::gateway::Gateway;
use crate::auth::AuthError;
use crate::config::ApiVariant;
use crate::identity::ProviderCredential;
use crate::session::User;

/// Fallback when the backend refuses without saying why.
const REJECTED_FALLBACK: &str = "Login failed";

/// Session issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub session_token: String,
    /// Present only when the backend returns a profile.
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    succeeded: bool,
    #[serde(default)]
    data: Option<SessionData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionData {
    #[serde(default)]
    session_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectResponse {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MicrosoftLogin<'a> {
    email: &'a str,
    name: &'a str,
    microsoft_id: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordLogin<'a> {
    email: &'a str,
    password: &'a str,
}

fn rejected(message: Option<String>) -> AuthError {
    AuthError::Rejected(
        message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| REJECTED_FALLBACK.to_string()),
    )
}

impl Envelope {
    fn into_grant(self) -> Result<SessionGrant, AuthError> {
        debug!(
            succeeded = self.succeeded,
            status_code = ?self.status_code,
            "session envelope received"
        );
        let token = self
            .data
            .and_then(|data| data.session_token)
            .filter(|token| !token.is_empty());
        match token {
            Some(session_token) if self.succeeded => Ok(SessionGrant {
                session_token,
                user: None,
            }),
            _ => Err(rejected(self.message)),
        }
    }
}

impl DirectResponse {
    fn into_grant(self) -> Result<SessionGrant, AuthError> {
        match self.token.filter(|token| !token.is_empty()) {
            Some(session_token) => Ok(SessionGrant {
                session_token,
                user: self.user,
            }),
            None => Err(rejected(self.message)),
        }
    }
}

/// Client for `/auth/*`.
#[derive(Debug, Clone)]
pub struct AuthApi {
    gateway: Gateway,
    variant: ApiVariant,
}

impl AuthApi {
    pub fn new(gateway: Gateway, variant: ApiVariant) -> Self {
        Self { gateway, variant }
    }

    /// Exchanges a provider credential for a backend session.
    ///
    /// # Errors
    /// Returns `Rejected` when the backend refuses, `Api` on transport or
    /// status failures.
    pub async fn exchange(&self, credential: &ProviderCredential) -> Result<SessionGrant, AuthError> {
        match self.variant {
            ApiVariant::Envelope => {
                let envelope: Envelope = self
                    .gateway
                    .post("/auth/login", &json!({ "token": credential.access_token }))
                    .await?;
                envelope.into_grant()
            }
            ApiVariant::Direct => {
                let account = &credential.account;
                let body = MicrosoftLogin {
                    email: &account.username,
                    name: &account.name,
                    microsoft_id: &account.home_account_id,
                };
                let response: DirectResponse = self
                    .gateway
                    .post_with_bearer("/auth/microsoft", &body, &credential.access_token)
                    .await?;
                response.into_grant()
            }
        }
    }

    /// Username/password sign-in.
    ///
    /// # Errors
    /// Same as [`AuthApi::exchange`].
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionGrant, AuthError> {
        let body = PasswordLogin { email, password };
        match self.variant {
            ApiVariant::Envelope => {
                let envelope: Envelope = self.gateway.post("/auth/loginbyusername", &body).await?;
                envelope.into_grant()
            }
            ApiVariant::Direct => {
                let response: DirectResponse = self.gateway.post("/auth/login", &body).await?;
                response.into_grant()
            }
        }
    }

    /// Asks the backend for a fresh session token.
    ///
    /// # Errors
    /// Same as [`AuthApi::exchange`].
    pub async fn refresh(&self) -> Result<SessionGrant, AuthError> {
        match self.variant {
            ApiVariant::Envelope => {
                let envelope: Envelope = self.gateway.post_empty("/auth/newsessiontoken").await?;
                envelope.into_grant()
            }
            ApiVariant::Direct => {
                let response: DirectResponse = self.gateway.post_empty("/auth/refresh").await?;
                response.into_grant()
            }
        }
    }

    /// Ends the backend session.
    ///
    /// # Errors
    /// Returns the gateway error.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.gateway
            .send_empty(reqwest::Method::POST, "/auth/logout")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::identity::ProviderAccount;
    use crate::session::SessionStore;

    fn credential() -> ProviderCredential {
        ProviderCredential {
            access_token: "graph-token".to_string(),
            account: ProviderAccount {
                home_account_id: "h1".to_string(),
                username: "a@b.com".to_string(),
                name: "A B".to_string(),
            },
        }
    }

    fn api(server: &MockServer, variant: ApiVariant) -> AuthApi {
        AuthApi::new(
            Gateway::new(&server.uri(), SessionStore::in_memory()),
            variant,
        )
    }

    #[tokio::test]
    async fn test_envelope_exchange_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({"token": "graph-token"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "ok",
                "statusCode": 200,
                "succeeded": true,
                "data": {"sessionToken": "abc"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = api(&server, ApiVariant::Envelope)
            .exchange(&credential())
            .await
            .unwrap();
        assert_eq!(grant.session_token, "abc");
        assert!(grant.user.is_none());
    }

    #[tokio::test]
    async fn test_envelope_exchange_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "succeeded": false,
                "message": "bad token"
            })))
            .mount(&server)
            .await;

        let err = api(&server, ApiVariant::Envelope)
            .exchange(&credential())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Rejected(ref m) if m == "bad token"));
    }

    #[tokio::test]
    async fn test_envelope_success_without_token_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "succeeded": true,
                "data": {"sessionToken": ""}
            })))
            .mount(&server)
            .await;

        let err = api(&server, ApiVariant::Envelope)
            .exchange(&credential())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Login failed");
    }

    #[tokio::test]
    async fn test_direct_exchange_sends_profile_with_provider_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/microsoft"))
            .and(header("authorization", "Bearer graph-token"))
            .and(body_json(json!({
                "email": "a@b.com",
                "name": "A B",
                "microsoftId": "h1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": "u-9", "name": "A B", "email": "a@b.com", "role": "admin"},
                "token": "session-9",
                "refreshToken": "r-9"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = api(&server, ApiVariant::Direct)
            .exchange(&credential())
            .await
            .unwrap();
        assert_eq!(grant.session_token, "session-9");
        assert_eq!(grant.user.unwrap().role, "admin");
    }

    #[tokio::test]
    async fn test_password_login_endpoints_per_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/loginbyusername"))
            .and(body_json(json!({"email": "a@b.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "succeeded": true,
                "data": {"sessionToken": "env"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({"email": "a@b.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "dir"})))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = api(&server, ApiVariant::Envelope)
            .login_with_password("a@b.com", "pw")
            .await
            .unwrap();
        assert_eq!(envelope.session_token, "env");

        let direct = api(&server, ApiVariant::Direct)
            .login_with_password("a@b.com", "pw")
            .await
            .unwrap();
        assert_eq!(direct.session_token, "dir");
    }

    #[tokio::test]
    async fn test_refresh_and_logout_paths() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/newsessiontoken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "succeeded": true,
                "data": {"sessionToken": "next"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "next-b"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = api(&server, ApiVariant::Envelope);
        assert_eq!(envelope.refresh().await.unwrap().session_token, "next");
        envelope.logout().await.unwrap();

        let direct = api(&server, ApiVariant::Direct);
        assert_eq!(direct.refresh().await.unwrap().session_token, "next-b");
    }
}
