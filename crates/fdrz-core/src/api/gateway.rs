//! Authenticated request gateway.
//!
//! Every backend call goes through [`Gateway`]. It attaches the session's
//! bearer token, always sends a JSON content type, and on a 401 clears the
//! session before handing the error back. Requests are never retried here.

use anyhow::Context;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::ApiError;
use crate::config::ApiConfig;
use crate::session::SessionStore;

/// Which bearer token a request carries.
#[derive(Debug, Clone, Copy)]
enum Bearer<'a> {
    /// The token currently held by the session store, if any.
    Session,
    /// A caller-supplied token (e.g. the identity provider's access token).
    Explicit(&'a str),
}

#[derive(Debug, Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
    store: SessionStore,
}

impl Gateway {
    pub fn new(base_url: &str, store: SessionStore) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, store)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str, store: SessionStore) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        }
    }

    /// Builds a gateway with the configured base URL and timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &ApiConfig, store: SessionStore) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;
        Ok(Self::with_client(http, &config.base_url, store))
    }

    fn url(&self, path: &str) -> Result<url::Url, ApiError> {
        Ok(url::Url::parse(&format!("{}{path}", self.base_url))?)
    }

    /// GET `path` and decode the JSON response.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(Method::GET, path, None::<&()>, Bearer::Session)
            .await
    }

    /// POST a JSON body to `path`.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, Some(body), Bearer::Session)
            .await
    }

    /// POST without a body.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(Method::POST, path, None::<&()>, Bearer::Session)
            .await
    }

    /// POST authenticated with `bearer` instead of the session token.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn post_with_bearer<B, T>(
        &self,
        path: &str,
        body: &B,
        bearer: &str,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, Some(body), Bearer::Explicit(bearer))
            .await
    }

    /// PATCH a JSON body to `path`.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, Some(body), Bearer::Session)
            .await
    }

    /// DELETE `path`, ignoring any response body.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, path).await
    }

    /// Sends a bodiless request and discards the response body.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn send_empty(&self, method: Method, path: &str) -> Result<(), ApiError> {
        self.execute(method, path, None, Bearer::Session).await?;
        Ok(())
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Bearer<'_>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(ApiError::Decode)?;
        let text = self.execute(method, path, payload, bearer).await?;
        // An empty body decodes like `null` so `()` and `Option<_>` work.
        let text = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str(text).map_err(ApiError::Decode)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<Vec<u8>>,
        bearer: Bearer<'_>,
    ) -> Result<String, ApiError> {
        let url = self.url(path)?;
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json");

        let token = match bearer {
            Bearer::Session => self.store.token(),
            Bearer::Explicit(token) => Some(token.to_string()),
        };
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(payload) = payload {
            request = request.body(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%method, path, status = status.as_u16(), "backend response");

        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "backend rejected the session token, signing out");
            self.store.logout();
            return Err(ApiError::Unauthorized);
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), &text));
        }
        Ok(text)
    }
}
