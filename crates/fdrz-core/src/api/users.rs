//! User profiles: `/api/users`.

use serde::Serialize;

use super::error::ApiError;
use super::gateway::Gateway;
use crate::session::User;

/// Fields the signed-in user may change about themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UsersApi {
    gateway: Gateway,
}

impl UsersApi {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.gateway.get("/api/users/me").await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn update_current_user(&self, update: &UpdateUser) -> Result<User, ApiError> {
        self.gateway.patch("/api/users/me", update).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn list(&self) -> Result<Vec<User>, ApiError> {
        self.gateway.get("/api/users").await
    }
}
