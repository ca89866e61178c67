use crate::api::ApiError;
use crate::identity::ProviderError;

/// Message shown when nothing better is known.
pub const GENERIC_LOGIN_FAILURE: &str = "Login failed. Please try again.";

/// Failure of a sign-in, refresh or sign-out flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Acquisition failed: popup closed, consent denied, provider unreachable.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The backend answered but refused the credential.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Logout(String),
}

impl AuthError {
    /// Best-effort text for the session's `error` field.
    pub fn user_message(&self) -> String {
        let message = match self {
            AuthError::Api(err) => err
                .server_message()
                .map_or_else(|| err.to_string(), str::to_string),
            other => other.to_string(),
        };
        if message.trim().is_empty() {
            GENERIC_LOGIN_FAILURE.to_string()
        } else {
            message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = AuthError::Api(ApiError::Status {
            status: 400,
            message: "bad token".to_string(),
        });
        assert_eq!(err.user_message(), "bad token");
    }

    #[test]
    fn test_user_message_falls_back() {
        assert_eq!(
            AuthError::Rejected(String::new()).user_message(),
            GENERIC_LOGIN_FAILURE
        );
        assert_eq!(
            AuthError::Provider(ProviderError::NoAccount).user_message(),
            "No saved accounts found"
        );
    }
}
