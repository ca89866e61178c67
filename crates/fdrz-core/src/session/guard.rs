//! Access decision for protected operations.

use super::state::SessionState;

/// Outcome of checking the session against a protected surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// A sign-in/out is in flight; decide later.
    Loading,
    RequiresLogin,
    /// Signed in, but without the required role.
    Forbidden,
    Granted,
}

impl Access {
    pub fn evaluate(state: &SessionState, required_role: Option<&str>) -> Self {
        if state.is_loading {
            return Access::Loading;
        }
        if !state.is_authenticated() {
            return Access::RequiresLogin;
        }
        match (required_role, &state.user) {
            (Some(role), Some(user)) if user.role != role => Access::Forbidden,
            _ => Access::Granted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{AuthStatus, User};

    fn signed_in(role: &str) -> SessionState {
        SessionState {
            user: Some(User {
                id: "1".to_string(),
                name: "N".to_string(),
                email: "n@x.io".to_string(),
                role: role.to_string(),
                department: None,
            }),
            token: Some("t".to_string()),
            status: AuthStatus::LoggedIn,
            ..Default::default()
        }
    }

    #[test]
    fn test_loading_wins() {
        let state = SessionState {
            is_loading: true,
            ..signed_in("user")
        };
        assert_eq!(Access::evaluate(&state, None), Access::Loading);
    }

    #[test]
    fn test_anonymous_requires_login() {
        assert_eq!(
            Access::evaluate(&SessionState::default(), None),
            Access::RequiresLogin
        );
    }

    #[test]
    fn test_role_check() {
        let state = signed_in("user");
        assert_eq!(Access::evaluate(&state, None), Access::Granted);
        assert_eq!(Access::evaluate(&state, Some("user")), Access::Granted);
        assert_eq!(Access::evaluate(&state, Some("admin")), Access::Forbidden);
    }
}
