use serde::{Deserialize, Serialize};

use crate::users::{dto::UserResponse, repo_types::User};

/// Identity and authorization snapshot carried inside an auth token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i32,
    pub username: String,
    pub active: bool,
    pub authorized: bool,
}

impl Principal {
    pub fn new(id: i32, username: impl Into<String>, active: bool, authorized: bool) -> Self {
        Self {
            id,
            username: username.into(),
            active,
            authorized,
        }
    }

    /// Only persisted, active users with a username may hold a token.
    pub fn is_valid(&self) -> bool {
        self.id > 0 && !self.username.trim().is_empty() && self.active
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.email.clone(), user.active, user.admin)
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for starting the password reset flow.
#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetTokenQuery {
    pub token: String,
}

/// Request body for consuming a reset token.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}
