use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, state::AppState, users::repo_types::User};

/// Resolves the bearer token to the stored user.
///
/// A missing header counts as no token presented (`Unauthorized`); a token
/// that fails to verify is `InvalidToken`. A deactivated user is
/// `Unauthorized` even while their token has not expired.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|v| {
                v.strip_prefix("Bearer ")
                    .or_else(|| v.strip_prefix("bearer "))
                    .unwrap_or(v)
                    .trim()
            });

        let user = state.auth.get_user_by_auth_token(token).await?;
        if !user.active {
            return Err(AppError::unauthorized("User is deactivated"));
        }
        Ok(AuthUser(user))
    }
}
