use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::dto::{
        AuthResponse, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, ResetTokenQuery,
    },
    error::{AppError, AppResult},
    state::AppState,
    users::dto::{RegisterRequest, UserResponse},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/forgot-password", post(forgot_password))
        .route(
            "/auth/reset-password",
            post(reset_password).get(verify_reset_password_token),
        )
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = state
        .auth
        .find_by_credentials(&payload.email, &payload.password)
        .await?
        .ok_or_else(|| {
            warn!("login rejected");
            AppError::unauthorized("Invalid credentials")
        })?;

    let token = state.auth.generate_auth_token(&user)?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = state.users.prepare_registration(payload).await?;
    let user = state.auth.register(user).await?;
    info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<StatusCode> {
    state.auth.forgot_password(&payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, query))]
pub async fn verify_reset_password_token(
    State(state): State<AppState>,
    Query(query): Query<ResetTokenQuery>,
) -> AppResult<Json<UserResponse>> {
    let user = state.auth.verify_reset_password_token(&query.token).await?;
    Ok(Json(UserResponse::from(user)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    state
        .auth
        .reset_password(&payload.token, &payload.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
