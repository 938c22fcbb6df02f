use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
    users::dto::{UpdateUserRequest, UserResponse},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).put(update_me).delete(deactivate_me))
        .route("/users/:id", get(get_user))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let updated = state.users.update(payload, &user).await?;
    Ok(Json(UserResponse::from(updated)))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn deactivate_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<StatusCode> {
    state.users.deactivate(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Admins may read anyone; other users only themselves.
#[instrument(skip(state, caller), fields(caller_id = caller.id))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i32>,
) -> AppResult<Json<UserResponse>> {
    if !caller.admin && caller.id != id {
        warn!(target_id = id, "user lookup denied");
        return Err(AppError::unauthorized("Not allowed to view this user"));
    }
    Ok(Json(state.users.find_by_id(id).await?))
}
