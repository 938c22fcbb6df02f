use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::{
    auth::password::{hash_password, verify_password},
    error::{AppError, AppResult},
    users::{
        dto::{RegisterRequest, UpdateUserRequest, UserResponse},
        repo::UserRepository,
        repo_types::User,
        validation::{normalize_email, validate_email, validate_name, validate_password},
    },
};

/// User record lifecycle as seen by the auth flow and the user endpoints.
#[async_trait]
pub trait UserService: Send + Sync {
    /// `None` when the email is unknown or the password does not match.
    async fn find_by_credentials(&self, email: &str, password: &str) -> AppResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_by_reset_password_token(&self, token: &str) -> AppResult<Option<User>>;
    /// `NotFound` when no user has `email`.
    async fn update_reset_password_token(&self, token: &str, email: &str) -> AppResult<()>;
    /// Sets a new password and clears the reset token.
    async fn reset_password(&self, user: &User, new_password: &str) -> AppResult<()>;
    async fn save(&self, user: User) -> AppResult<User>;
    /// `InvalidUserInput` when the email is taken.
    async fn is_email_available(&self, email: &str) -> AppResult<bool>;
    /// Validated, hashed, not yet persisted user for a registration request.
    async fn prepare_registration(&self, request: RegisterRequest) -> AppResult<User>;
    async fn update(&self, request: UpdateUserRequest, current: &User) -> AppResult<User>;
    async fn deactivate(&self, user: &User) -> AppResult<()>;
    async fn find_by_id(&self, id: i32) -> AppResult<UserResponse>;
    /// `NotFound` when absent.
    async fn find_user_by_id(&self, id: i32) -> AppResult<User>;
}

pub struct DbUserService {
    repo: Arc<dyn UserRepository>,
}

impl DbUserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl UserService for DbUserService {
    #[instrument(skip(self, password))]
    async fn find_by_credentials(&self, email: &str, password: &str) -> AppResult<Option<User>> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        if verify_password(password, &user.password)? {
            Ok(Some(user))
        } else {
            warn!(user_id = user.id, "password mismatch");
            Ok(None)
        }
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.repo.find_by_email(&normalize_email(email)).await?)
    }

    async fn find_by_reset_password_token(&self, token: &str) -> AppResult<Option<User>> {
        Ok(self.repo.find_by_reset_password_token(token).await?)
    }

    #[instrument(skip(self, token))]
    async fn update_reset_password_token(&self, token: &str, email: &str) -> AppResult<()> {
        let mut user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No user with email {email}")))?;
        user.reset_password_token = Some(token.to_string());
        self.repo.save(&user).await?;
        info!(user_id = user.id, "reset password token stored");
        Ok(())
    }

    #[instrument(skip(self, user, new_password), fields(user_id = user.id))]
    async fn reset_password(&self, user: &User, new_password: &str) -> AppResult<()> {
        validate_password(new_password)?;
        let mut user = user.clone();
        user.password = hash_password(new_password)?;
        user.reset_password_token = None;
        self.repo.save(&user).await?;
        info!("password reset");
        Ok(())
    }

    async fn save(&self, user: User) -> AppResult<User> {
        Ok(self.repo.save(&user).await?)
    }

    async fn is_email_available(&self, email: &str) -> AppResult<bool> {
        if self.find_by_email(email).await?.is_some() {
            return Err(AppError::invalid_input("Email is already in use"));
        }
        Ok(true)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn prepare_registration(&self, request: RegisterRequest) -> AppResult<User> {
        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_password(&request.password)?;
        validate_name("first_name", &request.first_name)?;
        validate_name("last_name", &request.last_name)?;
        self.is_email_available(&email).await?;

        Ok(User {
            id: 0,
            email,
            password: hash_password(&request.password)?,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            active: true,
            admin: false,
            reset_password_token: None,
        })
    }

    #[instrument(skip(self, request, current), fields(user_id = current.id))]
    async fn update(&self, request: UpdateUserRequest, current: &User) -> AppResult<User> {
        let mut user = self.find_user_by_id(current.id).await?;

        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_password(&request.password)?;
        validate_name("first_name", &request.first_name)?;
        validate_name("last_name", &request.last_name)?;
        if email != user.email {
            self.is_email_available(&email).await?;
        }

        user.email = email;
        user.first_name = request.first_name.trim().to_string();
        user.last_name = request.last_name.trim().to_string();
        user.password = hash_password(&request.password)?;
        let user = self.repo.save(&user).await?;
        info!("user updated");
        Ok(user)
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn deactivate(&self, user: &User) -> AppResult<()> {
        let user = self.find_user_by_id(user.id).await?;
        self.repo.deactivate_user(user.id).await?;
        info!("user deactivated");
        Ok(())
    }

    async fn find_by_id(&self, id: i32) -> AppResult<UserResponse> {
        self.find_user_by_id(id).await.map(UserResponse::from)
    }

    async fn find_user_by_id(&self, id: i32) -> AppResult<User> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No user with id {id}")))
    }
}
