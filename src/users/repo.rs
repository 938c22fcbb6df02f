use async_trait::async_trait;
use sqlx::PgPool;

use crate::users::repo_types::User;

/// Persistence contract for user records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_reset_password_token(&self, token: &str) -> anyhow::Result<Option<User>>;
    /// Inserts when the user is new, updates otherwise. Returns the stored row.
    async fn save(&self, user: &User) -> anyhow::Result<User>;
    async fn deactivate_user(&self, id: i32) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i32) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, first_name, last_name, active, admin, reset_password_token
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, first_name, last_name, active, admin, reset_password_token
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_reset_password_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, first_name, last_name, active, admin, reset_password_token
            FROM users
            WHERE reset_password_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn save(&self, user: &User) -> anyhow::Result<User> {
        let query = if user.is_new() {
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (email, password, first_name, last_name, active, admin, reset_password_token)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, email, password, first_name, last_name, active, admin, reset_password_token
                "#,
            )
        } else {
            sqlx::query_as::<_, User>(
                r#"
                UPDATE users
                SET email = $1, password = $2, first_name = $3, last_name = $4,
                    active = $5, admin = $6, reset_password_token = $7
                WHERE id = $8
                RETURNING id, email, password, first_name, last_name, active, admin, reset_password_token
                "#,
            )
        };
        let mut query = query
            .bind(&user.email)
            .bind(&user.password)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.active)
            .bind(user.admin)
            .bind(&user.reset_password_token);
        if !user.is_new() {
            query = query.bind(user.id);
        }
        let saved = query.fetch_one(&self.db).await?;
        Ok(saved)
    }

    async fn deactivate_user(&self, id: i32) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET active = FALSE WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
