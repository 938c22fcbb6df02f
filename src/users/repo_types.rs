use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record in the database.
///
/// An `id` of 0 marks a user that has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String, // argon2 hash, not exposed in JSON
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub admin: bool,
    #[serde(skip_serializing)]
    pub reset_password_token: Option<String>,
}

impl User {
    pub fn is_new(&self) -> bool {
        self.id == 0
    }
}
