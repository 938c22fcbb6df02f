use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::{AppError, AppResult};

fn internal(context: &str, e: password_hash::Error) -> AppError {
    error!(error = %e, "{context}");
    AppError::Internal(anyhow::anyhow!("{context}: {e}"))
}

/// PHC-encoded argon2 hash of `plain` under a fresh random salt.
pub fn hash_password(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| internal("hash password", e))
}

/// `Ok(false)` on mismatch. A stored hash that cannot be parsed or checked
/// is a server-side fault and comes back as `Internal`.
pub fn verify_password(plain: &str, stored: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| internal("parse stored password hash", e))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(internal("verify password", e)),
    }
}
