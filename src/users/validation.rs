use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// At least 8 chars with an upper, a lower, a digit and a symbol.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if !is_valid_email(email) {
        return Err(AppError::invalid_input("Invalid email"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if !is_strong_password(password) {
        return Err(AppError::invalid_input(
            "Password must be at least 8 characters and contain upper and lower case letters, a digit and a symbol",
        ));
    }
    Ok(())
}

pub fn validate_name(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_input(format!("{field} must not be empty")));
    }
    Ok(())
}
