use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

use crate::{
    auth::dto::Principal,
    config::{JwtConfig, MAX_TTL_MINUTES},
    error::{AppError, AppResult},
};

/// Mints and parses auth tokens carrying a [`Principal`].
pub trait TokenService: Send + Sync {
    /// Fails with `InvalidUserInput` when the principal may not hold a token.
    fn generate_token(&self, principal: &Principal) -> AppResult<String>;

    /// Fails with `Unauthorized` for an empty token and `InvalidToken` for
    /// anything that does not decode, verify or is expired.
    fn extract_token_details(&self, token: &str) -> AppResult<Principal>;
}

/// JWT payload used for authentication.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,         // user ID
    pub username: String, // user email
    pub active: bool,
    pub admin: bool,
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Principal::new(claims.sub, claims.username, claims.active, claims.admin)
    }
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::from_secs(config.ttl_minutes.clamp(0, MAX_TTL_MINUTES) as u64 * 60),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }
}

impl TokenService for JwtKeys {
    fn generate_token(&self, principal: &Principal) -> AppResult<String> {
        if !principal.is_valid() {
            warn!(user_id = principal.id, active = principal.active, "refusing token for invalid principal");
            return Err(AppError::invalid_input("User is not eligible for an auth token"));
        }
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: principal.id,
            username: principal.username.clone(),
            active: principal.active,
            admin: principal.authorized,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(e.into()))?;
        debug!(user_id = principal.id, "jwt signed");
        Ok(token)
    }

    fn extract_token_details(&self, token: &str) -> AppResult<Principal> {
        if token.trim().is_empty() {
            return Err(AppError::unauthorized("Missing auth token"));
        }
        let data = decode::<Claims>(token, &self.decoding, &self.validation()).map_err(|e| {
            warn!(error = %e, "jwt rejected");
            AppError::invalid_token("Invalid or expired token")
        })?;
        debug!(user_id = data.claims.sub, "jwt verified");
        Ok(data.claims.into())
    }
}
