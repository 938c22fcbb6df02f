use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_TTL_MINUTES: i64 = 60;
/// One year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Absent means mail is only logged.
    pub smtp: Option<SmtpConfig>,
    pub from: String,
    pub reset_password_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "congo".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "congo-users".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref())?,
        };
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(587),
                username: std::env::var("SMTP_USERNAME")?,
                password: std::env::var("SMTP_PASSWORD")?,
            }),
            Err(_) => None,
        };
        let mail = MailConfig {
            smtp,
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "noreplycongo@example.com".into()),
            reset_password_url: std::env::var("RESET_PASSWORD_URL")
                .unwrap_or_else(|_| "http://localhost:3000/reset-password".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            mail,
        })
    }
}

/// `JWT_TTL_MINUTES`, when set, must be a whole number in `1..=MAX_TTL_MINUTES`.
fn parse_ttl_minutes(raw: Option<&str>) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TTL_MINUTES);
    };
    let minutes: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("JWT_TTL_MINUTES is not a number: {raw}"))?;
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!("JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {minutes}");
    }
    Ok(minutes)
}
