use std::sync::Arc;

use tracing::info;

use crate::{
    auth::{
        jwt::{JwtKeys, TokenService},
        services::AuthService,
    },
    config::AppConfig,
    db,
    mailer::{EmailSender, LogMailer, SmtpMailer},
    users::{
        repo::PgUserRepository,
        services::{DbUserService, UserService},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await?;

        let users = Arc::new(DbUserService::new(Arc::new(PgUserRepository::new(pool))))
            as Arc<dyn UserService>;

        let mailer = match &config.mail.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, port = smtp.port, "smtp mailer enabled");
                Arc::new(SmtpMailer::new(smtp, config.mail.from.clone())?) as Arc<dyn EmailSender>
            }
            None => {
                info!("SMTP_HOST not set; emails will only be logged");
                Arc::new(LogMailer::new(config.mail.from.clone())) as Arc<dyn EmailSender>
            }
        };

        let tokens = Arc::new(JwtKeys::from_config(&config.jwt)) as Arc<dyn TokenService>;

        Ok(Self::from_parts(
            users,
            mailer,
            tokens,
            config.mail.reset_password_url,
        ))
    }

    pub fn from_parts(
        users: Arc<dyn UserService>,
        mailer: Arc<dyn EmailSender>,
        tokens: Arc<dyn TokenService>,
        reset_password_url: impl Into<String>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(
            users.clone(),
            mailer,
            tokens,
            reset_password_url,
        ));
        Self { auth, users }
    }
}
