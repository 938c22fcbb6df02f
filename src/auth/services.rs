use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{ForgotPasswordRequest, Principal},
        jwt::TokenService,
    },
    error::{AppError, AppResult},
    mailer::EmailSender,
    users::{repo_types::User, services::UserService},
};

pub const RESET_PASSWORD_SUBJECT: &str = "Here's the link to reset your password";

/// Login, token resolution, registration and the password reset flow.
///
/// Holds no state between calls. Every collaborator failure surfaces
/// unchanged to the caller.
pub struct AuthService {
    users: Arc<dyn UserService>,
    mailer: Arc<dyn EmailSender>,
    tokens: Arc<dyn TokenService>,
    reset_password_url: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserService>,
        mailer: Arc<dyn EmailSender>,
        tokens: Arc<dyn TokenService>,
        reset_password_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            mailer,
            tokens,
            reset_password_url: reset_password_url.into(),
        }
    }

    /// No match is `Ok(None)`, not an error.
    pub async fn find_by_credentials(&self, identifier: &str, secret: &str) -> AppResult<Option<User>> {
        self.users.find_by_credentials(identifier, secret).await
    }

    #[instrument(skip_all)]
    pub async fn verify_reset_password_token(&self, token: &str) -> AppResult<User> {
        self.users
            .find_by_reset_password_token(token)
            .await?
            .ok_or_else(|| AppError::not_found("Reset password token not found"))
    }

    /// The token is single use: the user service clears it on success.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let user = self.verify_reset_password_token(token).await?;
        self.users.reset_password(&user, new_password).await?;
        info!(user_id = user.id, "password reset through token");
        Ok(())
    }

    /// `None` and empty tokens are rejected before the token is parsed.
    #[instrument(skip_all)]
    pub async fn get_user_by_auth_token(&self, token: Option<&str>) -> AppResult<User> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => {
                warn!("no auth token presented");
                return Err(AppError::unauthorized("Missing auth token"));
            }
        };
        let principal = self.tokens.extract_token_details(token)?;
        self.users.find_user_by_id(principal.id).await
    }

    pub fn generate_auth_token(&self, user: &User) -> AppResult<String> {
        self.tokens.generate_token(&Principal::from(user))
    }

    pub async fn register(&self, user: User) -> AppResult<User> {
        self.users.save(user).await
    }

    /// Stores a fresh reset token, then mails the link. Nothing is sent if
    /// the token could not be stored.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn forgot_password(&self, request: &ForgotPasswordRequest) -> AppResult<()> {
        let token = Uuid::new_v4().simple().to_string();
        self.users
            .update_reset_password_token(&token, &request.email)
            .await?;

        let link = format!("{}?token={}", self.reset_password_url, token);
        let body = format!(
            "Hello,\n\nYou have requested to reset your password.\n\
             Use the link below to choose a new one:\n\n{link}\n\n\
             Ignore this email if you remember your password or did not make this request."
        );
        self.mailer
            .send_email(&request.email, RESET_PASSWORD_SUBJECT, &body)
            .await?;
        info!("reset password email sent");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::users::dto::{RegisterRequest, UpdateUserRequest, UserResponse};

    /// Shared, ordered record of collaborator calls.
    #[derive(Clone, Default)]
    pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        pub(crate) fn push(&self, call: impl Into<String>) {
            self.0.lock().unwrap().push(call.into());
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        pub(crate) fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    pub(crate) type Stub<T> = Mutex<Option<Box<dyn Fn() -> AppResult<T> + Send>>>;

    fn stubbed<T: Default>(stub: &Stub<T>) -> AppResult<T> {
        match stub.lock().unwrap().as_ref() {
            Some(f) => f(),
            None => Ok(T::default()),
        }
    }

    /// Every method answers from its stub, or a default value when unstubbed.
    #[derive(Default)]
    pub(crate) struct FakeUsers {
        pub(crate) log: CallLog,
        pub(crate) by_credentials: Stub<Option<User>>,
        pub(crate) by_reset_token: Stub<Option<User>>,
        pub(crate) update_reset_token: Stub<()>,
        pub(crate) by_id: Stub<User>,
    }

    #[async_trait]
    impl UserService for FakeUsers {
        async fn find_by_credentials(&self, email: &str, password: &str) -> AppResult<Option<User>> {
            self.log.push(format!("find_by_credentials:{email}:{password}"));
            stubbed(&self.by_credentials)
        }
        async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
            self.log.push(format!("find_by_email:{email}"));
            Ok(None)
        }
        async fn find_by_reset_password_token(&self, token: &str) -> AppResult<Option<User>> {
            self.log.push(format!("find_by_reset_password_token:{token}"));
            stubbed(&self.by_reset_token)
        }
        async fn update_reset_password_token(&self, token: &str, email: &str) -> AppResult<()> {
            self.log.push(format!("update_reset_password_token:{token}:{email}"));
            stubbed(&self.update_reset_token)
        }
        async fn reset_password(&self, user: &User, new_password: &str) -> AppResult<()> {
            self.log.push(format!("reset_password:{}:{new_password}", user.id));
            Ok(())
        }
        async fn save(&self, user: User) -> AppResult<User> {
            self.log.push(format!("save:{}", user.email));
            Ok(user)
        }
        async fn is_email_available(&self, email: &str) -> AppResult<bool> {
            self.log.push(format!("is_email_available:{email}"));
            Ok(true)
        }
        async fn prepare_registration(&self, request: RegisterRequest) -> AppResult<User> {
            self.log.push(format!("prepare_registration:{}", request.email));
            Ok(User { email: request.email, active: true, ..User::default() })
        }
        async fn update(&self, request: UpdateUserRequest, current: &User) -> AppResult<User> {
            self.log.push(format!("update:{}", current.id));
            Ok(User { email: request.email, ..current.clone() })
        }
        async fn deactivate(&self, user: &User) -> AppResult<()> {
            self.log.push(format!("deactivate:{}", user.id));
            Ok(())
        }
        async fn find_by_id(&self, id: i32) -> AppResult<UserResponse> {
            self.find_user_by_id(id).await.map(UserResponse::from)
        }
        async fn find_user_by_id(&self, id: i32) -> AppResult<User> {
            self.log.push(format!("find_user_by_id:{id}"));
            stubbed(&self.by_id)
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeTokens {
        pub(crate) log: CallLog,
        pub(crate) generate: Stub<String>,
        pub(crate) extract: Stub<Option<Principal>>,
    }

    impl TokenService for FakeTokens {
        fn generate_token(&self, principal: &Principal) -> AppResult<String> {
            self.log.push(format!("generate_token:{}", principal.id));
            stubbed(&self.generate)
        }
        fn extract_token_details(&self, token: &str) -> AppResult<Principal> {
            self.log.push(format!("extract_token_details:{token}"));
            stubbed(&self.extract)?.ok_or_else(|| AppError::invalid_token("no principal stubbed"))
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeMailer {
        pub(crate) log: CallLog,
    }

    #[async_trait]
    impl EmailSender for FakeMailer {
        async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
            self.log.push(format!("send_email:{to}:{subject}:{body}"));
            Ok(())
        }
    }

    pub(crate) struct Fixture {
        pub(crate) log: CallLog,
        pub(crate) users: Arc<FakeUsers>,
        pub(crate) tokens: Arc<FakeTokens>,
        pub(crate) auth: AuthService,
    }

    pub(crate) fn fixture_with(users: FakeUsers, tokens: FakeTokens) -> Fixture {
        let log = CallLog::default();
        let users = Arc::new(FakeUsers { log: log.clone(), ..users });
        let tokens = Arc::new(FakeTokens { log: log.clone(), ..tokens });
        let mailer = Arc::new(FakeMailer { log: log.clone() });
        let auth = AuthService::new(
            users.clone(),
            mailer,
            tokens.clone(),
            "http://localhost:3000/reset-password",
        );
        Fixture { log, users, tokens, auth }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeUsers::default(), FakeTokens::default())
    }

    pub(crate) fn stub<T>(f: impl Fn() -> AppResult<T> + Send + 'static) -> Stub<T> {
        Mutex::new(Some(Box::new(f)))
    }

    #[tokio::test]
    async fn find_by_credentials_delegates_once() {
        let f = fixture();
        let found = f.auth.find_by_credentials("misc", "str").await.unwrap();
        assert!(found.is_none());
        assert_eq!(f.log.calls(), vec!["find_by_credentials:misc:str"]);
    }

    #[tokio::test]
    async fn verify_reset_password_token_returns_owner() {
        let f = fixture_with(
            FakeUsers {
                by_reset_token: stub(|| Ok(Some(User { id: 5, ..User::default() }))),
                ..FakeUsers::default()
            },
            FakeTokens::default(),
        );
        let user = f.auth.verify_reset_password_token("t").await.unwrap();
        assert_eq!(user.id, 5);
        assert_eq!(f.log.count("find_by_reset_password_token"), 1);
    }

    #[tokio::test]
    async fn verify_reset_password_token_missing_is_not_found() {
        let f = fixture();
        let err = f.auth.verify_reset_password_token("missing-token").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(f.log.count("find_by_reset_password_token"), 1);
    }

    #[tokio::test]
    async fn verify_reset_password_token_propagates_not_found() {
        let f = fixture_with(
            FakeUsers {
                by_reset_token: stub(|| Err(AppError::not_found("gone"))),
                ..FakeUsers::default()
            },
            FakeTokens::default(),
        );
        let err = f.auth.verify_reset_password_token("q").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(m) if m == "gone"));
    }

    #[tokio::test]
    async fn reset_password_passes_resolved_user() {
        let f = fixture_with(
            FakeUsers {
                by_reset_token: stub(|| Ok(Some(User { id: 9, ..User::default() }))),
                ..FakeUsers::default()
            },
            FakeTokens::default(),
        );
        f.auth.reset_password("t", "newP").await.unwrap();
        assert_eq!(
            f.log.calls(),
            vec!["find_by_reset_password_token:t", "reset_password:9:newP"]
        );
    }

    #[tokio::test]
    async fn reset_password_unknown_token_mutates_nothing() {
        let f = fixture();
        let err = f.auth.reset_password("t", "newP").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(f.log.count("find_by_reset_password_token"), 1);
        assert_eq!(f.log.count("reset_password"), 0);
    }

    #[tokio::test]
    async fn get_user_by_auth_token_resolves_principal_user() {
        let f = fixture_with(
            FakeUsers {
                by_id: stub(|| Ok(User { id: 1, email: "yes".into(), ..User::default() })),
                ..FakeUsers::default()
            },
            FakeTokens {
                extract: stub(|| Ok(Some(Principal::new(1, "yes", true, true)))),
                ..FakeTokens::default()
            },
        );
        let user = f.auth.get_user_by_auth_token(Some("t")).await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(
            f.log.calls(),
            vec!["extract_token_details:t", "find_user_by_id:1"]
        );
    }

    #[tokio::test]
    async fn get_user_by_auth_token_invalid_token_propagates() {
        let f = fixture_with(
            FakeUsers::default(),
            FakeTokens {
                extract: stub(|| Err(AppError::invalid_token("garbage"))),
                ..FakeTokens::default()
            },
        );
        let err = f.auth.get_user_by_auth_token(Some("garbage")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken(_)));
        assert_eq!(f.log.count("extract_token_details"), 1);
        assert_eq!(f.log.count("find_user_by_id"), 0);
    }

    #[tokio::test]
    async fn get_user_by_auth_token_empty_is_unauthorized_without_parsing() {
        let f = fixture();
        for token in [None, Some("")] {
            let err = f.auth.get_user_by_auth_token(token).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
        assert!(f.log.calls().is_empty());
    }

    #[tokio::test]
    async fn get_user_by_auth_token_deleted_user_is_not_found() {
        let f = fixture_with(
            FakeUsers {
                by_id: stub(|| Err(AppError::not_found("No user with id 1"))),
                ..FakeUsers::default()
            },
            FakeTokens {
                extract: stub(|| Ok(Some(Principal::new(1, "yes", true, true)))),
                ..FakeTokens::default()
            },
        );
        let err = f.auth.get_user_by_auth_token(Some("t")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn generate_auth_token_builds_principal_from_user() {
        let f = fixture_with(
            FakeUsers::default(),
            FakeTokens {
                generate: stub(|| Ok("newToken".to_string())),
                ..FakeTokens::default()
            },
        );
        let user = User { id: 4, email: "a@b.com".into(), active: true, ..User::default() };
        assert_eq!(f.auth.generate_auth_token(&user).unwrap(), "newToken");
        assert_eq!(f.log.calls(), vec!["generate_token:4"]);
    }

    #[test]
    fn generate_auth_token_propagates_invalid_user_input() {
        let f = fixture_with(
            FakeUsers::default(),
            FakeTokens {
                generate: stub(|| Err(AppError::invalid_input("inactive"))),
                ..FakeTokens::default()
            },
        );
        let err = f.auth.generate_auth_token(&User::default()).unwrap_err();
        assert!(matches!(err, AppError::InvalidUserInput(_)));
        assert_eq!(f.tokens.log.count("generate_token"), 1);
    }

    #[tokio::test]
    async fn register_saves_the_same_user_once() {
        let f = fixture();
        let user = User { email: "new@gmail.com".into(), first_name: "New".into(), ..User::default() };
        let saved = f.auth.register(user.clone()).await.unwrap();
        assert_eq!(saved, user);
        assert_eq!(f.log.calls(), vec!["save:new@gmail.com"]);
    }

    #[tokio::test]
    async fn forgot_password_unknown_email_sends_nothing() {
        let f = fixture_with(
            FakeUsers {
                update_reset_token: stub(|| Err(AppError::not_found("No user with email"))),
                ..FakeUsers::default()
            },
            FakeTokens::default(),
        );
        let err = f
            .auth
            .forgot_password(&ForgotPasswordRequest { email: "c@d.com".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(f.log.count("update_reset_password_token"), 1);
        assert_eq!(f.log.count("send_email"), 0);
    }

    #[tokio::test]
    async fn forgot_password_stores_token_then_mails_link() {
        let f = fixture();
        f.auth
            .forgot_password(&ForgotPasswordRequest { email: "email@x.com".into() })
            .await
            .unwrap();

        let calls = f.log.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("update_reset_password_token:"));
        assert!(calls[1].starts_with("send_email:email@x.com:"));

        let token = calls[0].split(':').nth(1).unwrap();
        assert!(!token.is_empty());
        assert!(calls[0].ends_with(":email@x.com"));
        assert!(calls[1].contains(RESET_PASSWORD_SUBJECT));
        assert!(calls[1].contains(&format!("reset-password?token={token}")));
        assert_eq!(f.users.log.count("send_email"), 1);
    }

    #[tokio::test]
    async fn forgot_password_issues_fresh_tokens() {
        let f = fixture();
        let request = ForgotPasswordRequest { email: "email@x.com".into() };
        f.auth.forgot_password(&request).await.unwrap();
        f.auth.forgot_password(&request).await.unwrap();
        let tokens: Vec<String> = f
            .log
            .calls()
            .iter()
            .filter(|c| c.starts_with("update_reset_password_token:"))
            .map(|c| c.split(':').nth(1).unwrap().to_string())
            .collect();
        assert_eq!(tokens.len(), 2);
        assert_ne!(tokens[0], tokens[1]);
    }
}
