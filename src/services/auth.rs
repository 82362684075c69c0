//! Authentication service
//!
//! Registration, login, password reset and password change. Every successful
//! flow ends with a freshly issued session token.

use crate::config::{AuthConfig, MAX_RESET_TOKEN_TTL_MINUTES};
use crate::db::repositories::UserRepository;
use crate::models::{CreateUserInput, User, UserRole};
use crate::services::email::Mailer;
use crate::services::password::{
    check_password_policy, generate_reset_token, hash_password, hash_reset_token, verify_password,
};
use crate::services::token::TokenService;
use crate::services::user::{normalize_email, UserService, UserServiceError};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Conflict(String),

    /// Unknown email or wrong password; the two are not distinguished
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UserServiceError> for AuthServiceError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(msg) => AuthServiceError::ValidationError(msg),
            UserServiceError::Conflict(msg) => AuthServiceError::Conflict(msg),
            UserServiceError::Forbidden(msg) => AuthServiceError::Forbidden(msg),
            UserServiceError::NotFound(msg) => AuthServiceError::NotFound(msg),
            UserServiceError::InternalError(e) => AuthServiceError::InternalError(e),
        }
    }
}

/// Registration input
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// A signed-in user and their session token
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    users: Arc<UserService>,
    tokens: Arc<TokenService>,
    mailer: Option<Arc<dyn Mailer>>,
    reset_token_ttl: Duration,
    expose_reset_token: bool,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        users: Arc<UserService>,
        tokens: Arc<TokenService>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            users,
            tokens,
            mailer: None,
            reset_token_ttl: Duration::try_minutes(config.reset_token_ttl_minutes)
                .unwrap_or_else(|| Duration::minutes(MAX_RESET_TOKEN_TTL_MINUTES)),
            expose_reset_token: config.expose_reset_token,
        }
    }

    /// Deliver reset tokens through `mailer` instead of the log
    pub fn with_mailer(mut self, mailer: Option<Arc<dyn Mailer>>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create a standard account and sign it in.
    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession, AuthServiceError> {
        let user = self
            .users
            .create(CreateUserInput {
                name: input.name,
                email: input.email,
                password: input.password,
                role: UserRole::User,
            })
            .await?;

        tracing::info!(user_id = user.id, "user registered");
        self.session_for(user)
    }

    /// Verify credentials and sign in.
    ///
    /// A banned account is only reported after its password verified.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthServiceError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthServiceError::ValidationError(
                "Please provide an email and password".to_string(),
            ));
        }

        let Some(user) = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
        else {
            tracing::warn!(email = %email, "login failed: unknown email");
            return Err(AuthServiceError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash).context("Failed to verify password")? {
            tracing::warn!(user_id = user.id, "login failed: wrong password");
            return Err(AuthServiceError::InvalidCredentials);
        }

        if user.is_banned() {
            tracing::warn!(user_id = user.id, "login refused: account banned");
            return Err(AuthServiceError::Forbidden(
                "Your account has been banned".to_string(),
            ));
        }

        tracing::info!(user_id = user.id, "user logged in");
        self.session_for(user)
    }

    /// Start a password reset.
    ///
    /// Succeeds the same way whether or not the account exists. Returns the
    /// plaintext token only when token exposure is enabled and the account
    /// exists.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>, AuthServiceError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AuthServiceError::ValidationError(
                "Please provide an email".to_string(),
            ));
        }

        let Some(user) = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
        else {
            tracing::debug!(email = %email, "password reset requested for unknown email");
            return Ok(None);
        };

        let (token, digest) = generate_reset_token();
        let expires = Utc::now()
            .checked_add_signed(self.reset_token_ttl)
            .context("Reset token expiry out of range")?;
        self.user_repo
            .set_reset_token(user.id, &digest, expires)
            .await
            .context("Failed to store reset token")?;

        match &self.mailer {
            Some(mailer) => {
                if let Err(e) = mailer.send_password_reset(&user.email, &token).await {
                    tracing::error!(user_id = user.id, error = %e, "failed to send reset mail");
                    self.user_repo
                        .clear_reset_token(user.id, &digest)
                        .await
                        .context("Failed to clear reset token")?;
                    return Ok(None);
                }
            }
            None => {
                tracing::info!(user_id = user.id, reset_token = %token, "password reset token issued");
            }
        }

        Ok(self.expose_reset_token.then_some(token))
    }

    /// Consume a reset token and set a new password.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<AuthSession, AuthServiceError> {
        let digest = hash_reset_token(token);
        let user = self
            .user_repo
            .get_by_reset_token(&digest)
            .await
            .context("Failed to look up reset token")?
            .ok_or(AuthServiceError::InvalidResetToken)?;

        let now = Utc::now();
        let expired = user
            .reset_password_expires
            .map_or(true, |expires| expires <= now);
        if expired {
            tracing::debug!(user_id = user.id, "expired reset token presented");
            return Err(AuthServiceError::InvalidResetToken);
        }

        if let Some(msg) = check_password_policy(new_password) {
            return Err(AuthServiceError::ValidationError(msg));
        }

        let password_hash = hash_password(new_password).context("Failed to hash password")?;
        // the token may have been used since the lookup
        let consumed = self
            .user_repo
            .consume_reset_token(user.id, &digest, &password_hash, Utc::now())
            .await
            .context("Failed to update password")?;
        if !consumed {
            tracing::debug!(user_id = user.id, "reset token already consumed");
            return Err(AuthServiceError::InvalidResetToken);
        }

        let user = self.users.get(user.id).await?;
        tracing::info!(user_id = user.id, "password reset");
        self.session_for(user)
    }

    /// Change the password of a signed-in user.
    pub async fn update_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<AuthSession, AuthServiceError> {
        let user = self.users.get(user_id).await?;

        if !verify_password(current_password, &user.password_hash)
            .context("Failed to verify password")?
        {
            tracing::warn!(user_id, "password change refused: wrong current password");
            return Err(AuthServiceError::InvalidCredentials);
        }

        if let Some(msg) = check_password_policy(new_password) {
            return Err(AuthServiceError::ValidationError(msg));
        }

        let password_hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .set_password_hash(user.id, &password_hash)
            .await
            .context("Failed to update password")?;
        let user = self.users.get(user_id).await?;

        tracing::info!(user_id, "password changed");
        self.session_for(user)
    }

    fn session_for(&self, user: User) -> Result<AuthSession, AuthServiceError> {
        let token = self
            .tokens
            .issue(user.id)
            .map_err(|e| anyhow::Error::from(e).context("Failed to issue token"))?;
        Ok(AuthSession { token, user })
    }
}
