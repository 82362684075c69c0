//! User service
//!
//! Account creation, profile updates and user administration:
//! - email normalization and validation
//! - self-or-admin access to profiles; role/status changes are admin-only
//! - the last administrator can be neither deleted nor demoted
//! - startup seeding of the default accounts

use crate::config::SeedConfig;
use crate::db::is_unique_violation;
use crate::db::repositories::{AdminGuard, UserRepository};
use crate::models::{
    CreateUserInput, ListParams, PagedResult, UpdateProfileInput, UpdateUserInput, User, UserRole,
};
use crate::services::password::{check_password_policy, hash_password};
use anyhow::Context;
use std::sync::Arc;

/// Maximum display name length in characters
pub const MAX_NAME_LEN: usize = 50;

const SAMPLE_USER_EMAIL: &str = "user@example.com";
const SAMPLE_USER_NAME: &str = "Regular User";
const SAMPLE_USER_PASSWORD: &str = "User@123";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// Email already registered
    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Trim and lower-case an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Structural email check on an already normalized address
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// Validate a display name, returning it trimmed
pub fn validate_name(name: &str) -> Result<String, UserServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Please add a name".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Name can not be more than {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Normalize and validate an email address
pub fn validate_email(email: &str) -> Result<String, UserServiceError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Please add an email".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(UserServiceError::ValidationError(
            "Please add a valid email".to_string(),
        ));
    }
    Ok(email)
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Create an account with a hashed password.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a bad name, email or password
    /// - `Conflict` if the email is taken, including a concurrent insert
    ///   caught by the unique index
    pub async fn create(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let name = validate_name(&input.name)?;
        let email = validate_email(&input.email)?;
        if let Some(msg) = check_password_policy(&input.password) {
            return Err(UserServiceError::ValidationError(msg));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(email_taken());
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(name, email, password_hash, input.role);

        match self.user_repo.create(&user).await {
            Ok(created) => {
                tracing::info!(user_id = created.id, role = %created.role, "user created");
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => Err(email_taken()),
            Err(e) => Err(UserServiceError::InternalError(
                e.context("Failed to create user"),
            )),
        }
    }

    /// Look up a user, `None` when missing
    pub async fn find(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?)
    }

    pub async fn get(&self, id: i64) -> Result<User, UserServiceError> {
        self.find(id).await?.ok_or_else(|| user_not_found(id))
    }

    /// Read a profile as `actor`: self or admin only.
    pub async fn get_as(&self, actor: &User, id: i64) -> Result<User, UserServiceError> {
        if !actor.can_manage_user(id) {
            return Err(UserServiceError::Forbidden(
                "Not authorized to access this user".to_string(),
            ));
        }
        self.get(id).await
    }

    /// Paginated listing, newest first
    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self
            .user_repo
            .list(params)
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(users, total, params))
    }

    /// Update name, email or avatar of one's own account.
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get(user_id).await?;
        self.apply_profile(&mut user, input).await?;
        self.save(&user).await
    }

    /// Update a user as `actor`.
    ///
    /// Self or admin may change profile fields; role and status need admin.
    pub async fn update_as(
        &self,
        actor: &User,
        id: i64,
        input: UpdateUserInput,
    ) -> Result<User, UserServiceError> {
        if !actor.can_manage_user(id) {
            return Err(UserServiceError::Forbidden(
                "Not authorized to update this user".to_string(),
            ));
        }
        if input.touches_privileged_fields() && !actor.is_admin() {
            return Err(UserServiceError::Forbidden(
                "Only administrators can change role or status".to_string(),
            ));
        }

        let mut user = self.get(id).await?;
        self.apply_profile(&mut user, input.profile).await?;

        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(status) = input.status {
            user.status = status;
        }

        let saved = self.save(&user).await?;
        tracing::info!(user_id = saved.id, actor_id = actor.id, "user updated");
        Ok(saved)
    }

    /// Delete a user. The sole administrator cannot be deleted.
    pub async fn delete(&self, id: i64) -> Result<(), UserServiceError> {
        let outcome = self
            .user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?;
        match outcome {
            AdminGuard::Applied => {}
            AdminGuard::Missing => return Err(user_not_found(id)),
            AdminGuard::LastAdmin => return Err(last_admin("delete")),
        }

        tracing::info!(user_id = id, "user deleted");
        Ok(())
    }

    /// Create the default administrator and sample user if missing.
    ///
    /// Safe to call on every start.
    pub async fn seed_defaults(&self, seed: &SeedConfig) -> Result<(), UserServiceError> {
        let admins = self
            .user_repo
            .count_by_role(UserRole::Admin)
            .await
            .context("Failed to count administrators")?;

        if admins == 0 {
            let admin = self
                .create(CreateUserInput {
                    name: seed.admin_name.clone(),
                    email: seed.admin_email.clone(),
                    password: seed.admin_password.clone(),
                    role: UserRole::Admin,
                })
                .await?;
            tracing::info!(user_id = admin.id, email = %admin.email, "seeded administrator");
        }

        if seed.sample_user
            && self
                .user_repo
                .get_by_email(SAMPLE_USER_EMAIL)
                .await
                .context("Failed to check sample user")?
                .is_none()
        {
            let user = self
                .create(CreateUserInput {
                    name: SAMPLE_USER_NAME.to_string(),
                    email: SAMPLE_USER_EMAIL.to_string(),
                    password: SAMPLE_USER_PASSWORD.to_string(),
                    role: UserRole::User,
                })
                .await?;
            tracing::info!(user_id = user.id, "seeded sample user");
        }

        Ok(())
    }

    async fn apply_profile(
        &self,
        user: &mut User,
        input: UpdateProfileInput,
    ) -> Result<(), UserServiceError> {
        if let Some(name) = input.name {
            user.name = validate_name(&name)?;
        }

        if let Some(email) = input.email {
            let email = validate_email(&email)?;
            if email != user.email {
                let taken = self
                    .user_repo
                    .get_by_email(&email)
                    .await
                    .context("Failed to check email")?
                    .is_some_and(|other| other.id != user.id);
                if taken {
                    return Err(email_taken());
                }
                user.email = email;
            }
        }

        if let Some(avatar) = input.avatar {
            user.avatar = avatar.trim().to_string();
        }

        Ok(())
    }

    /// Write the account fields of `user`. Password and reset token are
    /// left untouched.
    async fn save(&self, user: &User) -> Result<User, UserServiceError> {
        let outcome = match self.user_repo.update_account(user).await {
            Ok(outcome) => outcome,
            Err(e) if is_unique_violation(&e) => return Err(email_taken()),
            Err(e) => {
                return Err(UserServiceError::InternalError(
                    e.context("Failed to update user"),
                ))
            }
        };
        match outcome {
            AdminGuard::Applied => self.get(user.id).await,
            AdminGuard::Missing => Err(user_not_found(user.id)),
            AdminGuard::LastAdmin => Err(last_admin("demote")),
        }
    }
}

fn email_taken() -> UserServiceError {
    UserServiceError::Conflict("Email is already registered".to_string())
}

fn last_admin(action: &str) -> UserServiceError {
    UserServiceError::Forbidden(format!("Cannot {} the last administrator", action))
}

fn user_not_found(id: i64) -> UserServiceError {
    UserServiceError::NotFound(format!("User not found with id of {}", id))
}
