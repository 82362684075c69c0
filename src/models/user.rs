//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
///
/// The password hash and reset-token fields never leave the server: they are
/// skipped on serialization and default to empty when a client deserializes
/// a user it received from the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address (unique, stored trimmed and lower-cased)
    pub email: String,
    /// Password hash (argon2 PHC string)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    /// Avatar reference, empty when unset
    #[serde(default)]
    pub avatar: String,
    /// SHA-256 hex digest of the outstanding reset token
    #[serde(skip_serializing, default)]
    pub reset_password_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub reset_password_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet persisted user.
    ///
    /// The password must already be hashed, see `services::password::hash_password`.
    pub fn new(name: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            name,
            email,
            password_hash,
            role,
            status: UserStatus::Active,
            avatar: String::new(),
            reset_password_token: None,
            reset_password_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        match self.role {
            UserRole::Admin => true,
            UserRole::User => false,
        }
    }

    /// Whether this user may update or delete something authored by `author_id`.
    pub fn can_modify(&self, author_id: i64) -> bool {
        match self.role {
            UserRole::Admin => true,
            UserRole::User => self.id == author_id,
        }
    }

    /// Whether this user may read or edit the account `user_id`.
    pub fn can_manage_user(&self, user_id: i64) -> bool {
        self.can_modify(user_id)
    }

    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }
}

/// Closed set of roles. Authorization code matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Standard account
    #[default]
    User,
    /// Administrator
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Account state. Banned accounts cannot log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Banned,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Banned => write!(f, "banned"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "banned" => Ok(UserStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub role: UserRole,
}

/// Profile fields any account holder may change on their own record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

/// Fields an administrator may additionally change
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    #[serde(flatten)]
    pub profile: UpdateProfileInput,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

impl UpdateUserInput {
    /// True when the update touches fields reserved for administrators
    pub fn touches_privileged_fields(&self) -> bool {
        self.role.is_some() || self.status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        let mut u = User::new(
            "Test".to_string(),
            format!("u{}@example.com", id),
            "hash".to_string(),
            role,
        );
        u.id = id;
        u
    }

    #[test]
    fn test_user_new_defaults() {
        let u = User::new(
            "Jane".to_string(),
            "jane@example.com".to_string(),
            "hash".to_string(),
            UserRole::User,
        );
        assert_eq!(u.id, 0);
        assert_eq!(u.status, UserStatus::Active);
        assert!(u.avatar.is_empty());
        assert!(u.reset_password_token.is_none());
        assert!(!u.is_admin());
    }

    #[test]
    fn test_can_modify_owner_or_admin() {
        let admin = user(1, UserRole::Admin);
        let alice = user(2, UserRole::User);

        assert!(admin.can_modify(1));
        assert!(admin.can_modify(2));
        assert!(admin.can_modify(999));

        assert!(alice.can_modify(2));
        assert!(!alice.can_modify(1));
        assert!(!alice.can_manage_user(999));
    }

    #[test]
    fn test_serialization_hides_secrets() {
        let mut u = user(5, UserRole::User);
        u.password_hash = "$argon2id$secret".to_string();
        u.reset_password_token = Some("digest".to_string());
        u.reset_password_expires = Some(Utc::now());

        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("reset_password_token").is_none());
        assert!(json.get("reset_password_expires").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_public_json_deserializes() {
        let u = user(7, UserRole::Admin);
        let json = serde_json::to_string(&u).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 7);
        assert_eq!(back.role, UserRole::Admin);
        assert!(back.password_hash.is_empty());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("USER").unwrap(), UserRole::User);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::default(), UserRole::User);
    }

    #[test]
    fn test_update_input_privileged_detection() {
        let input: UpdateUserInput = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert!(!input.touches_privileged_fields());
        assert_eq!(input.profile.name.as_deref(), Some("x"));

        let input: UpdateUserInput = serde_json::from_str(r#"{"role":"admin"}"#).unwrap();
        assert!(input.touches_privileged_fields());
    }
}
