//! User repository
//!
//! - `UserRepository` trait defining user data access
//! - `SqlxUserRepository` implementing it for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ListParams, User, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Fails with a unique violation if the email is taken.
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Look up by normalized email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up by the stored digest of a reset token
    async fn get_by_reset_token(&self, token_hash: &str) -> Result<Option<User>>;

    /// Write name, email, avatar, role and status of `user`.
    ///
    /// Refused with `LastAdmin` when it would demote the only administrator.
    async fn update_account(&self, user: &User) -> Result<AdminGuard>;

    /// Write only the password hash
    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Store a reset token digest and its expiry
    async fn set_reset_token(
        &self,
        id: i64,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<()>;

    /// Drop the reset token of `id`, but only while it is still `token_hash`
    async fn clear_reset_token(&self, id: i64, token_hash: &str) -> Result<()>;

    /// Set a new password hash and clear the reset token in one statement,
    /// provided `token_hash` is still stored for `id` and unexpired at `now`.
    ///
    /// Returns false when the token was already used, replaced or expired.
    async fn consume_reset_token(
        &self,
        id: i64,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Delete a user. Refused with `LastAdmin` for the only administrator.
    async fn delete(&self, id: i64) -> Result<AdminGuard>;

    async fn count(&self) -> Result<i64>;

    async fn count_by_role(&self, role: UserRole) -> Result<i64>;

    /// Newest first
    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

/// Outcome of a write that must leave at least one administrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminGuard {
    Applied,
    /// No such user
    Missing,
    /// The write would have removed the last administrator
    LastAdmin,
}

/// SQLx-based user repository for SQLite and MySQL
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_USER: &str = r#"
    SELECT id, name, email, password_hash, role, status, avatar,
           reset_password_token, reset_password_expires, created_at, updated_at
    FROM users
"#;

const INSERT_USER: &str = r#"
    INSERT INTO users (name, email, password_hash, role, status, avatar, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_ACCOUNT: &str = r#"
    UPDATE users
    SET name = ?, email = ?, avatar = ?, role = ?, status = ?, updated_at = ?
    WHERE id = ?
"#;

// SQLite takes the write lock before evaluating the guard, so the count and
// the write cannot interleave with another writer.
const UPDATE_ACCOUNT_GUARDED: &str = r#"
    UPDATE users
    SET name = ?, email = ?, avatar = ?, role = ?, status = ?, updated_at = ?
    WHERE id = ?
      AND (? = 'admin' OR role <> 'admin'
           OR (SELECT COUNT(*) FROM users WHERE role = 'admin') > 1)
"#;

const DELETE_USER_GUARDED: &str = r#"
    DELETE FROM users
    WHERE id = ?
      AND (role <> 'admin' OR (SELECT COUNT(*) FROM users WHERE role = 'admin') > 1)
"#;

const SET_PASSWORD_HASH: &str = "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?";

const SET_RESET_TOKEN: &str = r#"
    UPDATE users
    SET reset_password_token = ?, reset_password_expires = ?, updated_at = ?
    WHERE id = ?
"#;

const CLEAR_RESET_TOKEN: &str = r#"
    UPDATE users
    SET reset_password_token = NULL, reset_password_expires = NULL
    WHERE id = ? AND reset_password_token = ?
"#;

const CONSUME_RESET_TOKEN: &str = r#"
    UPDATE users
    SET password_hash = ?, reset_password_token = NULL, reset_password_expires = NULL,
        updated_at = ?
    WHERE id = ? AND reset_password_token = ? AND reset_password_expires > ?
"#;

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user, now).await?,
            Backend::Mysql(pool) => create_user_mysql(pool, user, now).await?,
        };

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            reset_password_token: None,
            reset_password_expires: None,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, id).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, id).await,
        }
        .context("Failed to get user by ID")
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE email = ?", SELECT_USER);
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, email).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, email).await,
        }
        .context("Failed to get user by email")
    }

    async fn get_by_reset_token(&self, token_hash: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE reset_password_token = ?", SELECT_USER);
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, token_hash).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, token_hash).await,
        }
        .context("Failed to get user by reset token")
    }

    async fn update_account(&self, user: &User) -> Result<AdminGuard> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let affected = sqlx::query(UPDATE_ACCOUNT_GUARDED)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(&user.avatar)
                    .bind(user.role.to_string())
                    .bind(user.status.to_string())
                    .bind(Utc::now())
                    .bind(user.id)
                    .bind(user.role.to_string())
                    .execute(pool)
                    .await
                    .context("Failed to update user")?
                    .rows_affected();
                self.guard_outcome(affected, user.id).await
            }
            Backend::Mysql(pool) => update_account_mysql(pool, user).await,
        }
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<()> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(SET_PASSWORD_HASH)
                .bind(password_hash)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(SET_PASSWORD_HASH)
                .bind(password_hash)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ()),
        }
        .context("Failed to update password hash")
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<()> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(SET_RESET_TOKEN)
                .bind(token_hash)
                .bind(expires)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(SET_RESET_TOKEN)
                .bind(token_hash)
                .bind(expires)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ()),
        }
        .context("Failed to store reset token")
    }

    async fn clear_reset_token(&self, id: i64, token_hash: &str) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(CLEAR_RESET_TOKEN)
                .bind(id)
                .bind(token_hash)
                .execute(pool)
                .await
                .map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(CLEAR_RESET_TOKEN)
                .bind(id)
                .bind(token_hash)
                .execute(pool)
                .await
                .map(|_| ()),
        }
        .context("Failed to clear reset token")
    }

    async fn consume_reset_token(
        &self,
        id: i64,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(CONSUME_RESET_TOKEN)
                .bind(password_hash)
                .bind(now)
                .bind(id)
                .bind(token_hash)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(CONSUME_RESET_TOKEN)
                .bind(password_hash)
                .bind(now)
                .bind(id)
                .bind(token_hash)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to consume reset token")?;

        Ok(affected == 1)
    }

    async fn delete(&self, id: i64) -> Result<AdminGuard> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let affected = sqlx::query(DELETE_USER_GUARDED)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete user")?
                    .rows_affected();
                self.guard_outcome(affected, id).await
            }
            Backend::Mysql(pool) => delete_user_mysql(pool, id).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM users";
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await,
            Backend::Mysql(pool) => sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await,
        }
        .context("Failed to count users")
    }

    async fn count_by_role(&self, role: UserRole) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM users WHERE role = ?";
        let role = role.to_string();
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_scalar::<_, i64>(sql).bind(&role).fetch_one(pool).await,
            Backend::Mysql(pool) => sqlx::query_scalar::<_, i64>(sql).bind(&role).fetch_one(pool).await,
        }
        .context("Failed to count users by role")
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let sql = format!("{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?", SELECT_USER);
        let users = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list users")?;
                rows.iter().map(row_to_user_sqlite).collect::<Result<Vec<_>>>()?
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list users")?;
                rows.iter().map(row_to_user_mysql).collect::<Result<Vec<_>>>()?
            }
        };

        let total = self.count().await?;
        Ok((users, total))
    }
}

impl SqlxUserRepository {
    /// Tell a refused guarded write apart from a missing row
    async fn guard_outcome(&self, affected: u64, id: i64) -> Result<AdminGuard> {
        if affected > 0 {
            return Ok(AdminGuard::Applied);
        }
        Ok(match self.get_by_id(id).await? {
            Some(_) => AdminGuard::LastAdmin,
            None => AdminGuard::Missing,
        })
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User, now: DateTime<Utc>) -> Result<i64> {
    let result = sqlx::query(INSERT_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.status.to_string())
        .bind(&user.avatar)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

async fn fetch_user_sqlite<'q, T>(pool: &SqlitePool, sql: &'q str, key: T) -> Result<Option<User>>
where
    T: 'q + Send + sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    let row = sqlx::query(sql).bind(key).fetch_optional(pool).await?;
    row.as_ref().map(row_to_user_sqlite).transpose()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    let status: String = row.get("status");

    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: UserRole::from_str(&role)
            .with_context(|| format!("Invalid role in database: {}", role))?,
        status: UserStatus::from_str(&status).unwrap_or_default(),
        avatar: row.get("avatar"),
        reset_password_token: row.get("reset_password_token"),
        reset_password_expires: row.get("reset_password_expires"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User, now: DateTime<Utc>) -> Result<i64> {
    let result = sqlx::query(INSERT_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.status.to_string())
        .bind(&user.avatar)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(result.last_insert_id() as i64)
}

async fn fetch_user_mysql<'q, T>(pool: &MySqlPool, sql: &'q str, key: T) -> Result<Option<User>>
where
    T: 'q + Send + sqlx::Encode<'q, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    let row = sqlx::query(sql).bind(key).fetch_optional(pool).await?;
    row.as_ref().map(row_to_user_mysql).transpose()
}

/// Lock the administrator rows and the target row, then decide whether a
/// write that leaves `id` with `new_role` keeps an administrator around.
async fn lock_admin_guard_mysql(
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
    id: i64,
    new_role: Option<UserRole>,
) -> Result<AdminGuard> {
    let admins: Vec<i64> =
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE role = 'admin' FOR UPDATE")
            .fetch_all(&mut **tx)
            .await
            .context("Failed to lock administrators")?;
    let current: Option<String> =
        sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .context("Failed to lock user")?;

    let Some(current) = current else {
        return Ok(AdminGuard::Missing);
    };
    let removes_admin = UserRole::from_str(&current)? == UserRole::Admin
        && new_role != Some(UserRole::Admin);
    if removes_admin && admins.len() <= 1 {
        return Ok(AdminGuard::LastAdmin);
    }
    Ok(AdminGuard::Applied)
}

async fn update_account_mysql(pool: &MySqlPool, user: &User) -> Result<AdminGuard> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let guard = lock_admin_guard_mysql(&mut tx, user.id, Some(user.role)).await?;
    if guard != AdminGuard::Applied {
        return Ok(guard);
    }

    sqlx::query(UPDATE_ACCOUNT)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(user.role.to_string())
        .bind(user.status.to_string())
        .bind(Utc::now())
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update user")?;
    tx.commit().await.context("Failed to commit user update")?;
    Ok(AdminGuard::Applied)
}

async fn delete_user_mysql(pool: &MySqlPool, id: i64) -> Result<AdminGuard> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let guard = lock_admin_guard_mysql(&mut tx, id, None).await?;
    if guard != AdminGuard::Applied {
        return Ok(guard);
    }

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete user")?;
    tx.commit().await.context("Failed to commit user deletion")?;
    Ok(AdminGuard::Applied)
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role: String = row.get("role");
    let status: String = row.get("status");

    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: UserRole::from_str(&role)
            .with_context(|| format!("Invalid role in database: {}", role))?,
        status: UserStatus::from_str(&status).unwrap_or_default(),
        avatar: row.get("avatar"),
        reset_password_token: row.get("reset_password_token"),
        reset_password_expires: row.get("reset_password_expires"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(name: &str, email: &str, role: UserRole) -> User {
        User::new(name.to_string(), email.to_string(), "hash".to_string(), role)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&test_user("Alice", "alice@example.com", UserRole::User))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("User not found");
        assert_eq!(found.name, "Alice");
        assert_eq!(found.role, UserRole::User);
        assert_eq!(found.status, UserStatus::Active);

        let by_email = repo.get_by_email("alice@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("A", "dup@example.com", UserRole::User))
            .await
            .unwrap();

        let err = repo
            .create(&test_user("B", "dup@example.com", UserRole::User))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_token_set_lookup_and_clear() {
        let repo = setup_test_repo().await;
        let user = repo
            .create(&test_user("Bob", "bob@example.com", UserRole::User))
            .await
            .unwrap();

        let expires = Utc::now() + Duration::minutes(10);
        repo.set_reset_token(user.id, "abc123", expires).await.unwrap();

        let found = repo.get_by_reset_token("abc123").await.unwrap().expect("by token");
        assert_eq!(found.id, user.id);
        let stored = found.reset_password_expires.expect("expiry stored");
        assert!((stored - expires).num_seconds().abs() <= 1);

        // a different digest leaves the stored one alone
        repo.clear_reset_token(user.id, "other").await.unwrap();
        assert!(repo.get_by_reset_token("abc123").await.unwrap().is_some());

        repo.clear_reset_token(user.id, "abc123").await.unwrap();
        assert!(repo.get_by_reset_token("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consume_reset_token_only_once() {
        let repo = setup_test_repo().await;
        let user = repo
            .create(&test_user("Bob", "bob@example.com", UserRole::User))
            .await
            .unwrap();
        repo.set_reset_token(user.id, "tok", Utc::now() + Duration::minutes(10))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(repo.consume_reset_token(user.id, "tok", "new-hash", now).await.unwrap());
        assert!(!repo.consume_reset_token(user.id, "tok", "other-hash", now).await.unwrap());

        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");
        assert!(stored.reset_password_token.is_none());
        assert!(stored.reset_password_expires.is_none());
    }

    #[tokio::test]
    async fn test_consume_expired_reset_token_fails() {
        let repo = setup_test_repo().await;
        let user = repo
            .create(&test_user("Bob", "bob@example.com", UserRole::User))
            .await
            .unwrap();
        repo.set_reset_token(user.id, "tok", Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        assert!(!repo
            .consume_reset_token(user.id, "tok", "new-hash", Utc::now())
            .await
            .unwrap());
        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_account_update_keeps_password_and_reset_token() {
        let repo = setup_test_repo().await;
        let user = repo
            .create(&test_user("Bob", "bob@example.com", UserRole::User))
            .await
            .unwrap();

        // stale copy taken before the password and token changed
        let mut stale = repo.get_by_id(user.id).await.unwrap().unwrap();
        repo.set_password_hash(user.id, "rotated").await.unwrap();
        repo.set_reset_token(user.id, "tok", Utc::now() + Duration::minutes(10))
            .await
            .unwrap();

        stale.name = "Robert".to_string();
        assert_eq!(repo.update_account(&stale).await.unwrap(), AdminGuard::Applied);

        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Robert");
        assert_eq!(stored.password_hash, "rotated");
        assert_eq!(stored.reset_password_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_update_account_refuses_last_admin_demotion() {
        let repo = setup_test_repo().await;
        let mut admin = repo
            .create(&test_user("Root", "root@example.com", UserRole::Admin))
            .await
            .unwrap();

        admin.role = UserRole::User;
        assert_eq!(repo.update_account(&admin).await.unwrap(), AdminGuard::LastAdmin);
        assert_eq!(repo.count_by_role(UserRole::Admin).await.unwrap(), 1);

        // renaming the last admin is fine
        admin.role = UserRole::Admin;
        admin.name = "Root2".to_string();
        assert_eq!(repo.update_account(&admin).await.unwrap(), AdminGuard::Applied);

        let mut ghost = admin.clone();
        ghost.id = 999;
        assert_eq!(repo.update_account(&ghost).await.unwrap(), AdminGuard::Missing);
    }

    #[tokio::test]
    async fn test_count_by_role_and_delete() {
        let repo = setup_test_repo().await;
        let admin = repo
            .create(&test_user("Root", "root@example.com", UserRole::Admin))
            .await
            .unwrap();
        let second = repo
            .create(&test_user("Root2", "root2@example.com", UserRole::Admin))
            .await
            .unwrap();
        let user = repo
            .create(&test_user("U", "u@example.com", UserRole::User))
            .await
            .unwrap();

        assert_eq!(repo.count_by_role(UserRole::Admin).await.unwrap(), 2);
        assert_eq!(repo.count_by_role(UserRole::User).await.unwrap(), 1);

        assert_eq!(repo.delete(user.id).await.unwrap(), AdminGuard::Applied);
        assert_eq!(repo.delete(user.id).await.unwrap(), AdminGuard::Missing);

        assert_eq!(repo.delete(admin.id).await.unwrap(), AdminGuard::Applied);
        assert_eq!(repo.delete(second.id).await.unwrap(), AdminGuard::LastAdmin);
        assert_eq!(repo.count_by_role(UserRole::Admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let repo = setup_test_repo().await;
        for i in 0..15 {
            repo.create(&test_user("N", &format!("n{}@example.com", i), UserRole::User))
                .await
                .unwrap();
        }

        let (page1, total) = repo.list(&ListParams::new(1, 10)).await.unwrap();
        assert_eq!(total, 15);
        assert_eq!(page1.len(), 10);
        // newest first
        assert_eq!(page1[0].email, "n14@example.com");

        let (page2, _) = repo.list(&ListParams::new(2, 10)).await.unwrap();
        assert_eq!(page2.len(), 5);
    }
}
