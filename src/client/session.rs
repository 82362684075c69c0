//! Client session and its persistence backends

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::api::responses::AuthResponse;
use crate::models::User;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Persisted form of an authenticated session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: User,
}

/// Where a client keeps its serialized session
pub trait SessionStore {
    /// Raw persisted value, `None` when nothing is stored
    fn load(&self) -> Result<Option<String>, SessionError>;

    fn save(&self, raw: &str) -> Result<(), SessionError>;

    fn clear(&self) -> Result<(), SessionError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a raw value
    pub fn with_value(raw: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(raw.into())),
        }
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, SessionError> {
        let guard = self.value.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&self, raw: &str) -> Result<(), SessionError> {
        let mut guard = self.value.lock().map_err(|_| SessionError::Poisoned)?;
        *guard = Some(raw.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut guard = self.value.lock().map_err(|_| SessionError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// JSON file on disk
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<String>, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, raw: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Explicit auth state of one client
///
/// Lifecycle: `init_from_storage` on start, `set` after login or register,
/// `clear` on logout.
#[derive(Debug)]
pub struct ClientSession<S: SessionStore> {
    store: S,
    current: Option<StoredSession>,
}

impl<S: SessionStore> ClientSession<S> {
    /// Empty session over `store`. Nothing is read until `init_from_storage`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            current: None,
        }
    }

    /// Restore the persisted session. Unreadable data is discarded.
    pub fn init_from_storage(&mut self) -> Result<(), SessionError> {
        self.current = None;
        let Some(raw) = self.store.load()? else {
            return Ok(());
        };

        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(session) if !session.token.is_empty() => {
                self.current = Some(session);
            }
            Ok(_) => {
                tracing::warn!("stored session has no token, discarding");
                self.store.clear()?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored session is corrupt, discarding");
                self.store.clear()?;
            }
        }
        Ok(())
    }

    pub fn set(&mut self, token: impl Into<String>, user: User) -> Result<(), SessionError> {
        let session = StoredSession {
            token: token.into(),
            user,
        };
        self.store.save(&serde_json::to_string(&session)?)?;
        self.current = Some(session);
        Ok(())
    }

    /// Adopt the body of a register/login/reset response
    pub fn set_from_response(&mut self, response: AuthResponse) -> Result<(), SessionError> {
        self.set(response.token, response.user)
    }

    /// Logout
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.current = None;
        self.store.clear()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.current.as_ref().is_some_and(|s| s.user.is_admin())
    }

    pub fn token(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.token.as_str())
    }

    pub fn user(&self) -> Option<&User> {
        self.current.as_ref().map(|s| &s.user)
    }

    /// `Authorization` header value for the current token
    pub fn bearer_header(&self) -> Option<String> {
        self.token().map(|token| format!("Bearer {}", token))
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use tempfile::TempDir;

    fn user(role: UserRole) -> User {
        let mut user = User::new(
            "Client".to_string(),
            "client@example.com".to_string(),
            "hash-never-persisted".to_string(),
            role,
        );
        user.id = 7;
        user
    }

    #[test]
    fn test_new_session_is_anonymous() {
        let session = ClientSession::new(MemoryStore::new());
        assert!(!session.is_authenticated());
        assert!(!session.is_admin());
        assert!(session.bearer_header().is_none());
    }

    #[test]
    fn test_set_and_accessors() {
        let mut session = ClientSession::new(MemoryStore::new());
        session.set("abc.def.ghi", user(UserRole::Admin)).unwrap();

        assert!(session.is_authenticated());
        assert!(session.is_admin());
        assert_eq!(session.bearer_header().as_deref(), Some("Bearer abc.def.ghi"));
        assert_eq!(session.user().unwrap().id, 7);
        assert!(session.store().load().unwrap().is_some());
    }

    #[test]
    fn test_standard_user_is_not_admin() {
        let mut session = ClientSession::new(MemoryStore::new());
        session.set("t", user(UserRole::User)).unwrap();
        assert!(session.is_authenticated());
        assert!(!session.is_admin());
    }

    #[test]
    fn test_corrupt_storage_is_discarded() {
        let mut session = ClientSession::new(MemoryStore::with_value("{not json"));
        session.init_from_storage().unwrap();

        assert!(!session.is_authenticated());
        assert!(session.store().load().unwrap().is_none());
    }

    #[test]
    fn test_password_hash_not_persisted() {
        let mut session = ClientSession::new(MemoryStore::new());
        session.set("t", user(UserRole::User)).unwrap();
        let raw = session.store().load().unwrap().unwrap();
        assert!(!raw.contains("hash-never-persisted"));
    }

    #[test]
    fn test_file_store_survives_reload_and_logout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut first = ClientSession::new(FileStore::new(&path));
        first.init_from_storage().unwrap();
        assert!(!first.is_authenticated());
        first.set("persisted-token", user(UserRole::User)).unwrap();
        assert!(path.exists());

        // Simulated reload
        let mut second = ClientSession::new(FileStore::new(&path));
        second.init_from_storage().unwrap();
        assert!(second.is_authenticated());
        assert_eq!(second.token(), Some("persisted-token"));
        assert_eq!(second.user().unwrap().email, "client@example.com");

        second.clear().unwrap();
        assert!(!second.is_authenticated());
        assert!(!path.exists());

        let mut third = ClientSession::new(FileStore::new(&path));
        third.init_from_storage().unwrap();
        assert!(!third.is_authenticated());
    }

    #[test]
    fn test_file_store_clear_when_missing() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_set_from_response() {
        let mut session = ClientSession::new(MemoryStore::new());
        session
            .set_from_response(AuthResponse {
                success: true,
                token: "from-login".to_string(),
                user: user(UserRole::User),
            })
            .unwrap();
        assert_eq!(session.token(), Some("from-login"));
    }
}
