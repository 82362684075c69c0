//! Client-side auth state
//!
//! A `ClientSession` owns the token and user a client received from the
//! auth endpoints and persists them through a `SessionStore`.

pub mod session;

pub use session::{ClientSession, FileStore, MemoryStore, SessionError, SessionStore, StoredSession};
