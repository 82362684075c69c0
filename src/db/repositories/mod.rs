//! Database repositories
//!
//! One repository per entity, each a trait with an SQLx implementation.

pub mod comment;
pub mod content;
pub mod user;

pub use comment::{CommentRepository, SqlxCommentRepository};
pub use content::{ContentRepository, SqlxContentRepository};
pub use user::{AdminGuard, SqlxUserRepository, UserRepository};
