//! Data models
//!
//! Database entities (User, Content, Comment) and the input types the
//! services accept.

mod comment;
mod content;
mod user;

pub use comment::{Comment, CommentInput};
pub use content::{
    Content, ContentFilter, ContentStatus, ContentType, CreateContentInput, ListParams,
    PagedResult, UpdateContentInput, DEFAULT_THUMBNAIL,
};
pub use user::{CreateUserInput, UpdateProfileInput, UpdateUserInput, User, UserRole, UserStatus};
