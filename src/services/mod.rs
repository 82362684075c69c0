//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories:
//! - validation and error classification
//! - ownership and role checks
//! - token issuing and password handling

pub mod auth;
pub mod comment;
pub mod content;
pub mod email;
pub mod password;
pub mod token;
pub mod user;

pub use auth::{AuthService, AuthServiceError, AuthSession, RegisterInput};
pub use comment::{CommentService, CommentServiceError};
pub use content::{generate_slug, ContentService, ContentServiceError};
pub use email::{Mailer, SmtpMailer};
pub use password::{hash_password, verify_password};
pub use token::{TokenError, TokenService};
pub use user::{UserService, UserServiceError};
