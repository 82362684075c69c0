//! API middleware
//!
//! Contains:
//! - shared application state
//! - the JSON error type and its mapping from service errors
//! - authentication (bearer token, then cookie) and role gates
//! - extractors for the authenticated user

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

use crate::config::{AuthConfig, Config};
use crate::db::repositories::{SqlxCommentRepository, SqlxContentRepository, SqlxUserRepository};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::{
    AuthService, AuthServiceError, CommentService, CommentServiceError, ContentService,
    ContentServiceError, Mailer, SmtpMailer, TokenError, TokenService, UserService,
    UserServiceError,
};

/// Message returned to clients for any internal failure
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong on the server";

/// Application state shared with all handlers
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub content_service: Arc<ContentService>,
    pub comment_service: Arc<CommentService>,
    pub tokens: Arc<TokenService>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    /// Wire repositories and services over `pool`.
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let mailer = SmtpMailer::from_config(&config.mail);
        Self::with_mailer(pool, config, mailer)
    }

    pub fn with_mailer(
        pool: DynDatabasePool,
        config: &Config,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let content_repo = SqlxContentRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool);

        let tokens = Arc::new(TokenService::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl_secs,
        ));
        let user_service = Arc::new(UserService::new(user_repo.clone()));
        let auth_service = Arc::new(
            AuthService::new(user_repo, user_service.clone(), tokens.clone(), &config.auth)
                .with_mailer(mailer),
        );

        Self {
            user_service,
            auth_service,
            content_service: Arc::new(ContentService::new(content_repo.clone())),
            comment_service: Arc::new(CommentService::new(comment_repo, content_repo)),
            tokens,
            auth: Arc::new(config.auth.clone()),
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// User attached by `optional_auth`, if any
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn invalid_credentials() -> Self {
        Self::new("INVALID_CREDENTIALS", "Invalid credentials")
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new("INVALID_TOKEN", message)
    }

    /// Log the cause and return the generic 500 body
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "internal server error");
        Self::new("INTERNAL_ERROR", INTERNAL_ERROR_MESSAGE)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" | "INVALID_TOKEN" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" | "INVALID_CREDENTIALS" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::NotFound(msg) => ApiError::not_found(msg),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::Conflict(msg) => ApiError::conflict(msg),
            UserServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AuthServiceError::Conflict(msg) => ApiError::conflict(msg),
            AuthServiceError::InvalidCredentials => ApiError::invalid_credentials(),
            AuthServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            AuthServiceError::NotFound(msg) => ApiError::not_found(msg),
            AuthServiceError::InvalidResetToken => {
                ApiError::invalid_token("Invalid or expired reset token")
            }
            AuthServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<ContentServiceError> for ApiError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::NotFound(msg) => ApiError::not_found(msg),
            ContentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ContentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ContentServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(msg) => ApiError::not_found(msg),
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CommentServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

/// Extract the bearer credential: `Authorization: Bearer` first, then the cookie
pub fn extract_bearer_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = cookie_header.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            if let Some((name, value)) = cookie.trim().split_once('=') {
                if name == cookie_name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}

/// Resolve the credential on a request to a user
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = extract_bearer_token(headers, &state.auth.cookie_name)
        .ok_or_else(|| ApiError::unauthorized("Not authorized to access this route"))?;

    let user_id = state.tokens.verify(&token).map_err(|e| {
        match e {
            TokenError::Expired => tracing::debug!("rejected expired token"),
            _ => tracing::debug!(error = %e, "rejected invalid token"),
        }
        ApiError::unauthorized("Not authorized to access this route")
    })?;

    state
        .user_service
        .find(user_id)
        .await?
        .ok_or_else(|| {
            tracing::debug!(user_id, "token subject no longer exists");
            ApiError::unauthorized("Not authorized to access this route")
        })
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// Attaches the user when a valid credential is present, otherwise continues
/// anonymously.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match authenticate(&state, request.headers()).await {
        Ok(user) => Some(user),
        Err(_) => None,
    };
    if let Some(user) = &user {
        request.extensions_mut().insert(AuthenticatedUser(user.clone()));
    }
    request.extensions_mut().insert(MaybeUser(user));
    next.run(request).await
}

/// Whether `role` is one of `allowed`
pub fn role_allowed(role: UserRole, allowed: &[UserRole]) -> bool {
    allowed.iter().any(|a| match (a, role) {
        (UserRole::Admin, UserRole::Admin) | (UserRole::User, UserRole::User) => true,
        (UserRole::Admin, UserRole::User) | (UserRole::User, UserRole::Admin) => false,
    })
}

/// Role gate. Must run after `require_auth`.
pub async fn authorize(
    allowed: &[UserRole],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Not authorized to access this route"))?;

    if !role_allowed(user.0.role, allowed) {
        tracing::warn!(user_id = user.0.id, role = %user.0.role, "role gate refused request");
        return Err(ApiError::forbidden(format!(
            "User role {} is not authorized to access this route",
            user.0.role
        )));
    }

    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize(&[UserRole::Admin], request, next).await
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authorized to access this route"))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<MaybeUser>()
            .cloned()
            .unwrap_or(MaybeUser(None)))
    }
}

/// Panic handler for `CatchPanicLayer`: generic JSON 500
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::internal(format!("handler panicked: {}", detail)).into_response()
}

/// JSON 404 for unknown routes
pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

/// `Set-Cookie` value carrying the session token
pub fn session_cookie(name: &str, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, token, max_age_secs
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}
