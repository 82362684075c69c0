//! Authentication API endpoints
//!
//! - POST /api/auth/register
//! - POST /api/auth/login
//! - GET|POST /api/auth/logout
//! - POST /api/auth/forgot-password
//! - PATCH /api/auth/reset-password/{token}
//! - PATCH /api/auth/update-password (auth)
//! - GET /api/auth/me (auth)

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{ValidJson, ValidPath};
use crate::api::middleware::{
    clear_session_cookie, session_cookie, ApiError, AppState, AuthenticatedUser,
};
use crate::api::responses::{AuthResponse, DataResponse, MessageResponse};
use crate::services::{AuthSession, RegisterInput};

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, password reset instructions have been sent";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForgotPasswordResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

/// Routes that need no credential
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout).post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", patch(reset_password))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/update-password", patch(update_password))
}

/// Body plus the cookie carrying the new token
fn token_response(
    state: &AppState,
    status: StatusCode,
    session: AuthSession,
) -> Result<impl IntoResponse, ApiError> {
    let cookie = session_cookie(
        &state.auth.cookie_name,
        &session.token,
        state.tokens.ttl_secs(),
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );

    Ok((
        status,
        headers,
        Json(AuthResponse {
            success: true,
            token: session.token,
            user: session.user,
        }),
    ))
}

async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .auth_service
        .register(RegisterInput::new(body.name, body.email, body.password))
        .await?;
    token_response(&state, StatusCode::CREATED, session)
}

async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth_service.login(&body.email, &body.password).await?;
    token_response(&state, StatusCode::OK, session)
}

/// Stateless: only the cookie is cleared.
async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&clear_session_cookie(&state.auth.cookie_name))
            .map_err(ApiError::internal)?,
    );
    Ok((headers, Json(MessageResponse::new("Logged out"))))
}

async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<DataResponse<crate::models::User>> {
    Json(DataResponse::new(user))
}

async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, ApiError> {
    let reset_token = state.auth_service.forgot_password(&body.email).await?;
    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: FORGOT_PASSWORD_MESSAGE.to_string(),
        reset_token,
    }))
}

async fn reset_password(
    State(state): State<AppState>,
    ValidPath(token): ValidPath<String>,
    ValidJson(body): ValidJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .auth_service
        .reset_password(&token, &body.password)
        .await?;
    token_response(&state, StatusCode::OK, session)
}

async fn update_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidJson(body): ValidJson<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .auth_service
        .update_password(user.id, &body.current_password, &body.new_password)
        .await?;
    token_response(&state, StatusCode::OK, session)
}
