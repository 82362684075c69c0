//! User API endpoints
//!
//! - GET /api/users (admin)
//! - GET|PUT /api/users/me
//! - GET|PUT /api/users/{id} (self or admin; role/status admin only)
//! - DELETE /api/users/{id} (admin)

use axum::{
    extract::State,
    routing::{delete, get},
    Json, Router,
};

use crate::api::common::{PaginationQuery, ValidJson, ValidPath, ValidQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{DataResponse, ListResponse, MessageResponse};
use crate::models::{UpdateProfileInput, UpdateUserInput, User};

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/{id}", get(get_user).put(update_user))
}

/// Routes behind `require_auth` and `require_admin`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", delete(delete_user))
}

async fn list_users(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<PaginationQuery>,
) -> Result<Json<ListResponse<User>>, ApiError> {
    let page = state.user_service.list(&query.params()).await?;
    Ok(Json(page.into()))
}

async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<DataResponse<User>> {
    Json(DataResponse::new(user))
}

async fn update_me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidJson(input): ValidJson<UpdateProfileInput>,
) -> Result<Json<DataResponse<User>>, ApiError> {
    let updated = state.user_service.update_profile(user.id, input).await?;
    Ok(Json(DataResponse::new(updated)))
}

async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<DataResponse<User>>, ApiError> {
    let user = state.user_service.get_as(&actor, id).await?;
    Ok(Json(DataResponse::new(user)))
}

async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(input): ValidJson<UpdateUserInput>,
) -> Result<Json<DataResponse<User>>, ApiError> {
    let user = state.user_service.update_as(&actor, id, input).await?;
    Ok(Json(DataResponse::new(user)))
}

async fn delete_user(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.delete(id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}
