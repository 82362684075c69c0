//! Comment API endpoints
//!
//! - GET /api/comments, GET /api/comments/{id} (public)
//! - PUT|DELETE /api/comments/{id} (auth; author or admin)
//! - PUT /api/comments/{id}/like (auth)

use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};

use crate::api::common::{PaginationQuery, ValidJson, ValidPath, ValidQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{DataResponse, ListResponse, MessageResponse};
use crate::models::{Comment, CommentInput};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments))
        .route("/{id}", get(get_comment))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/{id}", put(update_comment).delete(delete_comment))
        .route("/{id}/like", put(like_comment))
}

async fn list_comments(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<PaginationQuery>,
) -> Result<Json<ListResponse<Comment>>, ApiError> {
    let page = state.comment_service.list(&query.params()).await?;
    Ok(Json(page.into()))
}

async fn get_comment(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<DataResponse<Comment>>, ApiError> {
    let comment = state.comment_service.get(id).await?;
    Ok(Json(DataResponse::new(comment)))
}

async fn update_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(input): ValidJson<CommentInput>,
) -> Result<Json<DataResponse<Comment>>, ApiError> {
    let comment = state.comment_service.update(&user, id, &input.body).await?;
    Ok(Json(DataResponse::new(comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.comment_service.delete(&user, id).await?;
    Ok(Json(MessageResponse::new("Comment deleted")))
}

async fn like_comment(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<DataResponse<Comment>>, ApiError> {
    let comment = state.comment_service.like(id).await?;
    Ok(Json(DataResponse::new(comment)))
}
