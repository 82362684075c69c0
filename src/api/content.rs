//! Content API endpoints
//!
//! - GET /api/content, GET /api/content/{id} (optional auth)
//! - POST /api/content, PUT|DELETE /api/content/{id} (auth; author or admin)
//! - PUT /api/content/{id}/like (auth)
//! - GET|POST /api/content/{id}/comments (public / auth)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_limit, default_page, ValidJson, ValidPath, ValidQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{CollectionResponse, DataResponse, ListResponse, MessageResponse};
use crate::models::{
    Comment, CommentInput, Content, ContentFilter, ContentStatus, ContentType, CreateContentInput,
    ListParams, UpdateContentInput,
};

/// Listing query: filters plus pagination
#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
    pub status: Option<ContentStatus>,
    pub tag: Option<String>,
    pub author: Option<i64>,
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl ContentQuery {
    fn split(self) -> (ContentFilter, ListParams) {
        let params = ListParams::new(self.page, self.limit);
        let filter = ContentFilter {
            content_type: self.content_type,
            status: self.status,
            tag: self.tag,
            author_id: self.author,
            search: self.search,
        };
        (filter, params)
    }
}

/// Routes behind `optional_auth`
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_content))
        .route("/{id}", get(get_content))
}

/// Comment listing needs no credential at all
pub fn comments_public_router() -> Router<AppState> {
    Router::new().route("/{id}/comments", get(list_comments))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_content))
        .route("/{id}", put(update_content).delete(delete_content))
        .route("/{id}/like", put(like_content))
        .route("/{id}/comments", post(add_comment))
}

async fn list_content(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    ValidQuery(query): ValidQuery<ContentQuery>,
) -> Result<Json<ListResponse<Content>>, ApiError> {
    let (filter, params) = query.split();
    let page = state
        .content_service
        .list(viewer.as_ref(), filter, &params)
        .await?;
    Ok(Json(page.into()))
}

async fn get_content(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<DataResponse<Content>>, ApiError> {
    let content = state.content_service.get(viewer.as_ref(), id).await?;
    Ok(Json(DataResponse::new(content)))
}

async fn create_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidJson(input): ValidJson<CreateContentInput>,
) -> Result<(StatusCode, Json<DataResponse<Content>>), ApiError> {
    let content = state.content_service.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(content))))
}

async fn update_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(input): ValidJson<UpdateContentInput>,
) -> Result<Json<DataResponse<Content>>, ApiError> {
    let content = state.content_service.update(&user, id, input).await?;
    Ok(Json(DataResponse::new(content)))
}

async fn delete_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.content_service.delete(&user, id).await?;
    Ok(Json(MessageResponse::new("Content deleted")))
}

async fn like_content(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<DataResponse<Content>>, ApiError> {
    let content = state.content_service.like(&user, id).await?;
    Ok(Json(DataResponse::new(content)))
}

async fn list_comments(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<CollectionResponse<Comment>>, ApiError> {
    let comments = state.comment_service.list_for_content(id).await?;
    Ok(Json(CollectionResponse::new(comments)))
}

async fn add_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(input): ValidJson<CommentInput>,
) -> Result<(StatusCode, Json<DataResponse<Comment>>), ApiError> {
    let comment = state.comment_service.create(&user, id, &input.body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(comment))))
}
