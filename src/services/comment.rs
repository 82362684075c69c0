//! Comment service
//!
//! Comments belong to one content item. Only the author or an administrator
//! may edit or delete a comment; editing marks it as edited.

use crate::db::repositories::{CommentRepository, ContentRepository};
use crate::models::{Comment, ListParams, PagedResult, User};
use anyhow::Context;
use std::sync::Arc;

/// Maximum comment length in characters
pub const MAX_COMMENT_LEN: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    comment_repo: Arc<dyn CommentRepository>,
    content_repo: Arc<dyn ContentRepository>,
}

impl CommentService {
    pub fn new(
        comment_repo: Arc<dyn CommentRepository>,
        content_repo: Arc<dyn ContentRepository>,
    ) -> Self {
        Self {
            comment_repo,
            content_repo,
        }
    }

    /// Comments on one content item, newest first
    pub async fn list_for_content(&self, content_id: i64) -> Result<Vec<Comment>, CommentServiceError> {
        self.ensure_content(content_id).await?;
        Ok(self
            .comment_repo
            .list_for_content(content_id)
            .await
            .context("Failed to list comments")?)
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<Comment>, CommentServiceError> {
        let (items, total) = self
            .comment_repo
            .list(params)
            .await
            .context("Failed to list comments")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.comment_repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or_else(|| comment_not_found(id))
    }

    pub async fn create(
        &self,
        author: &User,
        content_id: i64,
        body: &str,
    ) -> Result<Comment, CommentServiceError> {
        let body = validate_body(body)?;
        self.ensure_content(content_id).await?;

        let comment = self
            .comment_repo
            .create(content_id, author.id, &body)
            .await
            .context("Failed to create comment")?;

        tracing::info!(comment_id = comment.id, content_id, author_id = author.id, "comment added");
        Ok(comment)
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        body: &str,
    ) -> Result<Comment, CommentServiceError> {
        let body = validate_body(body)?;
        self.get_owned(actor, id).await?;

        self.comment_repo
            .update_body(id, &body)
            .await
            .context("Failed to update comment")?
            .ok_or_else(|| comment_not_found(id))
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), CommentServiceError> {
        self.get_owned(actor, id).await?;

        let deleted = self
            .comment_repo
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        if !deleted {
            return Err(comment_not_found(id));
        }

        tracing::info!(comment_id = id, actor_id = actor.id, "comment deleted");
        Ok(())
    }

    pub async fn like(&self, id: i64) -> Result<Comment, CommentServiceError> {
        let liked = self
            .comment_repo
            .increment_likes(id)
            .await
            .context("Failed to like comment")?;
        if !liked {
            return Err(comment_not_found(id));
        }
        self.get(id).await
    }

    async fn ensure_content(&self, content_id: i64) -> Result<(), CommentServiceError> {
        let exists = self
            .content_repo
            .get_by_id(content_id)
            .await
            .context("Failed to get content")?
            .is_some();
        if !exists {
            return Err(CommentServiceError::NotFound(format!(
                "Content not found with id of {}",
                content_id
            )));
        }
        Ok(())
    }

    async fn get_owned(&self, actor: &User, id: i64) -> Result<Comment, CommentServiceError> {
        let comment = self.get(id).await?;
        if !actor.can_modify(comment.author_id) {
            tracing::warn!(comment_id = id, actor_id = actor.id, "comment modification refused");
            return Err(CommentServiceError::Forbidden(format!(
                "User {} is not authorized to modify this comment",
                actor.id
            )));
        }
        Ok(comment)
    }
}

fn validate_body(body: &str) -> Result<String, CommentServiceError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(CommentServiceError::ValidationError(
            "Please add some text".to_string(),
        ));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(CommentServiceError::ValidationError(format!(
            "Comment can not be more than {} characters",
            MAX_COMMENT_LEN
        )));
    }
    Ok(body.to_string())
}

fn comment_not_found(id: i64) -> CommentServiceError {
    CommentServiceError::NotFound(format!("Comment not found with id of {}", id))
}
