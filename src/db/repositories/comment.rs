//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Comment, ListParams};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, content_id: i64, author_id: i64, body: &str) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// All comments on one content item, newest first
    async fn list_for_content(&self, content_id: i64) -> Result<Vec<Comment>>;

    /// Every comment, newest first
    async fn list(&self, params: &ListParams) -> Result<(Vec<Comment>, i64)>;

    /// Replace the body and mark the comment as edited
    async fn update_body(&self, id: i64, body: &str) -> Result<Option<Comment>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn increment_likes(&self, id: i64) -> Result<bool>;

    async fn count_for_content(&self, content_id: i64) -> Result<i64>;
}

/// SQLx-based comment repository for SQLite and MySQL
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_COMMENT: &str = r#"
    SELECT c.id, c.content_id, c.author_id, u.name AS author_name, c.body,
           c.likes, c.is_edited, c.created_at, c.updated_at
    FROM comments c
    LEFT JOIN users u ON u.id = c.author_id
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, content_id: i64, author_id: i64, body: &str) -> Result<Comment> {
        let now = Utc::now();
        let sql = r#"INSERT INTO comments (content_id, author_id, body, likes, is_edited, created_at, updated_at)
                     VALUES (?, ?, ?, 0, ?, ?, ?)"#;
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(content_id)
                .bind(author_id)
                .bind(body)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.last_insert_rowid()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(content_id)
                .bind(author_id)
                .bind(body)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create comment")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Comment not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("{} WHERE c.id = ?", SELECT_COMMENT);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
                Ok(row.as_ref().map(row_to_comment_sqlite))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
                Ok(row.as_ref().map(row_to_comment_mysql))
            }
        }
    }

    async fn list_for_content(&self, content_id: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            "{} WHERE c.content_id = ? ORDER BY c.created_at DESC, c.id DESC",
            SELECT_COMMENT
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql).bind(content_id).fetch_all(pool).await?;
                Ok(rows.iter().map(row_to_comment_sqlite).collect())
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql).bind(content_id).fetch_all(pool).await?;
                Ok(rows.iter().map(row_to_comment_mysql).collect())
            }
        }
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<Comment>, i64)> {
        let sql = format!(
            "{} ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
            SELECT_COMMENT
        );
        let count_sql = "SELECT COUNT(*) FROM comments";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let total = sqlx::query_scalar::<_, i64>(count_sql).fetch_one(pool).await?;
                let rows = sqlx::query(&sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await?;
                Ok((rows.iter().map(row_to_comment_sqlite).collect(), total))
            }
            Backend::Mysql(pool) => {
                let total = sqlx::query_scalar::<_, i64>(count_sql).fetch_one(pool).await?;
                let rows = sqlx::query(&sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await?;
                Ok((rows.iter().map(row_to_comment_mysql).collect(), total))
            }
        }
    }

    async fn update_body(&self, id: i64, body: &str) -> Result<Option<Comment>> {
        let sql = "UPDATE comments SET body = ?, is_edited = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(body)
                .bind(true)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(body)
                .bind(true)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to update comment")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM comments WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => exec_by_id_sqlite(pool, sql, id).await,
            Backend::Mysql(pool) => exec_by_id_mysql(pool, sql, id).await,
        }
        .context("Failed to delete comment")?;
        Ok(affected > 0)
    }

    async fn increment_likes(&self, id: i64) -> Result<bool> {
        let sql = "UPDATE comments SET likes = likes + 1 WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => exec_by_id_sqlite(pool, sql, id).await,
            Backend::Mysql(pool) => exec_by_id_mysql(pool, sql, id).await,
        }
        .context("Failed to like comment")?;
        Ok(affected > 0)
    }

    async fn count_for_content(&self, content_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM comments WHERE content_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar::<_, i64>(sql).bind(content_id).fetch_one(pool).await
            }
            Backend::Mysql(pool) => {
                sqlx::query_scalar::<_, i64>(sql).bind(content_id).fetch_one(pool).await
            }
        }
        .context("Failed to count comments")
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

/// Run a single-id statement and report the affected row count
async fn exec_by_id_sqlite(pool: &SqlitePool, sql: &str, id: i64) -> Result<u64> {
    Ok(sqlx::query(sql).bind(id).execute(pool).await?.rows_affected())
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        content_id: row.get("content_id"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        body: row.get("body"),
        likes: row.get("likes"),
        is_edited: row.get("is_edited"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn exec_by_id_mysql(pool: &MySqlPool, sql: &str, id: i64) -> Result<u64> {
    Ok(sqlx::query(sql).bind(id).execute(pool).await?.rows_affected())
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        content_id: row.get("content_id"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        body: row.get("body"),
        likes: row.get("likes"),
        is_edited: row.get("is_edited"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
