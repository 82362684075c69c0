//! Content repository
//!
//! - `ContentRepository` trait defining content data access
//! - `SqlxContentRepository` implementing it for SQLite and MySQL
//!
//! Tags are stored as a JSON array in a TEXT column.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Content, ContentFilter, ContentStatus, ContentType, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert a content item. A taken slug fails with a unique violation.
    async fn create(&self, content: &Content) -> Result<Content>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Content>>;

    /// Whether `slug` is used by any item other than `exclude_id`
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Filtered listing, newest first
    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<Content>, i64)>;

    async fn update(&self, content: &Content) -> Result<Content>;

    /// Delete an item and all of its comments in one transaction.
    /// Returns false when the item did not exist.
    async fn delete_with_comments(&self, id: i64) -> Result<bool>;

    async fn increment_views(&self, id: i64) -> Result<bool>;

    async fn increment_likes(&self, id: i64) -> Result<bool>;
}

pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_CONTENT: &str = r#"
    SELECT c.id, c.title, c.slug, c.description, c.body, c.content_type, c.tags,
           c.author_id, u.name AS author_name, c.status, c.views, c.likes,
           c.thumbnail, c.url, c.created_at, c.updated_at
    FROM contents c
    LEFT JOIN users u ON u.id = c.author_id
"#;

const INSERT_CONTENT: &str = r#"
    INSERT INTO contents (title, slug, description, body, content_type, tags, author_id,
                          status, views, likes, thumbnail, url, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?)
"#;

const UPDATE_CONTENT: &str = r#"
    UPDATE contents
    SET title = ?, slug = ?, description = ?, body = ?, content_type = ?, tags = ?,
        status = ?, thumbnail = ?, url = ?, updated_at = ?
    WHERE id = ?
"#;

/// Bind value for dynamically built WHERE clauses
enum FilterArg {
    Text(String),
    Int(i64),
}

/// Escape LIKE wildcards, using `!` as the escape character
fn escape_like(value: &str) -> String {
    value
        .replace('!', "!!")
        .replace('%', "!%")
        .replace('_', "!_")
}

fn build_where(filter: &ContentFilter) -> (String, Vec<FilterArg>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();

    if let Some(content_type) = filter.content_type {
        clauses.push("c.content_type = ?");
        args.push(FilterArg::Text(content_type.to_string()));
    }
    if let Some(status) = filter.status {
        clauses.push("c.status = ?");
        args.push(FilterArg::Text(status.to_string()));
    }
    if let Some(author_id) = filter.author_id {
        clauses.push("c.author_id = ?");
        args.push(FilterArg::Int(author_id));
    }
    if let Some(tag) = filter.tag.as_deref().filter(|t| !t.is_empty()) {
        // Match the JSON-encoded element, quotes included
        let encoded = serde_json::to_string(tag).unwrap_or_default();
        clauses.push("c.tags LIKE ? ESCAPE '!'");
        args.push(FilterArg::Text(format!("%{}%", escape_like(&encoded))));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        clauses.push("(LOWER(c.title) LIKE ? ESCAPE '!' OR LOWER(c.description) LIKE ? ESCAPE '!')");
        args.push(FilterArg::Text(pattern.clone()));
        args.push(FilterArg::Text(pattern));
    }

    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

fn tags_to_json(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).context("Failed to encode tags")
}

fn tags_from_json(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn create(&self, content: &Content) -> Result<Content> {
        let now = Utc::now();
        let tags = tags_to_json(&content.tags)?;
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(INSERT_CONTENT)
                .bind(&content.title)
                .bind(&content.slug)
                .bind(&content.description)
                .bind(&content.body)
                .bind(content.content_type.to_string())
                .bind(&tags)
                .bind(content.author_id)
                .bind(content.status.to_string())
                .bind(&content.thumbnail)
                .bind(&content.url)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.last_insert_rowid()),
            Backend::Mysql(pool) => sqlx::query(INSERT_CONTENT)
                .bind(&content.title)
                .bind(&content.slug)
                .bind(&content.description)
                .bind(&content.body)
                .bind(content.content_type.to_string())
                .bind(&tags)
                .bind(content.author_id)
                .bind(content.status.to_string())
                .bind(&content.thumbnail)
                .bind(&content.url)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create content")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Content not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Content>> {
        let sql = format!("{} WHERE c.id = ?", SELECT_CONTENT);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get content by ID")?;
                row.as_ref().map(row_to_content_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get content by ID")?;
                row.as_ref().map(row_to_content_mysql).transpose()
            }
        }
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM contents WHERE slug = ? AND id <> ?";
        let exclude = exclude_id.unwrap_or(0);
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(slug)
                    .bind(exclude)
                    .fetch_one(pool)
                    .await
            }
            Backend::Mysql(pool) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(slug)
                    .bind(exclude)
                    .fetch_one(pool)
                    .await
            }
        }
        .context("Failed to check slug")?;
        Ok(count > 0)
    }

    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<Content>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_sqlite(pool, filter, params).await,
            Backend::Mysql(pool) => list_mysql(pool, filter, params).await,
        }
    }

    async fn update(&self, content: &Content) -> Result<Content> {
        let tags = tags_to_json(&content.tags)?;
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(UPDATE_CONTENT)
                .bind(&content.title)
                .bind(&content.slug)
                .bind(&content.description)
                .bind(&content.body)
                .bind(content.content_type.to_string())
                .bind(&tags)
                .bind(content.status.to_string())
                .bind(&content.thumbnail)
                .bind(&content.url)
                .bind(Utc::now())
                .bind(content.id)
                .execute(pool)
                .await
                .map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(UPDATE_CONTENT)
                .bind(&content.title)
                .bind(&content.slug)
                .bind(&content.description)
                .bind(&content.body)
                .bind(content.content_type.to_string())
                .bind(&tags)
                .bind(content.status.to_string())
                .bind(&content.thumbnail)
                .bind(&content.url)
                .bind(Utc::now())
                .bind(content.id)
                .execute(pool)
                .await
                .map(|_| ()),
        }
        .context("Failed to update content")?;

        self.get_by_id(content.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Content not found after update"))
    }

    async fn delete_with_comments(&self, id: i64) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_with_comments_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_with_comments_mysql(pool, id).await,
        }
        .context("Failed to delete content")
    }

    async fn increment_views(&self, id: i64) -> Result<bool> {
        self.bump_counter("UPDATE contents SET views = views + 1 WHERE id = ?", id)
            .await
            .context("Failed to increment views")
    }

    async fn increment_likes(&self, id: i64) -> Result<bool> {
        self.bump_counter("UPDATE contents SET likes = likes + 1 WHERE id = ?", id)
            .await
            .context("Failed to increment likes")
    }
}

impl SqlxContentRepository {
    async fn bump_counter(&self, sql: &str, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_sqlite(
    pool: &SqlitePool,
    filter: &ContentFilter,
    params: &ListParams,
) -> Result<(Vec<Content>, i64)> {
    let (where_sql, args) = build_where(filter);

    let count_sql = format!("SELECT COUNT(*) FROM contents c{}", where_sql);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_query = match arg {
            FilterArg::Text(s) => count_query.bind(s),
            FilterArg::Int(i) => count_query.bind(i),
        };
    }
    let total = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count contents")?;

    let list_sql = format!(
        "{}{} ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
        SELECT_CONTENT, where_sql
    );
    let mut query = sqlx::query(&list_sql);
    for arg in &args {
        query = match arg {
            FilterArg::Text(s) => query.bind(s),
            FilterArg::Int(i) => query.bind(i),
        };
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list contents")?;

    let items = rows.iter().map(row_to_content_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn delete_with_comments_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM comments WHERE content_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let affected = sqlx::query("DELETE FROM contents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(affected > 0)
}

fn row_to_content_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Content> {
    let content_type: String = row.get("content_type");
    let status: String = row.get("status");
    let tags: String = row.get("tags");

    Ok(Content {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        body: row.get("body"),
        content_type: ContentType::from_str(&content_type)?,
        tags: tags_from_json(&tags),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        status: ContentStatus::from_str(&status)?,
        views: row.get("views"),
        likes: row.get("likes"),
        thumbnail: row.get("thumbnail"),
        url: row.get("url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_mysql(
    pool: &MySqlPool,
    filter: &ContentFilter,
    params: &ListParams,
) -> Result<(Vec<Content>, i64)> {
    let (where_sql, args) = build_where(filter);

    let count_sql = format!("SELECT COUNT(*) FROM contents c{}", where_sql);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_query = match arg {
            FilterArg::Text(s) => count_query.bind(s),
            FilterArg::Int(i) => count_query.bind(i),
        };
    }
    let total = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count contents")?;

    let list_sql = format!(
        "{}{} ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
        SELECT_CONTENT, where_sql
    );
    let mut query = sqlx::query(&list_sql);
    for arg in &args {
        query = match arg {
            FilterArg::Text(s) => query.bind(s),
            FilterArg::Int(i) => query.bind(i),
        };
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list contents")?;

    let items = rows.iter().map(row_to_content_mysql).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn delete_with_comments_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM comments WHERE content_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let affected = sqlx::query("DELETE FROM contents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(affected > 0)
}

fn row_to_content_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Content> {
    let content_type: String = row.get("content_type");
    let status: String = row.get("status");
    let tags: String = row.get("tags");

    Ok(Content {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        body: row.get("body"),
        content_type: ContentType::from_str(&content_type)?,
        tags: tags_from_json(&tags),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        status: ContentStatus::from_str(&status)?,
        views: row.get("views"),
        likes: row.get("likes"),
        thumbnail: row.get("thumbnail"),
        url: row.get("url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
