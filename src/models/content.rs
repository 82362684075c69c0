//! Content model
//!
//! A content item is an article, video, image or link published by a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default thumbnail for items without one
pub const DEFAULT_THUMBNAIL: &str = "no-photo.jpg";

/// Content entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: i64,
    pub title: String,
    /// URL-friendly unique identifier derived from the title
    pub slug: String,
    pub description: String,
    pub body: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub tags: Vec<String>,
    pub author_id: i64,
    /// Author display name, filled by listing queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub status: ContentStatus,
    pub views: i64,
    pub likes: i64,
    pub thumbnail: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }
}

/// Kind of content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Article,
    Video,
    Image,
    Link,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Article => write!(f, "article"),
            ContentType::Video => write!(f, "video"),
            ContentType::Image => write!(f, "image"),
            ContentType::Link => write!(f, "link"),
        }
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "article" => Ok(ContentType::Article),
            "video" => Ok(ContentType::Video),
            "image" => Ok(ContentType::Image),
            "link" => Ok(ContentType::Link),
            _ => Err(anyhow::anyhow!("Invalid content type: {}", s)),
        }
    }
}

/// Publication state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentStatus::Draft => write!(f, "draft"),
            ContentStatus::Published => write!(f, "published"),
            ContentStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for ContentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ContentStatus::Draft),
            "published" => Ok(ContentStatus::Published),
            "archived" => Ok(ContentStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid content status: {}", s)),
        }
    }
}

/// Input for creating a content item
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContentInput {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: ContentStatus,
    pub thumbnail: Option<String>,
    pub url: Option<String>,
}

/// Input for updating a content item. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContentInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ContentStatus>,
    pub thumbnail: Option<String>,
    pub url: Option<String>,
}

/// Listing filters
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub content_type: Option<ContentType>,
    pub status: Option<ContentStatus>,
    pub tag: Option<String>,
    pub author_id: Option<i64>,
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
}

/// Pagination parameters
#[derive(Debug, Clone, Copy)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        let per_page = i64::from(self.per_page);
        u32::try_from((self.total + per_page - 1) / per_page).unwrap_or(u32::MAX)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_clamps() {
        let p = ListParams::new(0, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 1);

        let p = ListParams::new(3, 500);
        assert_eq!(p.per_page, 100);
        assert_eq!(p.offset(), 200);
        assert_eq!(p.limit(), 100);
    }

    #[test]
    fn test_total_pages() {
        let params = ListParams::new(1, 10);
        assert_eq!(PagedResult::<()>::new(vec![], 0, &params).total_pages(), 0);
        assert_eq!(PagedResult::<()>::new(vec![], 10, &params).total_pages(), 1);
        assert_eq!(PagedResult::<()>::new(vec![], 11, &params).total_pages(), 2);
    }

    #[test]
    fn test_create_input_defaults() {
        let input: CreateContentInput = serde_json::from_str(
            r#"{"title":"Hello","description":"d","body":"b"}"#,
        )
        .unwrap();
        assert_eq!(input.content_type, ContentType::Article);
        assert_eq!(input.status, ContentStatus::Draft);
        assert!(input.tags.is_empty());
    }

    #[test]
    fn test_type_field_is_renamed() {
        let input: CreateContentInput = serde_json::from_str(
            r#"{"title":"Clip","description":"d","body":"b","type":"video"}"#,
        )
        .unwrap();
        assert_eq!(input.content_type, ContentType::Video);
        assert!(ContentType::from_str("podcast").is_err());
        assert_eq!(ContentStatus::from_str("Published").unwrap(), ContentStatus::Published);
    }
}
