//! Content service
//!
//! Business rules for content items:
//! - title/description/body validation and unique slug generation
//! - visibility: non-admins only see published items, except their own
//! - author-or-admin ownership for update and delete
//! - view and like counters

use crate::db::is_unique_violation;
use crate::db::repositories::ContentRepository;
use crate::models::{
    Content, ContentFilter, ContentStatus, CreateContentInput, ListParams, PagedResult,
    UpdateContentInput, User, DEFAULT_THUMBNAIL,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Upper bound on numeric suffixes tried before giving up on a slug
const MAX_SLUG_ATTEMPTS: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ContentService {
    repo: Arc<dyn ContentRepository>,
}

impl ContentService {
    pub fn new(repo: Arc<dyn ContentRepository>) -> Self {
        Self { repo }
    }

    /// Filtered listing as seen by `viewer`.
    ///
    /// Anonymous users and non-admins are limited to published items unless
    /// they filter on their own author id.
    pub async fn list(
        &self,
        viewer: Option<&User>,
        filter: ContentFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Content>, ContentServiceError> {
        let filter = visible_filter(viewer, filter);
        let (items, total) = self
            .repo
            .list(&filter, params)
            .await
            .context("Failed to list content")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Fetch one item and count the view.
    pub async fn get(&self, viewer: Option<&User>, id: i64) -> Result<Content, ContentServiceError> {
        let mut content = self.find_visible(viewer, id).await?;

        self.repo
            .increment_views(id)
            .await
            .context("Failed to record view")?;
        content.views += 1;

        Ok(content)
    }

    pub async fn create(
        &self,
        author: &User,
        input: CreateContentInput,
    ) -> Result<Content, ContentServiceError> {
        let title = validate_title(&input.title)?;
        let description = validate_description(&input.description)?;
        let body = validate_body(&input.body)?;
        let base = slug_base(&title);

        let now = Utc::now();
        let mut content = Content {
            id: 0,
            title,
            slug: String::new(),
            description,
            body,
            content_type: input.content_type,
            tags: clean_tags(input.tags),
            author_id: author.id,
            author_name: None,
            status: input.status,
            views: 0,
            likes: 0,
            thumbnail: input
                .thumbnail
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_THUMBNAIL.to_string()),
            url: clean_url(input.url),
            created_at: now,
            updated_at: now,
        };

        for attempt in 0..=MAX_SLUG_ATTEMPTS {
            let slug = slug_candidate(&base, attempt);
            if self.slug_taken(&slug, None).await? {
                continue;
            }
            content.slug = slug;
            match self.repo.create(&content).await {
                Ok(created) => {
                    tracing::info!(content_id = created.id, author_id = author.id, slug = %created.slug, "content created");
                    return Ok(created);
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!(slug = %content.slug, "slug claimed concurrently, retrying");
                }
                Err(e) => {
                    return Err(ContentServiceError::InternalError(
                        e.context("Failed to create content"),
                    ))
                }
            }
        }

        Err(no_free_slug(&base))
    }

    /// Update an item as its author or an administrator.
    ///
    /// A changed title regenerates the slug.
    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateContentInput,
    ) -> Result<Content, ContentServiceError> {
        let mut content = self.get_owned(actor, id).await?;

        let mut retitled = false;
        if let Some(title) = input.title {
            let title = validate_title(&title)?;
            if title != content.title {
                content.title = title;
                retitled = true;
            }
        }
        if let Some(description) = input.description {
            content.description = validate_description(&description)?;
        }
        if let Some(body) = input.body {
            content.body = validate_body(&body)?;
        }
        if let Some(content_type) = input.content_type {
            content.content_type = content_type;
        }
        if let Some(tags) = input.tags {
            content.tags = clean_tags(tags);
        }
        if let Some(status) = input.status {
            content.status = status;
        }
        if let Some(thumbnail) = input.thumbnail {
            let thumbnail = thumbnail.trim();
            content.thumbnail = if thumbnail.is_empty() {
                DEFAULT_THUMBNAIL.to_string()
            } else {
                thumbnail.to_string()
            };
        }
        if input.url.is_some() {
            content.url = clean_url(input.url);
        }

        if !retitled {
            let updated = self
                .repo
                .update(&content)
                .await
                .context("Failed to update content")?;
            tracing::info!(content_id = id, actor_id = actor.id, "content updated");
            return Ok(updated);
        }

        let base = slug_base(&content.title);
        for attempt in 0..=MAX_SLUG_ATTEMPTS {
            let slug = slug_candidate(&base, attempt);
            if self.slug_taken(&slug, Some(id)).await? {
                continue;
            }
            content.slug = slug;
            match self.repo.update(&content).await {
                Ok(updated) => {
                    tracing::info!(content_id = id, actor_id = actor.id, slug = %updated.slug, "content updated");
                    return Ok(updated);
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!(slug = %content.slug, "slug claimed concurrently, retrying");
                }
                Err(e) => {
                    return Err(ContentServiceError::InternalError(
                        e.context("Failed to update content"),
                    ))
                }
            }
        }

        Err(no_free_slug(&base))
    }

    /// Delete an item and its comments as its author or an administrator.
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ContentServiceError> {
        self.get_owned(actor, id).await?;

        let deleted = self
            .repo
            .delete_with_comments(id)
            .await
            .context("Failed to delete content")?;
        if !deleted {
            return Err(content_not_found(id));
        }

        tracing::info!(content_id = id, actor_id = actor.id, "content deleted");
        Ok(())
    }

    pub async fn like(&self, viewer: &User, id: i64) -> Result<Content, ContentServiceError> {
        self.find_visible(Some(viewer), id).await?;

        self.repo
            .increment_likes(id)
            .await
            .context("Failed to record like")?;

        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get content")?
            .ok_or_else(|| content_not_found(id))
    }

    async fn find_visible(
        &self,
        viewer: Option<&User>,
        id: i64,
    ) -> Result<Content, ContentServiceError> {
        let content = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get content")?
            .ok_or_else(|| content_not_found(id))?;

        let visible = content.is_published() || viewer.is_some_and(|v| v.can_modify(content.author_id));
        if !visible {
            return Err(content_not_found(id));
        }
        Ok(content)
    }

    async fn get_owned(&self, actor: &User, id: i64) -> Result<Content, ContentServiceError> {
        let content = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get content")?
            .ok_or_else(|| content_not_found(id))?;

        if !actor.can_modify(content.author_id) {
            tracing::warn!(content_id = id, actor_id = actor.id, "content modification refused");
            return Err(ContentServiceError::Forbidden(format!(
                "User {} is not authorized to modify this content",
                actor.id
            )));
        }
        Ok(content)
    }

    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool, ContentServiceError> {
        Ok(self
            .repo
            .slug_exists(slug, exclude_id)
            .await
            .context("Failed to check slug")?)
    }
}

/// Slug of `title`, falling back to "content" for titles without slug characters
fn slug_base(title: &str) -> String {
    let base = generate_slug(title);
    if base.is_empty() {
        "content".to_string()
    } else {
        base
    }
}

/// `attempt` 0 is the bare base, later attempts get a numeric suffix
fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

fn no_free_slug(base: &str) -> ContentServiceError {
    ContentServiceError::InternalError(anyhow::anyhow!("No free slug for '{}'", base))
}

/// Apply the visibility rules of `viewer` to a listing filter.
pub fn visible_filter(viewer: Option<&User>, mut filter: ContentFilter) -> ContentFilter {
    let own_listing = match viewer {
        Some(user) if user.is_admin() => return filter,
        Some(user) => filter.author_id == Some(user.id),
        None => false,
    };
    if !own_listing {
        filter.status = Some(ContentStatus::Published);
    }
    filter
}

/// Generate a URL slug from a title.
///
/// Lower-cases, drops punctuation, and joins words with single hyphens.
/// Non-ASCII letters and digits are kept.
pub fn generate_slug(title: &str) -> String {
    let mut result = String::new();
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !result.is_empty() {
                result.push('-');
            }
            pending_hyphen = false;
            result.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_hyphen = true;
        }
    }

    result
}

fn validate_title(title: &str) -> Result<String, ContentServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ContentServiceError::ValidationError(
            "Please add a title".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ContentServiceError::ValidationError(format!(
            "Title can not be more than {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<String, ContentServiceError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ContentServiceError::ValidationError(
            "Please add a description".to_string(),
        ));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ContentServiceError::ValidationError(format!(
            "Description can not be more than {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(description.to_string())
}

fn validate_body(body: &str) -> Result<String, ContentServiceError> {
    if body.trim().is_empty() {
        return Err(ContentServiceError::ValidationError(
            "Please add some content".to_string(),
        ));
    }
    Ok(body.to_string())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn clean_url(url: Option<String>) -> Option<String> {
    url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
}

fn content_not_found(id: i64) -> ContentServiceError {
    ContentServiceError::NotFound(format!("Content not found with id of {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CommentRepository, SqlxCommentRepository, SqlxContentRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ContentType, UserRole};
    use proptest::prelude::*;

    struct Fixture {
        service: ContentService,
        comments: Arc<dyn CommentRepository>,
        admin: User,
        alice: User,
        bob: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let admin = users
            .create(&User::new("Admin".into(), "admin@example.com".into(), "h".into(), UserRole::Admin))
            .await
            .unwrap();
        let alice = users
            .create(&User::new("Alice".into(), "alice@example.com".into(), "h".into(), UserRole::User))
            .await
            .unwrap();
        let bob = users
            .create(&User::new("Bob".into(), "bob@example.com".into(), "h".into(), UserRole::User))
            .await
            .unwrap();

        Fixture {
            service: ContentService::new(SqlxContentRepository::boxed(pool.clone())),
            comments: SqlxCommentRepository::boxed(pool),
            admin,
            alice,
            bob,
        }
    }

    fn input(title: &str, status: ContentStatus) -> CreateContentInput {
        CreateContentInput {
            title: title.to_string(),
            description: "A description".to_string(),
            body: "Body text".to_string(),
            content_type: ContentType::Article,
            tags: vec!["rust".to_string(), " web ".to_string(), "rust".to_string(), "".to_string()],
            status,
            thumbnail: None,
            url: None,
        }
    }

    /// Repository whose slug check never sees competing writers
    struct BlindSlugCheck(Arc<dyn ContentRepository>);

    #[async_trait::async_trait]
    impl ContentRepository for BlindSlugCheck {
        async fn create(&self, content: &Content) -> anyhow::Result<Content> {
            self.0.create(content).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Content>> {
            self.0.get_by_id(id).await
        }

        async fn slug_exists(&self, _slug: &str, _exclude_id: Option<i64>) -> anyhow::Result<bool> {
            Ok(false)
        }

        async fn list(
            &self,
            filter: &ContentFilter,
            params: &ListParams,
        ) -> anyhow::Result<(Vec<Content>, i64)> {
            self.0.list(filter, params).await
        }

        async fn update(&self, content: &Content) -> anyhow::Result<Content> {
            self.0.update(content).await
        }

        async fn delete_with_comments(&self, id: i64) -> anyhow::Result<bool> {
            self.0.delete_with_comments(id).await
        }

        async fn increment_views(&self, id: i64) -> anyhow::Result<bool> {
            self.0.increment_views(id).await
        }

        async fn increment_likes(&self, id: i64) -> anyhow::Result<bool> {
            self.0.increment_likes(id).await
        }
    }

    #[tokio::test]
    async fn test_slug_collision_at_write_moves_to_next_suffix() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let author = SqlxUserRepository::boxed(pool.clone())
            .create(&User::new("Alice".into(), "alice@example.com".into(), "h".into(), UserRole::User))
            .await
            .unwrap();
        let service = ContentService::new(Arc::new(BlindSlugCheck(SqlxContentRepository::boxed(pool))));

        let first = service
            .create(&author, input("Same Title", ContentStatus::Published))
            .await
            .unwrap();
        let second = service
            .create(&author, input("Same Title", ContentStatus::Published))
            .await
            .unwrap();
        assert_eq!(first.slug, "same-title");
        assert_eq!(second.slug, "same-title-1");

        let other = service
            .create(&author, input("Other", ContentStatus::Published))
            .await
            .unwrap();
        let renamed = service
            .update(
                &author,
                other.id,
                UpdateContentInput {
                    title: Some("Same Title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.title, "Same Title");
        assert_eq!(renamed.slug, "same-title-2");
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Rust:  The Book!  "), "rust-the-book");
        assert_eq!(generate_slug("a - b"), "a-b");
        assert_eq!(generate_slug("snake_case title"), "snake-case-title");
        assert_eq!(generate_slug("C++ & Go"), "c-go");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[tokio::test]
    async fn test_create_defaults_and_cleanup() {
        let f = setup().await;
        let content = f
            .service
            .create(&f.alice, input("  Hello World ", ContentStatus::Published))
            .await
            .unwrap();

        assert_eq!(content.title, "Hello World");
        assert_eq!(content.slug, "hello-world");
        assert_eq!(content.author_id, f.alice.id);
        assert_eq!(content.thumbnail, DEFAULT_THUMBNAIL);
        assert_eq!(content.tags, vec!["rust".to_string(), "web".to_string()]);
        assert_eq!(content.views, 0);
    }

    #[tokio::test]
    async fn test_duplicate_titles_get_suffixed_slugs() {
        let f = setup().await;
        let a = f.service.create(&f.alice, input("Same", ContentStatus::Draft)).await.unwrap();
        let b = f.service.create(&f.bob, input("Same", ContentStatus::Draft)).await.unwrap();
        let c = f.service.create(&f.bob, input("same!", ContentStatus::Draft)).await.unwrap();

        assert_eq!(a.slug, "same");
        assert_eq!(b.slug, "same-1");
        assert_eq!(c.slug, "same-2");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = setup().await;

        let result = f.service.create(&f.alice, input("   ", ContentStatus::Draft)).await;
        assert!(matches!(result, Err(ContentServiceError::ValidationError(_))));

        let long = "t".repeat(MAX_TITLE_LEN + 1);
        let result = f.service.create(&f.alice, input(&long, ContentStatus::Draft)).await;
        assert!(matches!(result, Err(ContentServiceError::ValidationError(_))));

        let mut no_desc = input("Title", ContentStatus::Draft);
        no_desc.description = String::new();
        assert!(matches!(
            f.service.create(&f.alice, no_desc).await,
            Err(ContentServiceError::ValidationError(_))
        ));

        let mut long_desc = input("Title", ContentStatus::Draft);
        long_desc.description = "d".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(matches!(
            f.service.create(&f.alice, long_desc).await,
            Err(ContentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_title_change_regenerates_slug() {
        let f = setup().await;
        let content = f.service.create(&f.alice, input("First Title", ContentStatus::Draft)).await.unwrap();

        let updated = f
            .service
            .update(
                &f.alice,
                content.id,
                UpdateContentInput {
                    title: Some("Second Title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "second-title");

        // unchanged title keeps the slug
        let updated = f
            .service
            .update(
                &f.alice,
                content.id,
                UpdateContentInput {
                    title: Some("Second Title".to_string()),
                    body: Some("new body".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "second-title");
        assert_eq!(updated.body, "new body");
    }

    #[tokio::test]
    async fn test_ownership_rules() {
        let f = setup().await;
        let content = f.service.create(&f.alice, input("Mine", ContentStatus::Published)).await.unwrap();
        let change = || UpdateContentInput {
            description: Some("changed".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            f.service.update(&f.bob, content.id, change()).await,
            Err(ContentServiceError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.delete(&f.bob, content.id).await,
            Err(ContentServiceError::Forbidden(_))
        ));

        f.service.update(&f.alice, content.id, change()).await.unwrap();
        f.service.update(&f.admin, content.id, change()).await.unwrap();
        f.service.delete(&f.admin, content.id).await.unwrap();

        assert!(matches!(
            f.service.delete(&f.alice, content.id).await,
            Err(ContentServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_comments() {
        let f = setup().await;
        let content = f.service.create(&f.alice, input("Discussed", ContentStatus::Published)).await.unwrap();
        f.comments.create(content.id, f.bob.id, "first").await.unwrap();
        f.comments.create(content.id, f.alice.id, "second").await.unwrap();
        assert_eq!(f.comments.count_for_content(content.id).await.unwrap(), 2);

        f.service.delete(&f.alice, content.id).await.unwrap();

        assert_eq!(f.comments.count_for_content(content.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_drafts_hidden_from_others() {
        let f = setup().await;
        let draft = f.service.create(&f.alice, input("Draft", ContentStatus::Draft)).await.unwrap();

        assert!(matches!(
            f.service.get(None, draft.id).await,
            Err(ContentServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.service.get(Some(&f.bob), draft.id).await,
            Err(ContentServiceError::NotFound(_))
        ));
        f.service.get(Some(&f.alice), draft.id).await.unwrap();
        f.service.get(Some(&f.admin), draft.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_counts_views() {
        let f = setup().await;
        let content = f.service.create(&f.alice, input("Viewed", ContentStatus::Published)).await.unwrap();

        assert_eq!(f.service.get(None, content.id).await.unwrap().views, 1);
        assert_eq!(f.service.get(None, content.id).await.unwrap().views, 2);
    }

    #[tokio::test]
    async fn test_listing_visibility() {
        let f = setup().await;
        f.service.create(&f.alice, input("Public", ContentStatus::Published)).await.unwrap();
        f.service.create(&f.alice, input("Private", ContentStatus::Draft)).await.unwrap();
        f.service.create(&f.bob, input("Bob Draft", ContentStatus::Draft)).await.unwrap();
        let params = ListParams::default();

        let anon = f.service.list(None, ContentFilter::default(), &params).await.unwrap();
        assert_eq!(anon.total, 1);

        // asking for drafts does not reveal them
        let sneaky = ContentFilter {
            status: Some(ContentStatus::Draft),
            ..Default::default()
        };
        let page = f.service.list(Some(&f.bob), sneaky, &params).await.unwrap();
        assert_eq!(page.total, 0);

        let own = ContentFilter {
            author_id: Some(f.alice.id),
            ..Default::default()
        };
        let page = f.service.list(Some(&f.alice), own, &params).await.unwrap();
        assert_eq!(page.total, 2);

        let page = f.service.list(Some(&f.admin), ContentFilter::default(), &params).await.unwrap();
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_like() {
        let f = setup().await;
        let content = f.service.create(&f.alice, input("Liked", ContentStatus::Published)).await.unwrap();

        f.service.like(&f.bob, content.id).await.unwrap();
        let liked = f.service.like(&f.admin, content.id).await.unwrap();
        assert_eq!(liked.likes, 2);

        assert!(matches!(
            f.service.like(&f.bob, 9999).await,
            Err(ContentServiceError::NotFound(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// slugs never contain separators at the ends or doubled up
        #[test]
        fn slug_is_well_formed(title in "\\PC{0,60}") {
            let slug = generate_slug(&title);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(!slug.chars().any(char::is_whitespace));
            prop_assert!(slug.chars().all(|c| c == '-' || c.is_alphanumeric()));
        }

        #[test]
        fn ascii_slug_is_stable(title in "[A-Za-z0-9 _!?.-]{0,60}") {
            let slug = generate_slug(&title);
            prop_assert_eq!(generate_slug(&slug), slug.clone());
        }
    }
}
