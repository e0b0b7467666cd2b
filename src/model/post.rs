use crate::model::validator::{validate_slug, validate_tags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Characters of `body` kept in list and search results.
pub const BODY_PREVIEW_LEN: usize = 250;

// Column order matches the `posts` table so `SELECT *` maps directly.
#[derive(Debug, Serialize, FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub author_id: Uuid,
    pub feature_image_url: String,
    pub subtitle: String,
    pub views: i64,
}

/// Values for a new post. `slug` is the base slug; the repository may disambiguate it.
#[derive(Debug, Clone)]
pub struct PostCreate {
    pub title: String,
    pub slug: String,
    pub body: String,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub author_id: Uuid,
    pub feature_image_url: String,
    pub subtitle: String,
}

/// Full replacement values for an existing post. `slug` is the requested slug.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub feature_image_url: String,
    pub subtitle: String,
}

/// One keyset page, newest first.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// Smallest id on the page; pass it back as `max_id` for the next page.
    pub min_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Id {
    pub id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SlugQuery {
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PostPageQuery {
    pub max_id: Option<i64>,
    pub per_page: Option<i64>,
    /// Comma separated; every listed tag must be on the post.
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PostSearchQuery {
    #[serde(default)]
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub query: String,
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub subtitle: String,
    #[serde(default)]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
    pub author_id: Uuid,
    #[serde(default)]
    #[validate(length(max = 2048, message = "must be at most 2048 characters"))]
    pub feature_image_url: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub id: i64,
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub title: Option<String>,
    pub body: Option<String>,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub subtitle: Option<String>,
    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
    pub hidden: Option<bool>,
    #[validate(length(max = 2048, message = "must be at most 2048 characters"))]
    pub feature_image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastId {
    pub last_id: Option<i64>,
}
