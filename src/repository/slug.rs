//! Slug policy: turning titles into slugs and resolving collisions.
//!
//! A requested slug that is already owned by another post is never rejected.
//! Instead the similar slugs are counted and `-<count + 1>` is appended. The
//! create path counts slugs that *start with* the base while the update path
//! counts slugs that *contain* it, so an update can land on a higher suffix
//! than a create would for the same base.
//!
//! Resolution runs on the caller's transaction after [`lock_base`] so that two
//! writers racing for the same base are serialized. The lock is keyed on the
//! requested base only: writers with different bases whose candidates overlap
//! (`intro` counting up to `intro-2` while another post requests `intro-2`)
//! are not serialized against each other. The `UNIQUE` index on `posts.slug`
//! rejects the loser of such a race, which surfaces as a 409 Conflict.

use crate::errors::ApiResult;
use crate::util::common::escape_like;
use sqlx::PgConnection;
use tracing::{debug, error};

pub const MAX_SLUG_LEN: usize = 80;

const FALLBACK_SLUG: &str = "untitled";

/// Derives a base slug from a post title.
///
/// ASCII letters and digits are kept (lower-cased), every run of other ASCII
/// characters becomes one dash and non-ASCII characters are dropped.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_dash = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if ch.is_ascii() && !slug.is_empty() && !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// `base` followed by the next counter value.
pub fn disambiguate(base: &str, count: i64) -> String {
    format!("{}-{}", base, count + 1)
}

/// How existing slugs are counted before disambiguating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugMatch {
    /// Slugs starting with the base. Used when creating.
    Prefix,
    /// Slugs containing the base anywhere. Used when updating; can over-count.
    Contains,
}

impl SlugMatch {
    pub fn pattern(self, base: &str) -> String {
        let escaped = escape_like(base);
        match self {
            SlugMatch::Prefix => format!("{escaped}%"),
            SlugMatch::Contains => format!("%{escaped}%"),
        }
    }
}

/// Serializes slug resolution for `base` until the surrounding transaction ends.
pub async fn lock_base(conn: &mut PgConnection, base: &str) -> ApiResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(base)
        .execute(&mut *conn)
        .await
        .inspect_err(|e| error!("cannot lock slug {:?}: {:?}", base, e))?;
    Ok(())
}

pub async fn exists_strict(conn: &mut PgConnection, slug: &str) -> ApiResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE slug = $1)")
        .bind(slug)
        .fetch_one(&mut *conn)
        .await
        .inspect_err(|e| error!("cannot check slug {:?}: {:?}", slug, e))?;
    Ok(exists)
}

/// Whether `slug` is in use. A failed lookup counts as "in use" so a broken
/// connection can never lead to a duplicate.
pub async fn slug_taken(conn: &mut PgConnection, slug: &str) -> bool {
    match exists_strict(conn, slug).await {
        Ok(exists) => exists,
        Err(e) => {
            error!("slug existence check failed for {:?}, assuming taken: {}", slug, e);
            true
        }
    }
}

pub async fn count_similar(conn: &mut PgConnection, base: &str, mode: SlugMatch) -> ApiResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM posts WHERE slug LIKE $1 ESCAPE '\'"#,
    )
    .bind(mode.pattern(base))
    .fetch_one(&mut *conn)
    .await
    .inspect_err(|e| error!("cannot count slugs like {:?}: {:?}", base, e))?;
    Ok(count)
}

async fn owner_of(conn: &mut PgConnection, slug: &str) -> ApiResult<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE slug = $1")
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await
        .inspect_err(|e| error!("cannot look up owner of slug {:?}: {:?}", slug, e))?;
    Ok(id)
}

/// Counts similar slugs, then walks the counter forward past any suffix that is
/// already taken (possible after deletes).
async fn next_free(conn: &mut PgConnection, base: &str, mode: SlugMatch) -> ApiResult<String> {
    let mut count = count_similar(conn, base, mode).await?;
    let mut candidate = disambiguate(base, count);

    while exists_strict(conn, &candidate).await? {
        count += 1;
        candidate = disambiguate(base, count);
    }

    debug!("slug {:?} is taken, using {:?}", base, candidate);
    Ok(candidate)
}

/// Final slug for a new post whose requested slug is `base`.
pub async fn resolve_for_create(conn: &mut PgConnection, base: &str) -> ApiResult<String> {
    if !slug_taken(conn, base).await {
        return Ok(base.to_string());
    }
    next_free(conn, base, SlugMatch::Prefix).await
}

/// Final slug for post `id` when it asks for `slug`. A slug the post already
/// owns is kept as is.
pub async fn resolve_for_update(conn: &mut PgConnection, id: i64, slug: &str) -> ApiResult<String> {
    if !slug_taken(conn, slug).await {
        return Ok(slug.to_string());
    }
    if owner_of(conn, slug).await? == Some(id) {
        return Ok(slug.to_string());
    }
    next_free(conn, slug, SlugMatch::Contains).await
}
