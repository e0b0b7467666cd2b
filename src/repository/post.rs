use crate::errors::{not_found, ApiError, ApiResult};
use crate::model::post::{Post, PostCreate, PostPage, PostUpdate, BODY_PREVIEW_LEN};
use crate::repository::slug;
use crate::util::common::{escape_like, truncate_chars};
use chrono::Utc;
use derive_more::Display;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};

/// Rows returned by [`PostRepository::search`].
pub const SEARCH_LIMIT: i64 = 5;

/// Which posts an operation may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Scope {
    #[display("public")]
    Public,
    #[display("admin")]
    Admin,
}

/// Posts stored in the `posts` table.
///
/// Every method borrows a connection from the pool (or opens a transaction)
/// for its own statements only; nothing is cached between calls.
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, post: &PostCreate) -> ApiResult<Post> {
        let mut tx = self
            .pool
            .begin()
            .await
            .inspect_err(|e| error!("cannot begin transaction: {:?}", e))?;

        slug::lock_base(&mut tx, &post.slug).await?;
        let final_slug = slug::resolve_for_create(&mut tx, &post.slug).await?;

        let created = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (
                title, slug, body, created_at, updated_at, tags,
                hidden, author_id, feature_image_url, subtitle, views
            )
            VALUES ($1, $2, $3, $4, NULL, $5, $6, $7, $8, $9, 0)
            RETURNING *
            "#,
        )
        .bind(&post.title)
        .bind(&final_slug)
        .bind(&post.body)
        .bind(Utc::now())
        .bind(&post.tags)
        .bind(post.hidden)
        .bind(post.author_id)
        .bind(&post.feature_image_url)
        .bind(&post.subtitle)
        .fetch_one(&mut *tx)
        .await
        .inspect_err(|e| error!("cannot create post {:?}: {:?}", final_slug, e))?;

        tx.commit()
            .await
            .inspect_err(|e| error!("cannot commit transaction: {:?}", e))?;
        debug!("created post {} with slug {:?}", created.id, created.slug);
        Ok(created)
    }

    /// Fetches a public post and counts the view.
    pub async fn find_by_id(&self, id: i64) -> ApiResult<Post> {
        sqlx::query_as::<_, Post>(
            "UPDATE posts SET views = views + 1 WHERE id = $1 AND NOT hidden RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!("cannot fetch post {}: {:?}", id, e))?
        .ok_or_else(post_not_found)
    }

    pub async fn find_by_id_admin(&self, id: i64) -> ApiResult<Post> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| error!("cannot fetch post {}: {:?}", id, e))?
            .ok_or_else(post_not_found)
    }

    /// Fetches a public post by slug and counts the view.
    pub async fn find_by_slug(&self, slug: &str) -> ApiResult<Post> {
        sqlx::query_as::<_, Post>(
            "UPDATE posts SET views = views + 1 WHERE slug = $1 AND NOT hidden RETURNING *",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!("cannot fetch post {:?}: {:?}", slug, e))?
        .ok_or_else(post_not_found)
    }

    pub async fn find_by_slug_admin(&self, slug: &str) -> ApiResult<Post> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| error!("cannot fetch post {:?}: {:?}", slug, e))?
            .ok_or_else(post_not_found)
    }

    /// Whether any post, hidden or not, uses `slug`. A failed lookup reports `true`.
    pub async fn exists(&self, slug: &str) -> bool {
        match self.pool.acquire().await {
            Ok(mut conn) => slug::slug_taken(&mut conn, slug).await,
            Err(e) => {
                error!("slug existence check failed for {:?}, assuming taken: {}", slug, e);
                true
            }
        }
    }

    /// Replaces the post's fields. If `post.slug` belongs to another post a
    /// disambiguated slug is stored instead; the returned post carries it.
    pub async fn update(&self, post: &PostUpdate) -> ApiResult<Post> {
        let mut tx = self
            .pool
            .begin()
            .await
            .inspect_err(|e| error!("cannot begin transaction: {:?}", e))?;

        slug::lock_base(&mut tx, &post.slug).await?;
        let final_slug = slug::resolve_for_update(&mut tx, post.id, &post.slug).await?;

        let updated = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = $1, slug = $2, body = $3, updated_at = $4, tags = $5,
                hidden = $6, feature_image_url = $7, subtitle = $8
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(&post.title)
        .bind(&final_slug)
        .bind(&post.body)
        .bind(Utc::now())
        .bind(&post.tags)
        .bind(post.hidden)
        .bind(&post.feature_image_url)
        .bind(&post.subtitle)
        .bind(post.id)
        .fetch_optional(&mut *tx)
        .await
        .inspect_err(|e| error!("cannot update post {}: {:?}", post.id, e))?
        .ok_or_else(post_not_found)?;

        tx.commit()
            .await
            .inspect_err(|e| error!("cannot commit transaction: {:?}", e))?;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| error!("cannot delete post {}: {:?}", id, e))?;

        if result.rows_affected() == 0 {
            return Err(post_not_found());
        }
        Ok(())
    }

    /// Every post including hidden ones, newest first, with full bodies.
    pub async fn get_all(&self) -> ApiResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>("SELECT * FROM posts ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| error!("cannot list posts: {:?}", e))?;
        Ok(posts)
    }

    /// Public keyset page: non-hidden posts with `id < max_id` carrying every tag in `tags`.
    pub async fn paginate(&self, max_id: i64, per_page: i64, tags: &[String]) -> ApiResult<PostPage> {
        self.paginate_scoped(Scope::Public, max_id, per_page, tags).await
    }

    /// Same as [`paginate`](Self::paginate) but hidden posts are included.
    pub async fn paginate_admin(&self, max_id: i64, per_page: i64, tags: &[String]) -> ApiResult<PostPage> {
        self.paginate_scoped(Scope::Admin, max_id, per_page, tags).await
    }

    async fn paginate_scoped(
        &self,
        scope: Scope,
        max_id: i64,
        per_page: i64,
        tags: &[String],
    ) -> ApiResult<PostPage> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM posts WHERE id < ");
        builder.push_bind(max_id);

        if scope == Scope::Public {
            builder.push(" AND NOT hidden");
        }
        push_tag_filter(&mut builder, tags);

        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(per_page.max(0));

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| error!("cannot paginate {} posts below {}: {:?}", scope, max_id, e))?;

        Ok(into_page(posts))
    }

    /// Up to five public posts whose title contains `title` (case-insensitive)
    /// and that carry every tag in `tags`, most viewed first.
    pub async fn search(&self, title: &str, tags: &[String]) -> ApiResult<Vec<Post>> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT * FROM posts WHERE NOT hidden AND title ILIKE ");
        builder
            .push_bind(format!("%{}%", escape_like(title)))
            .push(r" ESCAPE '\'");
        push_tag_filter(&mut builder, tags);
        builder
            .push(" ORDER BY views DESC, id DESC LIMIT ")
            .push_bind(SEARCH_LIMIT);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| error!("cannot search posts for {:?}: {:?}", title, e))?;

        Ok(posts.into_iter().map(preview).collect())
    }

    pub async fn get_total_post_count(&self) -> ApiResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| error!("cannot count posts: {:?}", e))?;
        Ok(count)
    }

    pub async fn get_public_post_count(&self) -> ApiResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE NOT hidden")
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| error!("cannot count public posts: {:?}", e))?;
        Ok(count)
    }

    /// Id of the most recently created public post, `None` when there is none.
    pub async fn get_last_id(&self) -> ApiResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM posts WHERE NOT hidden ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!("cannot fetch last public post id: {:?}", e))?;
        Ok(id)
    }

    /// Id of the most recently created post including hidden ones.
    pub async fn get_last_id_admin(&self) -> ApiResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM posts ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!("cannot fetch last post id: {:?}", e))?;
        Ok(id)
    }

    /// Points the id sequence one past the current maximum id.
    pub async fn reset_seq(&self) -> ApiResult<()> {
        sqlx::query(
            "SELECT setval(pg_get_serial_sequence('posts', 'id'), COALESCE(MAX(id), 0) + 1, false) FROM posts",
        )
        .execute(&self.pool)
        .await
        .inspect_err(|e| error!("cannot reset post id sequence: {:?}", e))?;
        Ok(())
    }
}

// `tags @> $n` is true when the stored array holds every requested tag.
fn push_tag_filter(builder: &mut QueryBuilder<'_, Postgres>, tags: &[String]) {
    if !tags.is_empty() {
        builder.push(" AND tags @> ").push_bind(tags.to_vec());
    }
}

fn preview(mut post: Post) -> Post {
    let len = truncate_chars(&post.body, BODY_PREVIEW_LEN).len();
    post.body.truncate(len);
    post
}

fn into_page(posts: Vec<Post>) -> PostPage {
    let min_id = posts.iter().map(|p| p.id).min();
    PostPage {
        posts: posts.into_iter().map(preview).collect(),
        min_id,
    }
}

fn post_not_found() -> ApiError {
    not_found("post not found")
}
