use super::seed_user;
use bearpost::model::post::{Post, PostCreate, PostUpdate, BODY_PREVIEW_LEN};
use bearpost::repository::post::{PostRepository, SEARCH_LIMIT};
use bearpost::repository::slug::{self, slugify};
use futures::future::join_all;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

fn draft(author_id: Uuid, title: &str) -> PostCreate {
    PostCreate {
        title: title.to_string(),
        slug: slugify(title),
        body: format!("All about {title}."),
        tags: vec![],
        hidden: false,
        author_id,
        feature_image_url: String::new(),
        subtitle: String::new(),
    }
}

fn edit(post: &Post, title: &str, slug: &str) -> PostUpdate {
    PostUpdate {
        id: post.id,
        title: title.to_string(),
        slug: slug.to_string(),
        body: post.body.clone(),
        tags: post.tags.clone(),
        hidden: post.hidden,
        feature_image_url: post.feature_image_url.clone(),
        subtitle: post.subtitle.clone(),
    }
}

async fn setup(pool: &PgPool) -> (PostRepository, Uuid) {
    let author = seed_user(pool, "author", true).await;
    (PostRepository::new(pool.clone()), author.id)
}

async fn set_views(pool: &PgPool, id: i64, views: i64) {
    sqlx::query("UPDATE posts SET views = $1 WHERE id = $2")
        .bind(views)
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_create_then_find_returns_input(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    let mut input = draft(author, "Hello, World");
    input.tags = vec!["rust".to_string(), "web".to_string()];
    input.subtitle = "first steps".to_string();
    input.feature_image_url = "https://img.example.com/hello.png".to_string();

    let created = posts.create(&input).await.unwrap();
    let found = posts.find_by_id_admin(created.id).await.unwrap();

    assert_eq!(found, created);
    assert_eq!(found.title, input.title);
    assert_eq!(found.slug, "hello-world");
    assert_eq!(found.body, input.body);
    assert_eq!(found.tags, input.tags);
    assert_eq!(found.subtitle, input.subtitle);
    assert_eq!(found.feature_image_url, input.feature_image_url);
    assert_eq!(found.author_id, author);
    assert_eq!(found.views, 0);
    assert!(found.updated_at.is_none());
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_same_title_gets_suffixed_slug_and_retitle_back(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    let first = posts.create(&draft(author, "Intro")).await.unwrap();
    let second = posts.create(&draft(author, "Intro")).await.unwrap();
    assert_eq!(first.slug, "intro");
    assert_eq!(second.slug, "intro-2");

    let renamed = posts.update(&edit(&second, "Fresh Start", "fresh-start")).await.unwrap();
    assert_eq!(renamed.slug, "fresh-start");
    assert!(renamed.updated_at.is_some());

    // "intro" still belongs to the first post, so the update is disambiguated instead of failing.
    let back = posts.update(&edit(&renamed, "Intro", "intro")).await.unwrap();
    assert_ne!(back.slug, "intro");
    assert_eq!(back.slug, "intro-2");
    assert_eq!(posts.find_by_id_admin(first.id).await.unwrap().slug, "intro");
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_update_keeps_own_slug(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    let post = posts.create(&draft(author, "Intro")).await.unwrap();
    let mut change = edit(&post, "Intro", "intro");
    change.body = "rewritten".to_string();

    let updated = posts.update(&change).await.unwrap();
    assert_eq!(updated.slug, "intro");
    assert_eq!(updated.body, "rewritten");
}

// Creates count slugs that start with the base, updates count slugs that contain
// it, so the two paths pick different suffixes for the same base.
#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_create_and_update_count_similar_slugs_differently(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    posts.create(&draft(author, "Intro")).await.unwrap();
    posts.create(&draft(author, "My Intro")).await.unwrap();
    posts.create(&draft(author, "Intro")).await.unwrap();

    // intro and intro-2 start with "intro", my-intro does not.
    let created = posts.create(&draft(author, "Intro")).await.unwrap();
    assert_eq!(created.slug, "intro-3");

    // intro, my-intro, intro-2 and intro-3 all contain "intro". A create at this
    // point would have counted three and picked intro-4.
    let other = posts.create(&draft(author, "Other")).await.unwrap();
    let moved = posts.update(&edit(&other, "Intro", "intro")).await.unwrap();
    assert_eq!(moved.slug, "intro-5");
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_suffix_skips_slugs_freed_by_deletes(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    posts.create(&draft(author, "Intro")).await.unwrap();
    let second = posts.create(&draft(author, "Intro")).await.unwrap();
    let third = posts.create(&draft(author, "Intro")).await.unwrap();
    assert_eq!(third.slug, "intro-3");

    posts.delete(second.id).await.unwrap();

    // Two slugs start with "intro" so the counter proposes intro-3, which is taken.
    let fourth = posts.create(&draft(author, "Intro")).await.unwrap();
    assert_eq!(fourth.slug, "intro-4");
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_creates_get_distinct_slugs(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    let input = draft(author, "Launch Day");
    let results = join_all((0..6).map(|_| posts.create(&input))).await;

    let slugs: HashSet<String> = results.into_iter().map(|r| r.unwrap().slug).collect();
    assert_eq!(slugs.len(), 6);
    assert!(slugs.contains("launch-day"));
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_public_reads_count_views(pool: PgPool) {
    let (posts, author) = setup(&pool).await;
    let post = posts.create(&draft(author, "Counted")).await.unwrap();

    assert_eq!(posts.find_by_id(post.id).await.unwrap().views, 1);
    assert_eq!(posts.find_by_id(post.id).await.unwrap().views, 2);
    assert_eq!(posts.find_by_slug("counted").await.unwrap().views, 3);

    // Admin reads leave the counter alone.
    assert_eq!(posts.find_by_id_admin(post.id).await.unwrap().views, 3);
    assert_eq!(posts.find_by_slug_admin("counted").await.unwrap().views, 3);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_hidden_posts_are_invisible_to_public_reads(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    let mut input = draft(author, "Secret");
    input.hidden = true;
    let hidden = posts.create(&input).await.unwrap();

    assert!(posts.find_by_id(hidden.id).await.unwrap_err().is_not_found());
    assert!(posts.find_by_slug("secret").await.unwrap_err().is_not_found());

    let found = posts.find_by_id_admin(hidden.id).await.unwrap();
    assert_eq!(found.views, 0);
    assert!(posts.find_by_slug_admin("secret").await.is_ok());
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_paginate_bounds_visibility_tags_and_order(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    let mut ids = Vec::new();
    for i in 0..8 {
        let mut input = draft(author, &format!("Post {i}"));
        input.hidden = i % 4 == 3;
        input.tags = if i % 2 == 0 {
            vec!["rust".to_string(), "async".to_string()]
        } else {
            vec!["rust".to_string()]
        };
        ids.push(posts.create(&input).await.unwrap().id);
    }

    let page = posts.paginate(i64::MAX, 3, &[]).await.unwrap();
    assert_eq!(page.posts.len(), 3);
    assert!(page.posts.iter().all(|p| !p.hidden));
    assert!(page
        .posts
        .windows(2)
        .all(|w| (w[0].created_at, w[0].id) > (w[1].created_at, w[1].id)));
    assert_eq!(page.min_id, page.posts.iter().map(|p| p.id).min());

    let next = posts.paginate(page.min_id.unwrap(), 100, &[]).await.unwrap();
    assert!(next.posts.iter().all(|p| p.id < page.min_id.unwrap()));
    assert_eq!(page.posts.len() + next.posts.len(), 6);

    let tagged = posts
        .paginate(i64::MAX, 100, &["async".to_string(), "rust".to_string()])
        .await
        .unwrap();
    assert_eq!(tagged.posts.len(), 4);
    assert!(tagged.posts.iter().all(|p| p.tags.contains(&"async".to_string())));

    let all = posts.paginate_admin(i64::MAX, 100, &[]).await.unwrap();
    assert_eq!(all.posts.len(), 8);

    let below_first = posts.paginate(ids[0], 10, &[]).await.unwrap();
    assert!(below_first.posts.is_empty());
    assert_eq!(below_first.min_id, None);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_listings_truncate_bodies(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    let mut input = draft(author, "Long Read");
    input.body = "é".repeat(BODY_PREVIEW_LEN * 2);
    let created = posts.create(&input).await.unwrap();

    let page = posts.paginate(i64::MAX, 10, &[]).await.unwrap();
    assert_eq!(page.posts[0].body.chars().count(), BODY_PREVIEW_LEN);

    let found = posts.search("long", &[]).await.unwrap();
    assert_eq!(found[0].body.chars().count(), BODY_PREVIEW_LEN);

    let full = posts.find_by_id_admin(created.id).await.unwrap();
    assert_eq!(full.body.chars().count(), BODY_PREVIEW_LEN * 2);
    assert_eq!(posts.get_all().await.unwrap()[0].body, full.body);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_search_returns_most_viewed_public_posts(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    for i in 0..3 {
        let post = posts.create(&draft(author, &format!("Note {i}"))).await.unwrap();
        set_views(&pool, post.id, i * 10).await;
    }

    let found = posts.search("", &[]).await.unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(found.iter().map(|p| p.views).collect::<Vec<_>>(), vec![20, 10, 0]);

    for i in 3..9 {
        let post = posts.create(&draft(author, &format!("Note {i}"))).await.unwrap();
        set_views(&pool, post.id, i * 10).await;
    }
    let mut input = draft(author, "Hidden Note");
    input.hidden = true;
    let hidden = posts.create(&input).await.unwrap();
    set_views(&pool, hidden.id, 1_000).await;

    let found = posts.search("", &[]).await.unwrap();
    assert_eq!(found.len() as i64, SEARCH_LIMIT);
    assert!(found.iter().all(|p| !p.hidden));
    assert_eq!(found[0].views, 80);
    assert!(found.windows(2).all(|w| w[0].views >= w[1].views));
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_search_matches_title_case_insensitively_and_literally(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    let mut tagged = draft(author, "Async Rust");
    tagged.tags = vec!["rust".to_string()];
    posts.create(&tagged).await.unwrap();
    posts.create(&draft(author, "Rusty Gates")).await.unwrap();
    posts.create(&draft(author, "100% Coverage")).await.unwrap();

    assert_eq!(posts.search("RUST", &[]).await.unwrap().len(), 2);
    assert_eq!(posts.search("rust", &["rust".to_string()]).await.unwrap().len(), 1);
    assert_eq!(posts.search("%", &[]).await.unwrap().len(), 1);
    assert!(posts.search("nothing like it", &[]).await.unwrap().is_empty());
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_counts_and_last_id(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    assert_eq!(posts.get_last_id().await.unwrap(), None);
    assert_eq!(posts.get_total_post_count().await.unwrap(), 0);

    let public = posts.create(&draft(author, "Visible")).await.unwrap();
    let mut input = draft(author, "Invisible");
    input.hidden = true;
    let hidden = posts.create(&input).await.unwrap();

    assert_eq!(posts.get_total_post_count().await.unwrap(), 2);
    assert_eq!(posts.get_public_post_count().await.unwrap(), 1);
    assert_eq!(posts.get_last_id().await.unwrap(), Some(public.id));
    assert_eq!(posts.get_last_id_admin().await.unwrap(), Some(hidden.id));
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_exists_and_missing_rows(pool: PgPool) {
    let (posts, author) = setup(&pool).await;
    let post = posts.create(&draft(author, "Present")).await.unwrap();

    assert!(posts.exists("present").await);
    assert!(!posts.exists("absent").await);

    let mut gone = edit(&post, "Gone", "gone");
    gone.id = post.id + 1_000;
    assert!(posts.update(&gone).await.unwrap_err().is_not_found());
    assert!(posts.delete(post.id + 1_000).await.unwrap_err().is_not_found());

    posts.delete(post.id).await.unwrap();
    assert!(!posts.exists("present").await);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_reset_seq_follows_max_id(pool: PgPool) {
    let (posts, author) = setup(&pool).await;

    let first = posts.create(&draft(author, "One")).await.unwrap();
    let second = posts.create(&draft(author, "Two")).await.unwrap();
    posts.delete(second.id).await.unwrap();

    posts.reset_seq().await.unwrap();
    let third = posts.create(&draft(author, "Three")).await.unwrap();
    assert_eq!(third.id, first.id + 1);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_failed_slug_lookup_reports_taken(pool: PgPool) {
    let posts = PostRepository::new(pool.clone());

    // An aborted transaction rejects every further statement.
    let mut tx = pool.begin().await.unwrap();
    assert!(sqlx::query("SELECT missing_column FROM posts").execute(&mut *tx).await.is_err());
    assert!(slug::slug_taken(&mut tx, "free-slug").await);
    tx.rollback().await.unwrap();

    assert!(!posts.exists("free-slug").await);
    pool.close().await;
    assert!(posts.exists("free-slug").await);
}
