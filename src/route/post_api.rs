use crate::errors::{bad_request, ApiResult};
use crate::model::post::{
    CreatePostRequest, Id, LastId, Post, PostCount, PostCreate, PostPage, PostUpdate, SlugQuery,
    UpdatePostRequest,
};
use crate::repository::slug::slugify;
use crate::util::extractor::{Json, Paging, Query, SearchFilter, ValidatedJson, ValidatedQuery};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

/// Read-only post routes anyone may call. Hidden posts are never returned.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/get-posts", get(get_posts))
        .route("/get-post", get(get_post))
        .route("/get-post-by-slug", get(get_post_by_slug))
        .route("/search", get(search_posts))
        .route("/get-post-count", get(get_public_post_count))
        .route("/get-last-id", get(get_last_id))
}

/// Post routes behind the admin token. These see hidden posts and never count views.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/get-posts", get(get_posts_admin))
        .route("/get-post", get(get_post_admin))
        .route("/get-post-by-slug", get(get_post_by_slug_admin))
        .route("/get-all-posts", get(get_all_posts))
        .route("/create-post", post(create_post))
        .route("/update-post", post(update_post))
        .route("/delete-post", post(delete_post))
        .route("/get-post-count", get(get_total_post_count))
        .route("/get-last-id", get(get_last_id_admin))
        .route("/reset-seq", post(reset_seq))
}

async fn get_posts(State(state): State<AppState>, paging: Paging) -> ApiResult<Json<PostPage>> {
    let page = state.posts.paginate(paging.max_id, paging.per_page, &paging.tags).await?;
    Ok(Json(page))
}

async fn get_posts_admin(State(state): State<AppState>, paging: Paging) -> ApiResult<Json<PostPage>> {
    let page = state.posts.paginate_admin(paging.max_id, paging.per_page, &paging.tags).await?;
    Ok(Json(page))
}

async fn get_post(State(state): State<AppState>, Query(query): Query<Id>) -> ApiResult<Json<Post>> {
    Ok(Json(state.posts.find_by_id(query.id).await?))
}

async fn get_post_admin(State(state): State<AppState>, Query(query): Query<Id>) -> ApiResult<Json<Post>> {
    Ok(Json(state.posts.find_by_id_admin(query.id).await?))
}

async fn get_post_by_slug(State(state): State<AppState>, ValidatedQuery(query): ValidatedQuery<SlugQuery>) -> ApiResult<Json<Post>> {
    Ok(Json(state.posts.find_by_slug(&query.slug).await?))
}

async fn get_post_by_slug_admin(State(state): State<AppState>, ValidatedQuery(query): ValidatedQuery<SlugQuery>) -> ApiResult<Json<Post>> {
    Ok(Json(state.posts.find_by_slug_admin(&query.slug).await?))
}

async fn get_all_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(state.posts.get_all().await?))
}

async fn search_posts(State(state): State<AppState>, filter: SearchFilter) -> ApiResult<Json<Vec<Post>>> {
    let posts = state.posts.search(&filter.title, &filter.tags).await?;
    Ok(Json(posts))
}

async fn get_public_post_count(State(state): State<AppState>) -> ApiResult<Json<PostCount>> {
    Ok(Json(PostCount {
        count: state.posts.get_public_post_count().await?,
    }))
}

async fn get_total_post_count(State(state): State<AppState>) -> ApiResult<Json<PostCount>> {
    Ok(Json(PostCount {
        count: state.posts.get_total_post_count().await?,
    }))
}

async fn get_last_id(State(state): State<AppState>) -> ApiResult<Json<LastId>> {
    Ok(Json(LastId {
        last_id: state.posts.get_last_id().await?,
    }))
}

async fn get_last_id_admin(State(state): State<AppState>) -> ApiResult<Json<LastId>> {
    Ok(Json(LastId {
        last_id: state.posts.get_last_id_admin().await?,
    }))
}

async fn create_post(State(state): State<AppState>, ValidatedJson(payload): ValidatedJson<CreatePostRequest>) -> ApiResult<Json<Post>> {
    let author = state
        .users
        .find_by_id(payload.author_id)
        .await
        .map_err(|e| if e.is_not_found() { bad_request("Unknown author") } else { e })?;

    let post = PostCreate {
        slug: slugify(&payload.title),
        title: payload.title,
        body: payload.body,
        tags: payload.tags,
        hidden: payload.hidden,
        author_id: author.id,
        feature_image_url: payload.feature_image_url,
        subtitle: payload.subtitle,
    };

    let created = state.posts.create(&post).await?;
    info!("post {} created by {:?}", created.id, author.username);
    Ok(Json(created))
}

// Missing fields keep their stored values. The slug is only re-derived when the
// title changes, so an edit to the body never moves a post to a new slug.
async fn update_post(State(state): State<AppState>, ValidatedJson(payload): ValidatedJson<UpdatePostRequest>) -> ApiResult<Json<Post>> {
    let current = state.posts.find_by_id_admin(payload.id).await?;

    let title = payload.title.unwrap_or_else(|| current.title.clone());
    let slug = if title == current.title {
        current.slug
    } else {
        slugify(&title)
    };

    let post = PostUpdate {
        id: current.id,
        title,
        slug,
        body: payload.body.unwrap_or(current.body),
        tags: payload.tags.unwrap_or(current.tags),
        hidden: payload.hidden.unwrap_or(current.hidden),
        feature_image_url: payload.feature_image_url.unwrap_or(current.feature_image_url),
        subtitle: payload.subtitle.unwrap_or(current.subtitle),
    };

    Ok(Json(state.posts.update(&post).await?))
}

async fn delete_post(State(state): State<AppState>, Json(payload): Json<Id>) -> ApiResult<StatusCode> {
    state.posts.delete(payload.id).await?;
    info!("post {} deleted", payload.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_seq(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.posts.reset_seq().await?;
    Ok(StatusCode::NO_CONTENT)
}
