use crate::middleware::check_access::check_access;
use crate::AppState;
use axum::{middleware, Router};

pub mod post_api;
pub mod user_api;

/// Every route under `/api`. Admin routes live under `/admin` and require the admin token.
pub fn create_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .merge(post_api::admin_routes())
        .merge(user_api::admin_routes())
        .route_layer(middleware::from_fn_with_state(state, check_access));

    Router::new()
        .merge(post_api::public_routes())
        .merge(user_api::public_routes())
        .nest("/admin", admin)
}
