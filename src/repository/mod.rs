pub mod admin_guard;
pub mod post;
pub mod slug;
pub mod user;
