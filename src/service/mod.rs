pub mod auth_service;
pub mod password_service;
