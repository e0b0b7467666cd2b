use crate::model::validator::validate_password;
use crate::util::maybe::MaybeAbsent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

/// An account row. Deliberately not `Serialize`: responses go through
/// [`PublicUser`] or [`DetailedUser`] so the password hash never leaves the server.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// What anyone may see about an account.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The admin-facing view, which also exposes the role.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedUser {
    #[serde(flatten)]
    pub user: PublicUser,
    pub admin: bool,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for DetailedUser {
    fn from(user: User) -> Self {
        let admin = user.admin;
        Self {
            user: PublicUser::from(user),
            admin,
        }
    }
}

/// Values for a new account; `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub admin: bool,
}

/// Replacement values for an existing account. `password_hash: None` keeps the stored hash.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserId {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 32, message = "must be between 2 and 32 characters"))]
    pub name: String,
    #[validate(length(min = 2, max = 32, message = "must be between 2 and 32 characters"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub id: Uuid,
    pub name: Option<String>,
    /// Absent keeps the stored email, `null` clears it.
    #[serde(default)]
    pub email: MaybeAbsent<Option<String>>,
    pub password: Option<String>,
    /// When given, must match the stored password before `password` replaces it.
    pub old_password: Option<String>,
    pub admin: Option<bool>,
}

// Derive cannot see through `MaybeAbsent`, so the rules are spelled out here.
impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(name) = &self.name {
            let len = name.chars().count();
            if !(2..=32).contains(&len) {
                let mut error = ValidationError::new("length");
                error.message = Some("must be between 2 and 32 characters".into());
                errors.add("name", error);
            }
        }

        if let MaybeAbsent::Present(Some(email)) = &self.email {
            if !email.validate_email() {
                let mut error = ValidationError::new("email");
                error.message = Some("must be a valid email address".into());
                errors.add("email", error);
            }
        }

        if let Some(password) = &self.password {
            if let Err(error) = validate_password(password) {
                errors.add("password", error);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
