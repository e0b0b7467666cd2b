use crate::errors::{ApiError, ApiResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::error;

/// Argon2id hashing for stored account passwords.
#[derive(Clone, Default)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the PHC string stored in `users.password`.
    pub fn hash(&self, password: &str) -> ApiResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| {
                error!("cannot hash password: {}", e);
                ApiError::ServerError("cannot hash password".to_string())
            })
    }

    /// A hash that cannot be parsed never verifies.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                error!("stored password hash is malformed: {}", e);
                false
            }
        }
    }
}
