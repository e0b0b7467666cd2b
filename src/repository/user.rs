use crate::errors::{not_found, ApiError, ApiResult};
use crate::model::user::{NewUser, User, UserUpdate};
use crate::repository::admin_guard::{self, AdminRemoval};
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use tracing::{error, info};
use uuid::Uuid;

/// Accounts stored in the `users` table.
///
/// Updates and deletes lock every admin row, then the target row, and run the
/// last-admin check in the same transaction as the write.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &NewUser) -> ApiResult<User> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, user).await
    }

    /// Creates `user` as an admin only if no admin exists yet. Returns `None`
    /// when one already does.
    pub async fn create_first_admin(&self, user: &NewUser) -> ApiResult<Option<User>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .inspect_err(|e| error!("cannot begin transaction: {:?}", e))?;

        // Blocks concurrent writers to `users` so two first admins cannot both pass the check.
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .inspect_err(|e| error!("cannot lock users table: {:?}", e))?;

        let has_admin = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE admin)")
            .fetch_one(&mut *tx)
            .await
            .inspect_err(|e| error!("cannot check for existing admin: {:?}", e))?;

        if has_admin {
            return Ok(None);
        }

        let admin = NewUser {
            admin: true,
            ..user.clone()
        };
        let created = insert(&mut tx, &admin).await?;
        tx.commit()
            .await
            .inspect_err(|e| error!("cannot commit transaction: {:?}", e))?;

        info!("first admin {:?} created", created.username);
        Ok(Some(created))
    }

    pub async fn get_all(&self) -> ApiResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at, username")
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| error!("cannot list users: {:?}", e))?;
        Ok(users)
    }

    pub async fn find_by_id(&self, id: Uuid) -> ApiResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| error!("cannot fetch user {}: {:?}", id, e))?
            .ok_or_else(user_not_found)
    }

    pub async fn find_by_username(&self, username: &str) -> ApiResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| error!("cannot fetch user {:?}: {:?}", username, e))?
            .ok_or_else(user_not_found)
    }

    /// Whether `email` is in use. A failed lookup reports `true`.
    pub async fn exists(&self, email: &str) -> bool {
        self.exists_where("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)", email)
            .await
    }

    /// Whether `username` is in use. A failed lookup reports `true`.
    pub async fn exists_username(&self, username: &str) -> bool {
        self.exists_where("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)", username)
            .await
    }

    async fn exists_where(&self, sql: &'static str, value: &str) -> bool {
        match sqlx::query_scalar::<_, bool>(sql)
            .bind(value)
            .fetch_one(&self.pool)
            .await
        {
            Ok(exists) => exists,
            Err(e) => {
                error!("user existence check failed for {:?}, assuming taken: {}", value, e);
                true
            }
        }
    }

    /// Replaces the account's fields. Demoting the last admin fails with a conflict.
    pub async fn update(&self, update: &UserUpdate) -> ApiResult<User> {
        let mut tx = self
            .pool
            .begin()
            .await
            .inspect_err(|e| error!("cannot begin transaction: {:?}", e))?;

        let admins = admin_guard::lock_admins(&mut tx).await?;
        let current = lock_user(&mut tx, update.id).await?;
        admin_guard::check_removal(
            &admins,
            current.id,
            current.admin,
            update.admin,
            AdminRemoval::Demote,
        )?;

        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, email = $2, password = COALESCE($3, password),
                admin = $4, updated_at = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.password_hash)
        .bind(update.admin)
        .bind(Utc::now())
        .bind(update.id)
        .fetch_one(&mut *tx)
        .await
        .inspect_err(|e| error!("cannot update user {}: {:?}", update.id, e))?;

        tx.commit()
            .await
            .inspect_err(|e| error!("cannot commit transaction: {:?}", e))?;

        if update.password_hash.is_some() {
            info!("password changed for user {:?}", updated.username);
        }
        Ok(updated)
    }

    /// Deletes the account and returns it. Deleting the last admin fails with a conflict.
    pub async fn delete(&self, id: Uuid) -> ApiResult<User> {
        let mut tx = self
            .pool
            .begin()
            .await
            .inspect_err(|e| error!("cannot begin transaction: {:?}", e))?;

        let admins = admin_guard::lock_admins(&mut tx).await?;
        let current = lock_user(&mut tx, id).await?;
        admin_guard::check_removal(&admins, id, current.admin, false, AdminRemoval::Delete)?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .inspect_err(|e| error!("cannot delete user {}: {:?}", id, e))?;

        tx.commit()
            .await
            .inspect_err(|e| error!("cannot commit transaction: {:?}", e))?;

        info!("deleted user {:?}", current.username);
        Ok(current)
    }
}

async fn insert(conn: &mut PgConnection, user: &NewUser) -> ApiResult<User> {
    let created = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, name, username, email, password, admin, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NULL)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&user.name)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.admin)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .inspect_err(|e| error!("cannot create user {:?}: {:?}", user.username, e))?;
    Ok(created)
}

// The row lock makes a concurrent update or delete of the same account wait for us.
async fn lock_user(conn: &mut PgConnection, id: Uuid) -> ApiResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .inspect_err(|e| error!("cannot fetch user {}: {:?}", id, e))?
        .ok_or_else(user_not_found)
}

fn user_not_found() -> ApiError {
    not_found("user not found")
}
