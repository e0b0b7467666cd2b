use ::anyhow::Result;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::ops::Deref;
use std::time::Duration;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// The store handle: a single connection pool shared by every repository.
pub struct DB {
    pub pool: PgPool,
}

impl DB {
    // One pool for the whole application, so an API call borrows a connection
    // instead of opening a new one.
    pub async fn new(url: &str, pool_size: u32, acquire_timeout_secs: u64) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .connect(url)
            .await?;
        Ok(DB { pool })
    }

    /// Builds the pool without connecting; the first query opens the first connection.
    pub fn new_lazy(url: &str, pool_size: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect_lazy(url)?;
        Ok(DB { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }
}

impl Deref for DB {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}
