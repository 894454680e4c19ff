use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbConn<'a> = PooledConnection<'a, AsyncPgConnection>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("failed to get connection from pool: {0}")]
    Checkout(String),
    #[error("failed to build connection pool: {0}")]
    Build(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to connect to database: {0}")]
    Connect(#[from] ConnectionError),
    #[error("failed to run migrations: {0}")]
    Migrate(String),
    #[error("database check query failed: {0}")]
    Query(#[from] diesel::result::Error),
}

/// Async Diesel connection pool shared by all handlers.
#[derive(Clone)]
pub struct DbPool {
    inner: Pool<AsyncPgConnection>,
}

impl DbPool {
    pub async fn connect(database_url: &str, max_size: u32) -> Result<Self, PoolError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let inner = Pool::builder()
            .max_size(max_size)
            .connection_timeout(Duration::from_secs(30))
            .build(manager)
            .await
            .map_err(|e| PoolError::Build(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Builds the pool without opening any connection; the first checkout
    /// connects.
    pub fn lazy(database_url: &str, max_size: u32) -> Self {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let inner = Pool::builder()
            .max_size(max_size)
            .connection_timeout(Duration::from_secs(5))
            .build_unchecked(manager);
        Self { inner }
    }

    pub async fn get(&self) -> Result<DbConn<'_>, PoolError> {
        self.inner
            .get()
            .await
            .map_err(|e| PoolError::Checkout(e.to_string()))
    }
}

/// Applies pending migrations over a blocking connection and checks that the
/// database answers a trivial query.
pub fn prepare_database(database_url: &str) -> Result<(), SetupError> {
    let mut conn = PgConnection::establish(database_url)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| SetupError::Migrate(e.to_string()))?;
    for version in &applied {
        log::info!("Applied migration {}", version);
    }

    let answer: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1"))
        .get_result(&mut conn)?;
    log::info!("Database test query result: {}", answer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_carry_their_cause() {
        assert!(PoolError::Checkout("timed out".into())
            .to_string()
            .contains("timed out"));
        assert!(PoolError::Build("bad url".into()).to_string().contains("bad url"));
    }

    #[tokio::test]
    async fn lazy_pool_does_not_connect_until_checkout() {
        let pool = DbPool::lazy("postgres://nobody@127.0.0.1:1/none", 1);
        let err = pool.get().await.err().expect("checkout should fail");
        assert!(matches!(err, PoolError::Checkout(_)));
    }
}
