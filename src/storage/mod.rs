use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

pub mod key_repo;
pub mod message_repo;
pub mod pubsub;
pub mod records;
pub mod relationship_repo;
pub mod user_repo;

pub type DbPool = Pool<Postgres>;

/// Initializes the database connection pool.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(20).connect(database_url).await
}

/// Applies pending migrations. Run once at startup, before any repository is
/// used; request handlers never touch the schema.
///
/// # Errors
/// Returns `sqlx::migrate::MigrateError` if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}
