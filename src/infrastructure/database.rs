//! Pooled SQLite connection

use crate::config;
use di::inject;
use di::injectable;
use sqlx::SqlitePool;
use sqlx::migrate::MigrateError;
use sqlx::sqlite::SqlitePoolOptions;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Pool handed out instead of the configured one while set.
///
/// The DI container builds `DatabaseConnection` itself, so integration tests
/// swap the pool here rather than through the provider.
static TEST_POOL: Mutex<Option<SqlitePool>> = Mutex::new(None);

pub struct DatabaseConnection {
    connection: SqlitePool,
}

#[injectable]
impl DatabaseConnection {
    #[inject]
    pub fn create() -> DatabaseConnection {
        if let Some(pool) = Self::test_pool() {
            return DatabaseConnection { connection: pool };
        }

        let connection_string = config::database_url();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy(&connection_string)
            .expect("Cannot connect to database");

        DatabaseConnection { connection: pool }
    }
}

impl DatabaseConnection {
    pub fn from_pool(pool: SqlitePool) -> DatabaseConnection {
        DatabaseConnection { connection: pool }
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!().run(&self.connection).await
    }

    pub fn set_test_pool(pool: SqlitePool) {
        *TEST_POOL.lock().unwrap_or_else(|e| e.into_inner()) = Some(pool);
    }

    pub fn clear_test_pool() {
        *TEST_POOL.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn test_pool() -> Option<SqlitePool> {
        TEST_POOL.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Deref for DatabaseConnection {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl DerefMut for DatabaseConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}
