//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL. The backend
//! is chosen by configuration and hidden behind the `DatabasePool` trait.
//!
//! # Usage
//!
//! ```ignore
//! use contentkosh::config::DatabaseConfig;
//! use contentkosh::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};

/// True when a store error was caused by a UNIQUE constraint.
///
/// Works through `anyhow` context layers so repositories can keep adding context.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .is_some_and(|db| db.is_unique_violation())
    })
}
