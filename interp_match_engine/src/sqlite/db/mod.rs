//! # SQLite database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic transaction
//! as the need arises and call through to the functions without any other changes.
use std::env;

use log::info;
use sqlx::{
    migrate::{MigrateDatabase, MigrateError},
    sqlite::SqlitePoolOptions,
    Error as SqlxError,
    Sqlite,
    SqlitePool,
};

pub mod groups;
pub mod interpreters;
pub mod jobs;
pub mod orders;

const SQLITE_DB_URL: &str = "sqlite://data/ims_store.db";

pub fn db_url() -> String {
    let result = env::var("IMS_DATABASE_URL").unwrap_or_else(|_| {
        info!("IMS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!("./src/sqlite/migrations").run(pool).await
}

/// Creates the database file if it does not exist yet. A fresh deployment can then migrate and go.
pub async fn ensure_database_exists(url: &str) -> Result<(), SqlxError> {
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        info!("Database {url} does not exist yet. Creating it.");
        Sqlite::create_database(url).await?;
    }
    Ok(())
}
