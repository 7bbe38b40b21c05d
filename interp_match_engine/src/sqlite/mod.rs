//! SQLite backend for the Interpreter Match Engine.

mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
