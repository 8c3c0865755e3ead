//! Database module: introspection provider abstraction plus SQL Server and SQLite backends

mod driver;
mod schema;
pub mod sqlserver;
pub mod sqlite;

pub use driver::*;
pub use schema::*;
pub use sqlite::SqliteProvider;
pub use sqlserver::{SqlServerConfig, SqlServerProvider};
