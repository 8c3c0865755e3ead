//! Introspection provider abstraction
//!
//! Defines the read-only interface every database backend must implement.

use crate::db::{ColumnInfo, DatabaseObject, ForeignKeyInfo, PrimaryKeyInfo};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Which database backend is in use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseBackend {
    SqlServer,
    Sqlite,
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackend::SqlServer => write!(f, "SQL Server"),
            DatabaseBackend::Sqlite => write!(f, "SQLite"),
        }
    }
}

/// Failure reported by a provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The schema or table does not exist
    #[error("{0}")]
    NotFound(String),
    /// Connectivity, authentication, timeout or engine-internal failure
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Trait that all introspection providers must implement.
///
/// Methods are async because the SQL Server driver is network-bound; the caller
/// lives in a tokio runtime. Calls are independent and carry no transactional
/// guarantee between them.
#[async_trait]
pub trait IntrospectionProvider: Send + Sync {
    /// Which backend this provider talks to
    fn backend(&self) -> DatabaseBackend;

    /// Primary key of a table
    async fn get_primary_key(&self, schema: &str, table: &str) -> ProviderResult<PrimaryKeyInfo>;

    /// Foreign keys declared on a table, in provider order
    async fn get_foreign_keys(&self, schema: &str, table: &str)
        -> ProviderResult<Vec<ForeignKeyInfo>>;

    /// Columns of a table or view, in declaration order
    async fn get_columns(&self, schema: &str, table: &str) -> ProviderResult<Vec<ColumnInfo>>;

    // --- Listing ---

    /// List schemas in the current database.
    /// SQLite returns its attached databases (`main`, `temp`, ...).
    async fn list_schemas(&self) -> ProviderResult<Vec<String>>;

    /// List tables of one schema
    async fn list_tables(&self, schema: &str) -> ProviderResult<Vec<DatabaseObject>>;

    /// List views of one schema
    async fn list_views(&self, schema: &str) -> ProviderResult<Vec<DatabaseObject>>;
}

/// Provider wrapper that bounds every call with a timeout.
///
/// An elapsed timeout is reported as [`ProviderError::Unavailable`].
pub struct TimeLimited<P> {
    inner: P,
    timeout: Duration,
}

impl<P> TimeLimited<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn run<T, F>(&self, op: &str, fut: F) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout = ?self.timeout, "provider call timed out");
                Err(ProviderError::Unavailable(anyhow::anyhow!(
                    "{} timed out after {:?}",
                    op,
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl<P: IntrospectionProvider> IntrospectionProvider for TimeLimited<P> {
    fn backend(&self) -> DatabaseBackend {
        self.inner.backend()
    }

    async fn get_primary_key(&self, schema: &str, table: &str) -> ProviderResult<PrimaryKeyInfo> {
        self.run("get_primary_key", self.inner.get_primary_key(schema, table)).await
    }

    async fn get_foreign_keys(
        &self,
        schema: &str,
        table: &str,
    ) -> ProviderResult<Vec<ForeignKeyInfo>> {
        self.run("get_foreign_keys", self.inner.get_foreign_keys(schema, table)).await
    }

    async fn get_columns(&self, schema: &str, table: &str) -> ProviderResult<Vec<ColumnInfo>> {
        self.run("get_columns", self.inner.get_columns(schema, table)).await
    }

    async fn list_schemas(&self) -> ProviderResult<Vec<String>> {
        self.run("list_schemas", self.inner.list_schemas()).await
    }

    async fn list_tables(&self, schema: &str) -> ProviderResult<Vec<DatabaseObject>> {
        self.run("list_tables", self.inner.list_tables(schema)).await
    }

    async fn list_views(&self, schema: &str) -> ProviderResult<Vec<DatabaseObject>> {
        self.run("list_views", self.inner.list_views(schema)).await
    }
}
