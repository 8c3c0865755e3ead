//! SQLite introspection provider using rusqlite
//!
//! Metadata comes from the table-valued pragma functions, which accept the
//! schema (attached database name) as their last argument.

use crate::db::driver::{DatabaseBackend, IntrospectionProvider, ProviderError, ProviderResult};
use crate::db::schema::{ColumnInfo, DatabaseObject, ForeignKeyInfo, ObjectType, PrimaryKeyInfo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// SQLite provider
pub struct SqliteProvider {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProvider {
    /// Open an existing SQLite database file
    pub async fn open(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("SQLite database {} does not exist", path.display());
        }
        let p = path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            Connection::open(&p).context("Failed to open SQLite database")
        })
        .await??;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already open connection (in-memory databases, tests)
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run rusqlite work on the blocking pool so a caller's timeout can
    /// still fire while SQLite is busy
    async fn with_conn<T, F>(&self, f: F) -> ProviderResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> ProviderResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .context("SQLite task failed")?
    }
}

/// One row of `pragma_table_info`
struct TableInfoRow {
    name: String,
    data_type: String,
    not_null: bool,
    pk_position: i32,
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn ensure_schema(conn: &Connection, schema: &str) -> ProviderResult<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM pragma_database_list WHERE name = ?1 COLLATE NOCASE",
            params![schema],
            |_| Ok(()),
        )
        .optional()
        .context("Failed to read database list")?;
    match found {
        Some(()) => Ok(()),
        None => Err(ProviderError::NotFound(format!("schema '{}' not found", schema))),
    }
}

/// Column rows of a table. A table always has at least one column, so an
/// empty answer means the table does not exist.
fn table_info(conn: &Connection, schema: &str, table: &str) -> ProviderResult<Vec<TableInfoRow>> {
    ensure_schema(conn, schema)?;
    let mut stmt = conn
        .prepare(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1, ?2) ORDER BY cid",
        )
        .context("Failed to prepare table_info")?;
    let rows = stmt
        .query_map(params![table, schema], |row| {
            Ok(TableInfoRow {
                name: row.get(0)?,
                data_type: row.get(1)?,
                not_null: row.get(2)?,
                pk_position: row.get(3)?,
            })
        })
        .context("Failed to query table_info")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read table_info")?;

    if rows.is_empty() {
        return Err(ProviderError::NotFound(format!(
            "table '{}.{}' not found",
            schema, table
        )));
    }
    Ok(rows)
}

fn primary_key_columns(rows: &[TableInfoRow]) -> Vec<String> {
    let mut pk: Vec<&TableInfoRow> = rows.iter().filter(|r| r.pk_position > 0).collect();
    pk.sort_by_key(|r| r.pk_position);
    pk.into_iter().map(|r| r.name.clone()).collect()
}

fn foreign_keys(conn: &Connection, schema: &str, table: &str) -> ProviderResult<Vec<ForeignKeyInfo>> {
    table_info(conn, schema, table)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1, ?2) \
             ORDER BY id, seq",
        )
        .context("Failed to prepare foreign_key_list")?;
    let rows = stmt
        .query_map(params![table, schema], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .context("Failed to query foreign_key_list")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read foreign_key_list")?;

    // (id, fk, any target column missing)
    let mut grouped: Vec<(i64, ForeignKeyInfo, bool)> = Vec::new();
    for (id, referred_table, from, to) in rows {
        if grouped.last().map(|(last, _, _)| *last) != Some(id) {
            grouped.push((
                id,
                ForeignKeyInfo {
                    name: None,
                    constrained_columns: Vec::new(),
                    referred_schema: Some(schema.to_string()),
                    referred_table,
                    referred_columns: Vec::new(),
                },
                false,
            ));
        }
        if let Some((_, fk, implicit)) = grouped.last_mut() {
            fk.constrained_columns.push(from);
            match to {
                Some(col) => fk.referred_columns.push(col),
                None => *implicit = true,
            }
        }
    }

    let mut fks = Vec::with_capacity(grouped.len());
    for (_, mut fk, implicit) in grouped {
        // `REFERENCES parent` without a column list targets the parent's primary key
        // A dangling reference keeps no target columns and is reported upstream
        if implicit {
            fk.referred_columns = match table_info(conn, schema, &fk.referred_table) {
                Ok(parent) => primary_key_columns(&parent),
                Err(ProviderError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };
        }
        fks.push(fk);
    }
    Ok(fks)
}

fn columns(conn: &Connection, schema: &str, table: &str) -> ProviderResult<Vec<ColumnInfo>> {
    let rows = table_info(conn, schema, table)?;
    // A lone INTEGER PRIMARY KEY is the rowid alias and can never hold NULL
    let rowid_alias = match primary_key_columns(&rows).as_slice() {
        [only] => rows
            .iter()
            .find(|r| &r.name == only)
            .filter(|r| r.data_type.eq_ignore_ascii_case("INTEGER"))
            .map(|r| r.name.clone()),
        _ => None,
    };
    Ok(rows
        .into_iter()
        .map(|r| ColumnInfo {
            nullable: !r.not_null && rowid_alias.as_deref() != Some(r.name.as_str()),
            name: r.name,
            data_type: r.data_type,
        })
        .collect())
}

fn list_objects(
    conn: &Connection,
    schema: &str,
    object_type: ObjectType,
) -> ProviderResult<Vec<DatabaseObject>> {
    ensure_schema(conn, schema)?;
    let kind = match object_type {
        ObjectType::Table => "table",
        ObjectType::View => "view",
    };
    let query = format!(
        "SELECT name FROM {}.sqlite_master WHERE type = ?1 AND name NOT LIKE 'sqlite_%' ORDER BY name",
        quote_ident(schema)
    );
    let mut stmt = conn.prepare(&query).context("Failed to prepare object listing")?;
    let names = stmt
        .query_map(params![kind], |row| row.get::<_, String>(0))
        .context("Failed to list objects")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read object listing")?;

    Ok(names
        .into_iter()
        .map(|name| DatabaseObject {
            name,
            schema: schema.to_string(),
        })
        .collect())
}

#[async_trait]
impl IntrospectionProvider for SqliteProvider {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn get_primary_key(&self, schema: &str, table: &str) -> ProviderResult<PrimaryKeyInfo> {
        let (schema, table) = (schema.to_string(), table.to_string());
        self.with_conn(move |conn| {
            let rows = table_info(conn, &schema, &table)?;
            Ok(PrimaryKeyInfo {
                name: None,
                constrained_columns: primary_key_columns(&rows),
            })
        })
        .await
    }

    async fn get_foreign_keys(
        &self,
        schema: &str,
        table: &str,
    ) -> ProviderResult<Vec<ForeignKeyInfo>> {
        let (schema, table) = (schema.to_string(), table.to_string());
        self.with_conn(move |conn| foreign_keys(conn, &schema, &table)).await
    }

    async fn get_columns(&self, schema: &str, table: &str) -> ProviderResult<Vec<ColumnInfo>> {
        let (schema, table) = (schema.to_string(), table.to_string());
        self.with_conn(move |conn| columns(conn, &schema, &table)).await
    }

    async fn list_schemas(&self) -> ProviderResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT name FROM pragma_database_list ORDER BY seq")
                .context("Failed to prepare database list")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .context("Failed to query database list")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read database list")?;
            Ok(names)
        })
        .await
    }

    async fn list_tables(&self, schema: &str) -> ProviderResult<Vec<DatabaseObject>> {
        let schema = schema.to_string();
        self.with_conn(move |conn| list_objects(conn, &schema, ObjectType::Table))
            .await
    }

    async fn list_views(&self, schema: &str) -> ProviderResult<Vec<DatabaseObject>> {
        let schema = schema.to_string();
        self.with_conn(move |conn| list_objects(conn, &schema, ObjectType::View))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TimeLimited;
    use std::time::Duration;

    fn provider() -> SqliteProvider {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE orders (
                 id INT NOT NULL PRIMARY KEY,
                 customer_id INT NOT NULL REFERENCES customers(id),
                 total NUMERIC
             );
             CREATE TABLE order_lines (
                 order_id INT NOT NULL,
                 line_no INT NOT NULL,
                 sku TEXT REFERENCES products,
                 PRIMARY KEY (order_id, line_no),
                 FOREIGN KEY (order_id) REFERENCES orders(id)
             );
             CREATE TABLE products (sku TEXT PRIMARY KEY);
             CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100;",
        )
        .unwrap();
        SqliteProvider::from_connection(conn)
    }

    #[tokio::test]
    async fn test_columns_in_declaration_order() {
        let p = provider();
        let cols = p.get_columns("main", "orders").await.unwrap();
        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "customer_id", "total"]);
        assert_eq!(cols[0].data_type, "INT");
        assert!(!cols[1].nullable);
        assert!(cols[2].nullable);
    }

    #[tokio::test]
    async fn test_composite_primary_key_order() {
        let p = provider();
        let pk = p.get_primary_key("main", "order_lines").await.unwrap();
        assert_eq!(pk.name, None);
        assert_eq!(pk.constrained_columns, vec!["order_id", "line_no"]);
    }

    #[tokio::test]
    async fn test_foreign_keys() {
        let p = provider();
        let fks = p.get_foreign_keys("main", "orders").await.unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].constrained_columns, vec!["customer_id"]);
        assert_eq!(fks[0].referred_table, "customers");
        assert_eq!(fks[0].referred_columns, vec!["id"]);
    }

    #[tokio::test]
    async fn test_implicit_reference_resolves_parent_pk() {
        let p = provider();
        let fks = p.get_foreign_keys("main", "order_lines").await.unwrap();
        assert_eq!(fks.len(), 2);
        let sku = fks.iter().find(|fk| fk.referred_table == "products").unwrap();
        assert_eq!(sku.constrained_columns, vec!["sku"]);
        assert_eq!(sku.referred_columns, vec!["sku"]);
    }

    #[tokio::test]
    async fn test_missing_table_and_schema() {
        let p = provider();
        let err = p.get_columns("main", "nope").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        let err = p.get_primary_key("other", "orders").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        let err = p.get_foreign_keys("main", "nope").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_listing() {
        let p = provider();
        let schemas = p.list_schemas().await.unwrap();
        assert_eq!(schemas[0], "main");

        let tables = p.list_tables("main").await.unwrap();
        let names: Vec<String> = tables.iter().map(|t| t.qualified_name()).collect();
        assert_eq!(
            names,
            vec!["main.customers", "main.order_lines", "main.orders", "main.products"]
        );

        let views = p.list_views("main").await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name, "big_orders");
    }

    #[tokio::test]
    async fn test_rowid_alias_is_not_nullable() {
        let p = provider();
        let cols = p.get_columns("main", "customers").await.unwrap();
        assert!(!cols[0].nullable);
    }

    #[tokio::test]
    async fn test_schema_name_ignores_case() {
        let p = provider();
        let cols = p.get_columns("MAIN", "orders").await.unwrap();
        assert_eq!(cols.len(), 3);
        let tables = p.list_tables("Main").await.unwrap();
        assert_eq!(tables.len(), 4);
    }

    #[tokio::test]
    async fn test_timeout_fires_while_database_is_locked() {
        let dir = std::env::temp_dir().join(format!("db-utils-sqlite-lock-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("locked.db");
        let _ = std::fs::remove_file(&path);

        let blocker = Connection::open(&path).unwrap();
        blocker
            .execute_batch("CREATE TABLE orders (id INT PRIMARY KEY); BEGIN EXCLUSIVE;")
            .unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.busy_timeout(Duration::from_secs(2)).unwrap();
        let p = TimeLimited::new(SqliteProvider::from_connection(conn), Duration::from_millis(100));

        let started = std::time::Instant::now();
        let err = p.get_columns("main", "orders").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(started.elapsed() < Duration::from_secs(1));

        drop(blocker);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
