//! Listing of schemas, tables and views

use crate::db::{DatabaseObject, IntrospectionProvider, ObjectType};
use crate::error::SchemaError;

/// What `inspect database` lists
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum DatabaseObjectKind {
    Schemas,
    Tables,
    Views,
}

/// Engine-owned schemas hidden from listings
pub fn is_system_schema(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.starts_with("db_") || matches!(lower.as_str(), "sys" | "information_schema" | "guest")
}

/// User schemas of the database, system schemas removed
pub async fn list_user_schemas(
    provider: &dyn IntrospectionProvider,
) -> Result<Vec<String>, SchemaError> {
    Ok(provider
        .list_schemas()
        .await?
        .into_iter()
        .filter(|s| !is_system_schema(s))
        .collect())
}

/// Tables or views of one schema, or of every user schema when `schema` is `None`
pub async fn list_objects(
    provider: &dyn IntrospectionProvider,
    object_type: ObjectType,
    schema: Option<&str>,
) -> Result<Vec<DatabaseObject>, SchemaError> {
    let schemas = match schema {
        Some(s) => vec![s.to_string()],
        None => list_user_schemas(provider).await?,
    };

    let mut objects = Vec::new();
    for schema in &schemas {
        let found = match object_type {
            ObjectType::Table => provider.list_tables(schema).await?,
            ObjectType::View => provider.list_views(schema).await?,
        };
        objects.extend(found);
    }
    Ok(objects)
}

/// Lines printed by `inspect database <kind>`
pub async fn list_database(
    provider: &dyn IntrospectionProvider,
    kind: DatabaseObjectKind,
    schema: Option<&str>,
) -> Result<Vec<String>, SchemaError> {
    let object_type = match kind {
        DatabaseObjectKind::Schemas => return list_user_schemas(provider).await,
        DatabaseObjectKind::Tables => ObjectType::Table,
        DatabaseObjectKind::Views => ObjectType::View,
    };
    Ok(list_objects(provider, object_type, schema)
        .await?
        .iter()
        .map(DatabaseObject::qualified_name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteProvider;
    use rusqlite::Connection;

    #[test]
    fn test_system_schemas() {
        assert!(is_system_schema("sys"));
        assert!(is_system_schema("INFORMATION_SCHEMA"));
        assert!(is_system_schema("Guest"));
        assert!(is_system_schema("db_owner"));
        assert!(!is_system_schema("dbo"));
        assert!(!is_system_schema("sales"));
    }

    fn provider() -> SqliteProvider {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY);
             CREATE TABLE customers (id INTEGER PRIMARY KEY);
             CREATE VIEW recent_orders AS SELECT * FROM orders;",
        )
        .unwrap();
        SqliteProvider::from_connection(conn)
    }

    #[tokio::test]
    async fn test_list_tables_across_schemas() {
        let p = provider();
        let lines = list_database(&p, DatabaseObjectKind::Tables, None).await.unwrap();
        assert_eq!(lines, vec!["main.customers", "main.orders"]);
    }

    #[tokio::test]
    async fn test_list_views_in_schema() {
        let p = provider();
        let lines = list_database(&p, DatabaseObjectKind::Views, Some("main"))
            .await
            .unwrap();
        assert_eq!(lines, vec!["main.recent_orders"]);
    }

    #[tokio::test]
    async fn test_list_unknown_schema() {
        let p = provider();
        let err = list_database(&p, DatabaseObjectKind::Tables, Some("archive"))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::NotFound(_)));
    }
}
