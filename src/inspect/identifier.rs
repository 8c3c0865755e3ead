//! Fully-qualified table names

use crate::error::SchemaError;

/// A `(schema, table)` pair, resolved before any provider call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableIdentifier {
    pub schema: String,
    pub name: String,
}

impl TableIdentifier {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Resolve user input into an identifier.
    ///
    /// `table` may be `schema.table`, split on the first `.`; the schema found
    /// there wins over `default_schema`. No schema at all is a configuration
    /// error rather than a guess at the connection's search path.
    pub fn resolve(table: &str, default_schema: Option<&str>) -> Result<Self, SchemaError> {
        let (schema, name) = match table.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (default_schema, table),
        };

        if name.is_empty() {
            return Err(SchemaError::Configuration("Table name is required".to_string()));
        }

        match schema.filter(|s| !s.is_empty()) {
            Some(schema) => Ok(Self::new(schema, name)),
            None => Err(SchemaError::Configuration(format!(
                "Schema name is required for table '{}' (use schema.table or --schema)",
                name
            ))),
        }
    }
}

impl std::fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
