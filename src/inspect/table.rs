//! Normalized table schema and its extraction from an introspection provider

use crate::db::IntrospectionProvider;
use crate::error::SchemaError;
use crate::inspect::TableIdentifier;
use serde::Serialize;

/// One column of a table
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    /// `None` unless derived flags were requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pk: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fk: Option<bool>,
}

/// Primary key of a table; `columns` is empty when there is none
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TablePrimaryKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Target side of a foreign key
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ForeignKeyReference {
    #[serde(rename = "name")]
    pub referred_table_name: String,
    #[serde(rename = "columns")]
    pub referred_columns: Vec<String>,
}

/// Foreign key; `columns[i]` refers to `references.referred_columns[i]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableForeignKey {
    pub columns: Vec<String>,
    pub references: ForeignKeyReference,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<TableColumn>,
    pub pk: TablePrimaryKey,
    pub fks: Vec<TableForeignKey>,
}

impl TableSchema {
    /// Whether `is_pk` / `is_fk` were computed for this schema
    pub fn has_derived_flags(&self) -> bool {
        self.columns.iter().any(|c| c.is_pk.is_some())
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Build the normalized schema of one table.
///
/// Issues exactly three provider calls, in order: primary key, foreign keys,
/// columns. With `include_derived_flags`, each column gets `is_pk` from primary
/// key membership and `is_fk` from membership in any foreign key.
pub async fn extract_table_schema(
    provider: &dyn IntrospectionProvider,
    table: &TableIdentifier,
    include_derived_flags: bool,
) -> Result<TableSchema, SchemaError> {
    let TableIdentifier { schema, name } = table;

    let pk_info = provider.get_primary_key(schema, name).await?;
    let pk = TablePrimaryKey {
        name: pk_info.name,
        columns: pk_info.constrained_columns,
    };

    let mut fks = Vec::new();
    for fk in provider.get_foreign_keys(schema, name).await? {
        if fk.constrained_columns.len() != fk.referred_columns.len() {
            return Err(SchemaError::Malformed {
                table: table.to_string(),
                detail: format!(
                    "foreign key to '{}' has {} local columns but {} referenced columns",
                    fk.referred_table,
                    fk.constrained_columns.len(),
                    fk.referred_columns.len()
                ),
            });
        }
        fks.push(TableForeignKey {
            columns: fk.constrained_columns,
            references: ForeignKeyReference {
                referred_table_name: fk.referred_table,
                referred_columns: fk.referred_columns,
            },
        });
    }

    let columns = provider
        .get_columns(schema, name)
        .await?
        .into_iter()
        .map(|col| {
            let (is_pk, is_fk) = if include_derived_flags {
                (
                    Some(pk.columns.contains(&col.name)),
                    Some(fks.iter().any(|fk| fk.columns.contains(&col.name))),
                )
            } else {
                (None, None)
            };
            TableColumn {
                name: col.name,
                data_type: col.data_type,
                nullable: col.nullable,
                is_pk,
                is_fk,
            }
        })
        .collect();

    let schema = TableSchema {
        name: name.clone(),
        columns,
        pk,
        fks,
    };
    check_key_columns(&schema, table)?;
    Ok(schema)
}

fn check_key_columns(schema: &TableSchema, table: &TableIdentifier) -> Result<(), SchemaError> {
    let malformed = |detail: String| SchemaError::Malformed {
        table: table.to_string(),
        detail,
    };

    if let Some(missing) = schema.pk.columns.iter().find(|c| !schema.has_column(c)) {
        return Err(malformed(format!(
            "primary key column '{}' is not in the column list",
            missing
        )));
    }
    for fk in &schema.fks {
        if let Some(missing) = fk.columns.iter().find(|c| !schema.has_column(c)) {
            return Err(malformed(format!(
                "foreign key column '{}' (to '{}') is not in the column list",
                missing, fk.references.referred_table_name
            )));
        }
    }
    Ok(())
}
