//! Raw introspection records returned by every provider

/// Database object found while listing a schema
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseObject {
    pub name: String,
    pub schema: String,
}

impl DatabaseObject {
    /// `schema.name`, the form printed by the listing commands
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Kind of object a listing asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    Table,
    View,
}

/// Primary key constraint as reported by the provider
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrimaryKeyInfo {
    /// Constraint name. SQLite never names primary keys.
    pub name: Option<String>,
    /// Key columns in declaration order. Empty when the table has no primary key.
    pub constrained_columns: Vec<String>,
}

/// One foreign key constraint as reported by the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub name: Option<String>,
    pub constrained_columns: Vec<String>,
    pub referred_schema: Option<String>,
    pub referred_table: String,
    pub referred_columns: Vec<String>,
}

/// Column definition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Dialect-specific rendering of the column type, e.g. `NVARCHAR(50)`
    pub data_type: String,
    pub nullable: bool,
}
