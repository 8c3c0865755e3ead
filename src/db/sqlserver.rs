//! SQL Server introspection provider using tiberius
//!
//! All catalog queries go through `sys.*` views with bound parameters.

use crate::db::driver::{DatabaseBackend, IntrospectionProvider, ProviderError, ProviderResult};
use crate::db::schema::{ColumnInfo, DatabaseObject, ForeignKeyInfo, PrimaryKeyInfo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tiberius::{AuthMethod, Client, Config, Row};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type SqlClient = Client<Compat<TcpStream>>;

/// Configuration specific to SQL Server connections
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlServerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub encrypt: bool,
    pub trust_cert: bool,
}

impl Default for SqlServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("DB_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(1433),
            user: std::env::var("DB_USER").unwrap_or_else(|_| "sa".to_string()),
            password: std::env::var("DB_PASSWORD").unwrap_or_else(|_| String::new()),
            database: std::env::var("DB_DATABASE").unwrap_or_else(|_| "master".to_string()),
            encrypt: false,
            trust_cert: true,
        }
    }
}

/// SQL Server provider
pub struct SqlServerProvider {
    client: Arc<Mutex<SqlClient>>,
}

impl SqlServerProvider {
    /// Create a new SQL Server connection
    pub async fn connect(config: SqlServerConfig) -> Result<Self> {
        let client = Self::connect_internal(&config).await?;
        tracing::debug!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "connected to sql server"
        );
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Internal TCP + TDS connection
    async fn connect_internal(cfg: &SqlServerConfig) -> Result<SqlClient> {
        let mut config = Config::new();
        config.host(&cfg.host);
        config.port(cfg.port);
        config.database(&cfg.database);
        config.authentication(AuthMethod::sql_server(&cfg.user, &cfg.password));

        if cfg.trust_cert {
            config.trust_cert();
        }
        if !cfg.encrypt {
            config.encryption(tiberius::EncryptionLevel::NotSupported);
        }

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .context("Failed to connect to SQL Server")?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .context("Failed to authenticate with SQL Server")?;

        Ok(client)
    }

    /// Run a parameterized catalog query and return the rows of its first result set
    async fn rows(&self, query: &str, params: &[&str]) -> Result<Vec<Row>> {
        tracing::trace!(query, ?params, "catalog query");
        let bound: Vec<&dyn tiberius::ToSql> =
            params.iter().map(|p| p as &dyn tiberius::ToSql).collect();
        let mut client = self.client.lock().await;
        let stream = client
            .query(query, &bound)
            .await
            .context("Catalog query failed")?;
        let rows = stream
            .into_first_result()
            .await
            .context("Failed to read catalog rows")?;
        Ok(rows)
    }

    async fn ensure_table(&self, schema: &str, table: &str) -> ProviderResult<()> {
        let schemas = self
            .rows("SELECT 1 FROM sys.schemas WHERE name = @P1", &[schema])
            .await?;
        if schemas.is_empty() {
            return Err(ProviderError::NotFound(format!("schema '{}' not found", schema)));
        }

        let objects = self
            .rows(
                "SELECT 1 FROM sys.objects o \
                 INNER JOIN sys.schemas s ON o.schema_id = s.schema_id \
                 WHERE s.name = @P1 AND o.name = @P2 AND o.type IN ('U', 'V')",
                &[schema, table],
            )
            .await?;
        if objects.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "table '{}.{}' not found",
                schema, table
            )));
        }
        Ok(())
    }

    async fn list_objects(
        &self,
        query: &str,
        schema: &str,
    ) -> ProviderResult<Vec<DatabaseObject>> {
        let rows = self.rows(query, &[schema]).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(DatabaseObject {
                name: text(row, 0)?,
                schema: schema.to_string(),
            });
        }
        Ok(out)
    }
}

fn text(row: &Row, index: usize) -> Result<String> {
    Ok(row
        .try_get::<&str, _>(index)
        .with_context(|| format!("Unexpected type in catalog column {}", index))?
        .unwrap_or_default()
        .to_string())
}

#[async_trait]
impl IntrospectionProvider for SqlServerProvider {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::SqlServer
    }

    async fn get_primary_key(&self, schema: &str, table: &str) -> ProviderResult<PrimaryKeyInfo> {
        self.ensure_table(schema, table).await?;
        let rows = self
            .rows(
                "SELECT kc.name, c.name \
                 FROM sys.key_constraints kc \
                 INNER JOIN sys.tables t ON kc.parent_object_id = t.object_id \
                 INNER JOIN sys.schemas s ON t.schema_id = s.schema_id \
                 INNER JOIN sys.index_columns ic \
                    ON ic.object_id = kc.parent_object_id AND ic.index_id = kc.unique_index_id \
                 INNER JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
                 WHERE kc.type = 'PK' AND s.name = @P1 AND t.name = @P2 \
                 ORDER BY ic.key_ordinal",
                &[schema, table],
            )
            .await?;

        let mut pk = PrimaryKeyInfo::default();
        for row in &rows {
            if pk.name.is_none() {
                pk.name = Some(text(row, 0)?);
            }
            pk.constrained_columns.push(text(row, 1)?);
        }
        Ok(pk)
    }

    async fn get_foreign_keys(
        &self,
        schema: &str,
        table: &str,
    ) -> ProviderResult<Vec<ForeignKeyInfo>> {
        self.ensure_table(schema, table).await?;
        let rows = self
            .rows(
                "SELECT fk.name, pc.name, rs.name, rt.name, rc.name \
                 FROM sys.foreign_keys fk \
                 INNER JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
                 INNER JOIN sys.tables pt ON pt.object_id = fk.parent_object_id \
                 INNER JOIN sys.schemas ps ON ps.schema_id = pt.schema_id \
                 INNER JOIN sys.columns pc \
                    ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
                 INNER JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id \
                 INNER JOIN sys.schemas rs ON rs.schema_id = rt.schema_id \
                 INNER JOIN sys.columns rc \
                    ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id \
                 WHERE ps.name = @P1 AND pt.name = @P2 \
                 ORDER BY fk.name, fkc.constraint_column_id",
                &[schema, table],
            )
            .await?;

        let mut fks: Vec<ForeignKeyInfo> = Vec::new();
        for row in &rows {
            let name = text(row, 0)?;
            if fks.last().and_then(|fk| fk.name.as_deref()) != Some(name.as_str()) {
                fks.push(ForeignKeyInfo {
                    name: Some(name),
                    constrained_columns: Vec::new(),
                    referred_schema: Some(text(row, 2)?),
                    referred_table: text(row, 3)?,
                    referred_columns: Vec::new(),
                });
            }
            if let Some(fk) = fks.last_mut() {
                fk.constrained_columns.push(text(row, 1)?);
                fk.referred_columns.push(text(row, 4)?);
            }
        }
        Ok(fks)
    }

    async fn get_columns(&self, schema: &str, table: &str) -> ProviderResult<Vec<ColumnInfo>> {
        self.ensure_table(schema, table).await?;
        let rows = self
            .rows(
                "SELECT c.name, t.name, c.is_nullable, c.max_length, c.precision, c.scale \
                 FROM sys.columns c \
                 INNER JOIN sys.types t ON c.user_type_id = t.user_type_id \
                 INNER JOIN sys.objects o ON c.object_id = o.object_id \
                 INNER JOIN sys.schemas s ON o.schema_id = s.schema_id \
                 WHERE s.name = @P1 AND o.name = @P2 \
                 ORDER BY c.column_id",
                &[schema, table],
            )
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let data_type = text(row, 1)?;
            columns.push(ColumnInfo {
                name: text(row, 0)?,
                data_type: format_column_type(
                    &data_type,
                    row.get::<i16, _>(3),
                    row.get::<u8, _>(4),
                    row.get::<u8, _>(5),
                ),
                nullable: row.get::<bool, _>(2).unwrap_or(true),
            });
        }
        Ok(columns)
    }

    async fn list_schemas(&self) -> ProviderResult<Vec<String>> {
        let rows = self
            .rows("SELECT name FROM sys.schemas ORDER BY name", &[])
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(text(row, 0)?);
        }
        Ok(out)
    }

    async fn list_tables(&self, schema: &str) -> ProviderResult<Vec<DatabaseObject>> {
        self.list_objects(
            "SELECT t.name FROM sys.tables t \
             INNER JOIN sys.schemas s ON t.schema_id = s.schema_id \
             WHERE s.name = @P1 ORDER BY t.name",
            schema,
        )
        .await
    }

    async fn list_views(&self, schema: &str) -> ProviderResult<Vec<DatabaseObject>> {
        self.list_objects(
            "SELECT v.name FROM sys.views v \
             INNER JOIN sys.schemas s ON v.schema_id = s.schema_id \
             WHERE s.name = @P1 ORDER BY v.name",
            schema,
        )
        .await
    }
}

/// Render a catalog type with its length or precision, e.g. `NVARCHAR(50)`.
///
/// `max_length` is in bytes as stored in `sys.columns`; `-1` means `MAX`.
fn format_column_type(
    data_type: &str,
    max_length: Option<i16>,
    precision: Option<u8>,
    scale: Option<u8>,
) -> String {
    let upper = data_type.to_uppercase();
    match data_type.to_lowercase().as_str() {
        "varchar" | "char" | "varbinary" | "binary" => match max_length {
            Some(-1) => format!("{}(MAX)", upper),
            Some(len) => format!("{}({})", upper, len),
            None => upper,
        },
        // two bytes per character
        "nvarchar" | "nchar" => match max_length {
            Some(-1) => format!("{}(MAX)", upper),
            Some(len) => format!("{}({})", upper, len / 2),
            None => upper,
        },
        "decimal" | "numeric" => format!(
            "{}({}, {})",
            upper,
            precision.unwrap_or(18),
            scale.unwrap_or(0)
        ),
        _ => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_variable_length_types() {
        assert_eq!(format_column_type("varchar", Some(50), None, None), "VARCHAR(50)");
        assert_eq!(format_column_type("varchar", Some(-1), None, None), "VARCHAR(MAX)");
        assert_eq!(format_column_type("nvarchar", Some(100), None, None), "NVARCHAR(50)");
        assert_eq!(format_column_type("nchar", Some(-1), None, None), "NCHAR(MAX)");
        assert_eq!(format_column_type("varbinary", Some(16), None, None), "VARBINARY(16)");
    }

    #[test]
    fn test_format_numeric_types() {
        assert_eq!(
            format_column_type("decimal", Some(9), Some(10), Some(2)),
            "DECIMAL(10, 2)"
        );
        assert_eq!(format_column_type("numeric", None, None, None), "NUMERIC(18, 0)");
        assert_eq!(format_column_type("int", Some(4), Some(10), Some(0)), "INT");
        assert_eq!(format_column_type("datetime2", Some(8), Some(27), Some(7)), "DATETIME2");
    }
}
