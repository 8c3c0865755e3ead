//! Command-line surface and dispatch

use crate::config::{AppConfig, ConnectionTarget};
use crate::db::{IntrospectionProvider, SqlServerProvider, SqliteProvider, TimeLimited};
use crate::error::SchemaError;
use crate::inspect::{extract_table_schema, list_database, DatabaseObjectKind, TableIdentifier};
use crate::render::{render, OutputFormat};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Database utilities for the command line
#[derive(Parser, Debug)]
#[command(name = "db-utils", author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/db-utils/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Named connection from the config file
    #[arg(short, long, global = true, conflicts_with = "sqlite")]
    pub connection: Option<String>,

    /// Inspect a SQLite database file directly
    #[arg(long, global = true)]
    pub sqlite: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect database and tables
    Inspect {
        #[command(subcommand)]
        target: InspectCommand,
    },
    /// List connections defined in the config file
    Connections,
}

#[derive(Subcommand, Debug)]
pub enum InspectCommand {
    /// Inspect a table
    Table {
        #[command(subcommand)]
        command: TableCommand,
    },
    /// List schemas, tables or views
    Database {
        #[arg(value_enum)]
        kind: DatabaseObjectKind,

        /// Only list objects of this schema
        #[arg(short, long)]
        schema: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TableCommand {
    /// Inspect table schema
    Schema(SchemaArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Table name, optionally as schema.table
    pub table: String,

    /// Schema of the table, overridden by a schema.table argument
    #[arg(short, long)]
    pub schema: Option<String>,

    /// Compute primary/foreign key flags per column
    #[arg(short, long)]
    pub extra: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Tsv)]
    pub output: OutputFormat,
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Schema of one table, rendered. The identifier is resolved before the
/// provider is touched.
pub async fn inspect_table_schema(
    provider: &dyn IntrospectionProvider,
    args: &SchemaArgs,
) -> Result<String> {
    let table = TableIdentifier::resolve(&args.table, args.schema.as_deref())?;
    tracing::debug!(
        %table,
        backend = %provider.backend(),
        extra = args.extra,
        output = ?args.output,
        "inspecting table schema"
    );
    let schema = extract_table_schema(provider, &table, args.extra).await?;
    render(&schema, args.output)
}

async fn connect(cli: &Cli, config: &AppConfig) -> Result<Box<dyn IntrospectionProvider>> {
    let target = match &cli.sqlite {
        Some(path) => ConnectionTarget::Sqlite { path: path.clone() },
        None => config
            .resolve_connection(cli.connection.as_deref())
            .map_err(|e| SchemaError::Configuration(format!("{:#}", e)))?
            .target
            .clone(),
    };
    let provider = open_target(target, config.query_timeout())
        .await
        .map_err(SchemaError::ProviderUnavailable)?;
    Ok(provider)
}

async fn open_target(
    target: ConnectionTarget,
    timeout: Duration,
) -> Result<Box<dyn IntrospectionProvider>> {
    tracing::info!(backend = %target.backend(), location = %target.describe(), "connecting");
    let provider: Box<dyn IntrospectionProvider> = match target {
        ConnectionTarget::Sqlite { path } => {
            Box::new(TimeLimited::new(SqliteProvider::open(path).await?, timeout))
        }
        ConnectionTarget::SqlServer(cfg) => {
            let provider = tokio::time::timeout(timeout, SqlServerProvider::connect(cfg))
                .await
                .with_context(|| format!("Connecting to SQL Server timed out after {:?}", timeout))??;
            Box::new(TimeLimited::new(provider, timeout))
        }
    };
    Ok(provider)
}

/// `--sqlite` needs nothing from the config file, so it is not read then
fn load_config(cli: &Cli) -> Result<AppConfig> {
    if cli.sqlite.is_some() && !matches!(cli.command, Commands::Connections) {
        return Ok(AppConfig::default());
    }
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path()?,
    };
    AppConfig::load(&path)
}

/// Execute one parsed command, writing its output to `out`
pub async fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    // Fail on an unresolvable name before reading config or opening any connection
    if let Commands::Inspect {
        target: InspectCommand::Table {
            command: TableCommand::Schema(args),
        },
    } = &cli.command
    {
        TableIdentifier::resolve(&args.table, args.schema.as_deref())?;
    }
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Connections => {
            for conn in &config.connections {
                let marker = if config.default_connection.as_deref() == Some(conn.name.as_str()) {
                    "*"
                } else {
                    " "
                };
                writeln!(
                    out,
                    "{} {}\t{}\t{}",
                    marker,
                    conn.name,
                    conn.target.backend(),
                    conn.target.describe()
                )?;
            }
        }
        Commands::Inspect {
            target: InspectCommand::Table {
                command: TableCommand::Schema(args),
            },
        } => {
            let provider = connect(&cli, &config).await?;
            let rendered = inspect_table_schema(provider.as_ref(), args).await?;
            writeln!(out, "{}", rendered)?;
        }
        Commands::Inspect {
            target: InspectCommand::Database { kind, schema },
        } => {
            let provider = connect(&cli, &config).await?;
            tracing::debug!(backend = %provider.backend(), ?kind, "listing database objects");
            for line in list_database(provider.as_ref(), *kind, schema.as_deref()).await? {
                writeln!(out, "{}", line)?;
            }
        }
    }
    Ok(())
}
