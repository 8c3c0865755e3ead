//! Output renderers for a table schema

mod rich;

pub use rich::render_rich_table;

use crate::inspect::TableSchema;
use anyhow::{Context, Result};
use unicode_width::UnicodeWidthStr;

/// Output format of `inspect table schema`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Column name and type, tab separated
    #[default]
    Tsv,
    /// Bordered table with nullability
    Table,
    /// Full schema as JSON
    Json,
}

/// Render `schema` in the requested format, without a trailing newline
pub fn render(schema: &TableSchema, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Tsv => Ok(render_tsv(schema)),
        OutputFormat::Table => Ok(render_rich_table(schema)),
        OutputFormat::Json => render_json(schema),
    }
}

/// One `name<TAB>type` line per column. Names are padded to one past the
/// widest name of this table so the tab always follows a space.
pub fn render_tsv(schema: &TableSchema) -> String {
    let width = schema
        .columns
        .iter()
        .map(|c| c.name.width())
        .max()
        .unwrap_or(0)
        + 1;

    schema
        .columns
        .iter()
        .map(|c| {
            let pad = width.saturating_sub(c.name.width());
            format!("{}{}\t{}", c.name, " ".repeat(pad), c.data_type)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(schema: &TableSchema) -> Result<String> {
    serde_json::to_string(schema).context("Failed to serialize table schema")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::tests::FakeProvider;
    use crate::inspect::{extract_table_schema, TableIdentifier};

    async fn orders(extra: bool) -> TableSchema {
        let provider = FakeProvider::orders();
        extract_table_schema(&provider, &TableIdentifier::new("sales", "orders"), extra)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_tsv_pads_names() {
        let out = render_tsv(&orders(false).await);
        assert_eq!(
            out,
            "id          \tINTEGER\ncustomer_id \tINTEGER\ntotal       \tNUMERIC"
        );
        for line in out.lines() {
            assert_eq!(line.find('\t'), Some(12));
        }
    }

    #[tokio::test]
    async fn test_json_with_flags() {
        let out = render(&orders(true).await, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["name"], "orders");
        assert_eq!(value["columns"][1]["name"], "customer_id");
        assert_eq!(value["columns"][1]["type"], "INTEGER");
        assert_eq!(value["columns"][1]["is_pk"], false);
        assert_eq!(value["columns"][1]["is_fk"], true);
        assert_eq!(value["pk"]["name"], "pk_orders");
        assert_eq!(value["pk"]["columns"], serde_json::json!(["id"]));
        assert_eq!(
            value["fks"],
            serde_json::json!([
                {"columns": ["customer_id"], "references": {"name": "customers", "columns": ["id"]}}
            ])
        );
    }

    #[tokio::test]
    async fn test_json_without_flags_omits_keys() {
        let out = render_json(&orders(false).await).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let first = value["columns"][0].as_object().unwrap();
        assert!(!first.contains_key("is_pk"));
        assert!(!first.contains_key("is_fk"));
        assert_eq!(first["nullable"], false);
    }

    #[test]
    fn test_tsv_empty_table() {
        let schema = TableSchema {
            name: "empty".to_string(),
            columns: Vec::new(),
            pk: Default::default(),
            fks: Vec::new(),
        };
        assert_eq!(render_tsv(&schema), "");
    }
}
