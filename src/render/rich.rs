//! Bordered table rendering
//!
//! The table is drawn with ratatui into an off-screen buffer sized to fit its
//! content, then flattened to plain text lines for stdout.

use crate::inspect::TableSchema;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Row, Table, Widget};
use unicode_width::UnicodeWidthStr;

const COLUMN_SPACING: u16 = 2;
const MAX_CELL_WIDTH: usize = 512;

fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "yes".to_string(),
        Some(false) => String::new(),
        None => "-".to_string(),
    }
}

/// One row per column: name, type, nullable, plus PK/FK when derived flags
/// were computed
pub fn render_rich_table(schema: &TableSchema) -> String {
    let extra = schema.has_derived_flags();

    let mut header: Vec<String> = vec!["Name".into(), "Type".into(), "Nullable".into()];
    if extra {
        header.push("PK".into());
        header.push("FK".into());
    }

    let body: Vec<Vec<String>> = schema
        .columns
        .iter()
        .map(|c| {
            let mut cells = vec![c.name.clone(), c.data_type.clone(), c.nullable.to_string()];
            if extra {
                cells.push(flag(c.is_pk));
                cells.push(flag(c.is_fk));
            }
            cells
        })
        .collect();

    let widths: Vec<u16> = (0..header.len())
        .map(|i| {
            std::iter::once(&header[i])
                .chain(body.iter().map(|row| &row[i]))
                .map(|s| s.width())
                .max()
                .unwrap_or(0)
                .min(MAX_CELL_WIDTH) as u16
        })
        .collect();

    let inner_width: u16 = widths.iter().sum::<u16>()
        + COLUMN_SPACING * (widths.len().saturating_sub(1) as u16);
    let title = format!(" {} ", schema.name);
    let width = inner_width.max(title.width() as u16) + 2;

    // Rect::new clamps areas above u16::MAX cells, so long tables are drawn
    // in slices of rows that open and close the same box
    let rows_per_chunk = (usize::from(u16::MAX) / usize::from(width))
        .saturating_sub(3)
        .max(1);
    let chunks: Vec<&[Vec<String>]> = if body.is_empty() {
        vec![body.as_slice()]
    } else {
        body.chunks(rows_per_chunk).collect()
    };
    let last = chunks.len() - 1;
    let constraints: Vec<Constraint> = widths.iter().map(|w| Constraint::Length(*w)).collect();
    let header_row = Row::new(header).style(
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
    );

    let mut lines = Vec::with_capacity(body.len() + 3);
    for (i, rows) in chunks.into_iter().enumerate() {
        let mut borders = Borders::LEFT | Borders::RIGHT;
        let mut block = Block::default();
        let mut height = rows.len() as u16;
        if i == 0 {
            borders |= Borders::TOP;
            block = block.title(title.clone());
            height += 2;
        }
        if i == last {
            borders |= Borders::BOTTOM;
            height += 1;
        }

        let mut table = Table::new(
            rows.iter().map(|cells| Row::new(cells.clone())),
            constraints.clone(),
        )
        .column_spacing(COLUMN_SPACING)
        .block(block.borders(borders));
        if i == 0 {
            table = table.header(header_row.clone());
        }

        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        Widget::render(table, area, &mut buf);
        lines.extend(buffer_lines(&buf));
    }
    lines.join("\n")
}

/// Flatten a buffer to text lines, skipping the filler cells ratatui leaves
/// after wide glyphs
fn buffer_lines(buf: &Buffer) -> Vec<String> {
    let area = buf.area;
    let mut lines = Vec::with_capacity(area.height as usize);
    for y in area.top()..area.bottom() {
        let mut line = String::new();
        let mut skip = 0usize;
        for x in area.left()..area.right() {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            let symbol = buf.get(x, y).symbol();
            skip = symbol.width().saturating_sub(1);
            line.push_str(symbol);
        }
        lines.push(line.trim_end().to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::tests::FakeProvider;
    use crate::inspect::{extract_table_schema, TableColumn, TableIdentifier};

    async fn orders(extra: bool) -> TableSchema {
        let provider = FakeProvider::orders();
        extract_table_schema(&provider, &TableIdentifier::new("sales", "orders"), extra)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_one_row_per_column() {
        let out = render_rich_table(&orders(false).await);
        let lines: Vec<&str> = out.lines().collect();
        // top border, header, three rows, bottom border
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with('┌'));
        assert!(lines[0].contains("orders"));
        assert!(lines[1].contains("Name") && lines[1].contains("Nullable"));
        assert!(!lines[1].contains("PK"));
        assert!(lines[3].contains("customer_id") && lines[3].contains("false"));
        assert!(lines[4].contains("total") && lines[4].contains("NUMERIC") && lines[4].contains("true"));
        assert!(lines[5].starts_with('└'));
    }

    #[tokio::test]
    async fn test_flag_columns_with_extra() {
        let out = render_rich_table(&orders(true).await);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[1].contains("PK") && lines[1].contains("FK"));
        assert!(lines[2].starts_with("│id") && lines[2].contains("yes"));
    }

    #[tokio::test]
    async fn test_borders_align() {
        let out = render_rich_table(&orders(true).await);
        let widths: Vec<usize> = out.lines().map(|l| l.width()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_wide_table_keeps_every_row() {
        let schema = TableSchema {
            name: "sensor_readings".to_string(),
            columns: (0..1500)
                .map(|i| TableColumn {
                    name: format!("measurement_channel_{:04}", i),
                    data_type: "NVARCHAR(4000)".to_string(),
                    nullable: true,
                    is_pk: None,
                    is_fk: None,
                })
                .collect(),
            pk: Default::default(),
            fks: Vec::new(),
        };
        let out = render_rich_table(&schema);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1503);
        assert!(lines[0].starts_with('┌') && lines[0].contains("sensor_readings"));
        assert!(lines[1].contains("Name"));
        assert!(lines[2].starts_with("│measurement_channel_0000"));
        assert!(lines[1501].starts_with("│measurement_channel_1499"));
        assert!(lines[1502].starts_with('└'));
        assert_eq!(lines.iter().filter(|l| l.starts_with('┌')).count(), 1);
        assert_eq!(lines.iter().filter(|l| l.starts_with('└')).count(), 1);
        // Name(24) + Type(14) + Nullable(8) + spacing(4) + borders(2)
        assert!(lines.iter().all(|l| l.width() == 52));
    }
}
