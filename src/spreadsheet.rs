use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::debug;

use crate::processor::ExtractError;

/// Every sheet in workbook order, rendered by [`render_sheet`] and followed
/// by a newline. Handles both `.xls` and `.xlsx`.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let mut workbook = open_workbook_auto(path)?;
    let mut text = String::new();

    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        debug!(sheet = %name, size = ?range.get_size(), "Rendering sheet");
        text.push_str(&render_sheet(&range));
        text.push('\n');
    }
    Ok(text)
}

/// Renders a sheet as a plain-text table.
///
/// The first row is the header and the remaining rows are labelled
/// `0..n`. The index column is left-aligned and every other column is
/// right-aligned, with two spaces between columns. Numbers are formatted
/// per column: a column of whole numbers prints as integers, while a
/// column with a fraction or a missing value prints every number with the
/// same count of decimals:
///
/// ```text
///     name  qty
/// 0  apple  3.0
/// 1   pear  NaN
/// ```
pub fn render_sheet(range: &Range<Data>) -> String {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return "Empty DataFrame\nColumns: []\nIndex: []".to_string();
    };

    let header: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| cell_text(cell).unwrap_or_else(|| format!("Unnamed: {i}")))
        .collect();
    let data_rows: Vec<&[Data]> = rows.collect();

    if data_rows.is_empty() {
        return format!("Empty DataFrame\nColumns: [{}]\nIndex: []", header.join(", "));
    }

    let formats: Vec<ColumnFormat> = (0..header.len())
        .map(|col| ColumnFormat::detect(data_rows.iter().map(|row| cell_at(row, col))))
        .collect();
    let body: Vec<Vec<String>> = data_rows
        .iter()
        .map(|row| {
            formats
                .iter()
                .enumerate()
                .map(|(col, format)| format.render(cell_at(row, col)))
                .collect()
        })
        .collect();

    let index: Vec<String> = (0..body.len()).map(|i| i.to_string()).collect();
    let index_width = index.iter().map(|label| label.chars().count()).max().unwrap_or(0);
    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(col, name)| {
            body.iter()
                .filter_map(|row| row.get(col))
                .map(|value| value.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(body.len() + 1);
    lines.push(table_line(&" ".repeat(index_width), &header, &widths));
    for (label, row) in index.iter().zip(&body) {
        lines.push(table_line(&format!("{label:<index_width$}"), row, &widths));
    }
    lines.join("\n")
}

static EMPTY_CELL: Data = Data::Empty;

fn cell_at(row: &[Data], col: usize) -> &Data {
    row.get(col).unwrap_or(&EMPTY_CELL)
}

/// Shared number formatting for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnFormat {
    Integer,
    Float { decimals: usize },
    /// Text, booleans, dates or a mix; each cell prints on its own.
    Mixed,
}

impl ColumnFormat {
    const MAX_DECIMALS: usize = 6;

    fn detect<'a>(cells: impl Iterator<Item = &'a Data>) -> Self {
        let mut numeric = false;
        let mut missing = false;
        let mut decimals = 0;

        for cell in cells {
            match cell {
                Data::Empty => missing = true,
                Data::String(s) if s.is_empty() => missing = true,
                Data::Int(_) => numeric = true,
                Data::Float(f) => {
                    numeric = true;
                    decimals = decimals.max(fraction_digits(*f));
                }
                _ => return ColumnFormat::Mixed,
            }
        }

        if !numeric {
            ColumnFormat::Mixed
        } else if missing || decimals > 0 {
            ColumnFormat::Float {
                decimals: decimals.clamp(1, Self::MAX_DECIMALS),
            }
        } else {
            ColumnFormat::Integer
        }
    }

    fn render(self, cell: &Data) -> String {
        match (self, cell) {
            (ColumnFormat::Integer, Data::Float(f)) => format!("{}", *f as i64),
            (ColumnFormat::Integer, Data::Int(i)) => i.to_string(),
            (ColumnFormat::Float { decimals }, Data::Float(f)) => format!("{f:.decimals$}"),
            (ColumnFormat::Float { decimals }, Data::Int(i)) => {
                format!("{:.decimals$}", *i as f64)
            }
            _ => cell_text(cell).unwrap_or_else(|| "NaN".to_string()),
        }
    }
}

/// Digits after the point in the shortest representation of `value`.
fn fraction_digits(value: f64) -> usize {
    if !value.is_finite() {
        return 0;
    }
    value
        .to_string()
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.len())
}

fn table_line(index: &str, cells: &[String], widths: &[usize]) -> String {
    let mut line = index.to_string();
    for (cell, &width) in cells.iter().zip(widths) {
        line.push_str("  ");
        line.push_str(&format!("{cell:>width$}"));
    }
    line
}

/// `None` for empty cells. Whole floats print without a fraction.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::Bool(true) => Some("True".to_string()),
        Data::Bool(false) => Some("False".to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        other => Some(other.to_string()),
    }
}
