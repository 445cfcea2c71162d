//! Command-line rendering of federated results.

use crate::codec;
use crate::db::FederatedResult;

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned plain-text table.
    #[default]
    Table,
    /// Indented JSON payload.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid output format: {s}. Expected: table or json"
            )),
        }
    }
}

/// Formats federated results for the terminal.
pub struct ResultOutput {
    format: OutputFormat,
}

impl ResultOutput {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result according to the configured format.
    pub fn format(&self, result: &FederatedResult) -> String {
        match self.format {
            OutputFormat::Table => format_table(result),
            OutputFormat::Json => match codec::encode_pretty(result) {
                Ok(json) => json + "\n",
                Err(e) => format!("{{\"error\": \"Failed to serialize: {}\"}}\n", e),
            },
        }
    }
}

/// Renders an aligned table with a row count footer.
///
/// Headers use friendly names. Missing keys render empty, nulls as `NULL`.
fn format_table(result: &FederatedResult) -> String {
    if result.columns.is_empty() {
        return format!("({} rows)\n", result.row_count());
    }

    let headers: Vec<&str> = result
        .columns
        .iter()
        .map(|c| c.friendly_name.as_str())
        .collect();

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|c| {
                    row.get(&c.name)
                        .map(|v| v.to_display_string().replace('\n', " "))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    out.push_str(&render_line(headers.iter().copied(), &widths));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &cells {
        out.push_str(&render_line(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }

    let noun = if cells.len() == 1 { "row" } else { "rows" };
    out.push_str(&format!("({} {})\n", cells.len(), noun));
    out
}

fn render_line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(value, width)| format!("{value:<w$}", w = *width))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}
