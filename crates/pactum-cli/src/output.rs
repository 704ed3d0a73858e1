//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use pactum_domain::LineItem;
use pactum_extractor::{Chunk, ChunkFailure, LineItemOutcome, RecordOutcome};
use serde_json::Value;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

// Longest value shown in a table cell
const MAX_CELL_CHARS: usize = 80;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the chunks a document was split into.
    pub fn format_chunks(&self, chunks: &[Chunk]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json: Vec<Value> = chunks
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        serde_json::json!({
                            "chunk_index": i + 1,
                            "size": c.size(),
                            "has_table": c.has_table,
                            "part": c.part.map(|p| serde_json::json!({"part": p.part, "of": p.of})),
                            "text": c.text,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&json)?)
            }
            OutputFormat::Quiet => Ok(chunks
                .iter()
                .map(|c| c.size().to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["#", "Size", "Table", "Part", "Starts with"]);
                for (i, chunk) in chunks.iter().enumerate() {
                    let part = chunk
                        .part
                        .map(|p| format!("{}/{}", p.part, p.of))
                        .unwrap_or_default();
                    let head: String = chunk.text.lines().next().unwrap_or_default().to_string();
                    builder.push_record([
                        (i + 1).to_string(),
                        chunk.size().to_string(),
                        if chunk.has_table { "yes" } else { "" }.to_string(),
                        part,
                        clip(&head, 48),
                    ]);
                }
                Ok(self.render(builder))
            }
        }
    }

    /// Format a record extraction outcome.
    pub fn format_record(&self, outcome: &RecordOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
            OutputFormat::Quiet => Ok(serde_json::to_string(&outcome.record)?),
            OutputFormat::Table => {
                let value = outcome.record.to_value()?;
                let mut rows = Vec::new();
                flatten_fields("", &value, &mut rows);

                let mut out = String::new();
                if rows.is_empty() {
                    out.push_str(&self.warning("No fields extracted."));
                } else {
                    let mut builder = Builder::default();
                    builder.push_record(["Field", "Value"]);
                    for (field, value) in rows {
                        builder.push_record([field, clip(&value, MAX_CELL_CHARS)]);
                    }
                    out.push_str(&self.render(builder));
                }

                if !outcome.record.line_items.is_empty() {
                    out.push_str("\n\n");
                    out.push_str(&self.line_item_table(&outcome.record.line_items));
                }

                out.push_str("\n\n");
                out.push_str(&self.info(&format!(
                    "{} chunks, {} merge",
                    outcome.chunk_count, outcome.strategy
                )));
                out.push_str(&self.failure_lines(&outcome.failures));
                Ok(out)
            }
        }
    }

    /// Format a line item extraction outcome.
    pub fn format_line_items(&self, outcome: &LineItemOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
            OutputFormat::Quiet => Ok(outcome
                .items
                .iter()
                .map(|i| i.name.clone())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut out = if outcome.items.is_empty() {
                    self.warning("No line items found.")
                } else {
                    self.line_item_table(&outcome.items)
                };
                out.push_str("\n\n");
                out.push_str(&self.info(&format!(
                    "{} items from {} chunks",
                    outcome.items.len(),
                    outcome.chunk_count
                )));
                out.push_str(&self.failure_lines(&outcome.failures));
                Ok(out)
            }
        }
    }

    fn line_item_table(&self, items: &[LineItem]) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Name", "Qty", "Unit", "Unit price", "Total"]);
        for item in items {
            builder.push_record([
                clip(&item.name, 60),
                number(item.quantity),
                item.unit.clone().unwrap_or_default(),
                number(item.unit_price),
                number(item.total_price),
            ]);
        }
        self.render(builder)
    }

    fn failure_lines(&self, failures: &[ChunkFailure]) -> String {
        failures
            .iter()
            .map(|f| {
                format!(
                    "\n{}",
                    self.warning(&format!(
                        "Chunk {} failed after {} attempts: {}",
                        f.chunk_index, f.attempts, f.error
                    ))
                )
            })
            .collect()
    }

    fn render(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Collect `(dotted.path, value)` pairs for every non-empty scalar
///
/// Lists are reported by length; line items get their own table.
fn flatten_fields(prefix: &str, value: &Value, rows: &mut Vec<(String, String)>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, field) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match field {
            Value::Null => {}
            Value::Object(_) => flatten_fields(&path, field, rows),
            Value::Array(items) if items.is_empty() => {}
            Value::Array(items) => rows.push((path, format!("{} item(s)", items.len()))),
            Value::String(s) if s.trim().is_empty() => {}
            Value::String(s) => rows.push((path, s.clone())),
            other => rows.push((path, other.to_string())),
        }
    }
}

fn number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}…", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactum_domain::ContractRecord;
    use pactum_extractor::{MergeStrategy, RunMetrics};

    fn outcome() -> RecordOutcome {
        let record = ContractRecord::from_json(
            r#"{"inn": "7707083893", "customer": {"kpp": "770701001"},
                "line_items": [{"name": "Уборка", "quantity": 2}]}"#,
        )
        .unwrap();
        RecordOutcome {
            record,
            strategy: MergeStrategy::ServiceAssisted,
            chunk_count: 3,
            failures: vec![ChunkFailure {
                chunk_index: 2,
                error: "Service error: Timeout: slow".to_string(),
                attempts: 5,
            }],
            metrics: RunMetrics::default(),
        }
    }

    #[test]
    fn test_record_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_record(&outcome()).unwrap();
        assert!(output.contains("inn"));
        assert!(output.contains("7707083893"));
        assert!(output.contains("customer.kpp"));
        assert!(output.contains("Уборка"));
        assert!(output.contains("service-assisted merge"));
        assert!(output.contains("Chunk 2 failed after 5 attempts"));
    }

    #[test]
    fn test_record_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_record(&outcome()).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["record"]["inn"], "7707083893");
        assert_eq!(value["strategy"], "service_assisted");
    }

    #[test]
    fn test_record_quiet_format() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let output = formatter.format_record(&outcome()).unwrap();
        assert!(!output.contains('\n'));
        assert!(output.contains("\"inn\":\"7707083893\""));
    }

    #[test]
    fn test_empty_line_items() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let outcome = LineItemOutcome {
            items: Vec::new(),
            chunk_count: 1,
            failures: Vec::new(),
            metrics: RunMetrics::default(),
        };
        let output = formatter.format_line_items(&outcome).unwrap();
        assert!(output.contains("No line items found"));
    }

    #[test]
    fn test_chunks_quiet_lists_sizes() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let chunks = pactum_extractor::Segmenter::new(100, 100, 0)
            .segment(&[pactum_domain::DocumentElement::text("short")]);
        assert_eq!(formatter.format_chunks(&chunks).unwrap(), "5");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("abc", 5), "abc");
        assert_eq!(clip("abcdef", 3), "abc…");
    }
}
