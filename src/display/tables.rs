//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::document::Hit;
use crate::jobs::RunReport;
use crate::models::ModelMetadata;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        // Apply rounded corners
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Create a summary table for a completed run.
pub fn create_run_table(report: &RunReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        Cell::new("Metric").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    table.add_row(vec!["Mode", &report.mode.to_string()]);
    table.add_row(vec!["Candidates", &report.candidates.to_string()]);
    table.add_row(vec!["Written", &report.written.len().to_string()]);
    if report.cleared > 0 {
        table.add_row(vec!["Cleared before write", &report.cleared.to_string()]);
    }
    table.add_row(vec!["Reduction width", &report.reduction_width.to_string()]);
    table.add_row(vec!["Padding", &report.padding.to_string()]);
    table.add_row(vec!["Duration", &format!("{:?}", report.duration)]);

    // Failures highlighted so partial runs stand out
    let (failed_text, color) = if report.failed.is_empty() {
        ("0".to_string(), Color::Green)
    } else {
        (report.failed.len().to_string(), Color::Yellow)
    };
    table.add_row(vec![
        Cell::new("Failed"),
        Cell::new(failed_text).fg(color).add_attribute(Attribute::Bold),
    ]);

    table.to_string()
}

/// Create a ranked hit table for search and recommend results.
pub fn create_hits_table(hits: &[Hit]) -> String {
    let mut builder = TableBuilder::new().set_headers(vec!["#", "Id", "Title", "Score"]);
    for (rank, hit) in hits.iter().enumerate() {
        builder = builder.add_row(vec![
            (rank + 1).to_string(),
            hit.id.to_string(),
            hit.title.clone(),
            format!("{:.4}", hit.score),
        ]);
    }
    builder.build()
}

/// Create a status table from model metadata and the index entry count.
pub fn create_status_table(metadata: Option<&ModelMetadata>, entries: Option<u64>) -> String {
    let mut builder = TableBuilder::new().set_headers(vec!["Property", "Value"]);

    match metadata {
        Some(meta) => {
            builder = builder
                .add_row(vec!["Model fitted at".to_string(), meta.fitted_at.to_rfc3339()])
                .add_row(vec!["Fitted on documents".to_string(), meta.documents.to_string()])
                .add_row(vec!["Vocabulary size".to_string(), meta.vocabulary_size.to_string()])
                .add_row(vec!["Reduction width".to_string(), meta.reduction_width.to_string()])
                .add_row(vec!["Index width".to_string(), meta.target_dims.to_string()])
                .add_row(vec!["Padding".to_string(), meta.padding().to_string()]);
        }
        None => {
            builder = builder.add_row(vec!["Model".to_string(), "not fitted".to_string()]);
        }
    }

    let entries = entries.map_or_else(|| "unavailable".to_string(), |n| n.to_string());
    builder.add_row(vec!["Index entries".to_string(), entries]).build()
}
