//! Report Module
//! Console tables for each aggregate and the JSON run summary.

use crate::config::{Engine, YearRange};
use crate::data::CleaningReport;
use crate::stats::AnalysisResults;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Dropped-record counts for the JSON summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningSummary {
    pub dropped_records: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
}

impl From<&CleaningReport> for CleaningSummary {
    fn from(report: &CleaningReport) -> Self {
        Self {
            dropped_records: report.dropped_count(),
            by_kind: report.summary(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub generated_at: String,
    pub engine: Engine,
    pub records_analyzed: usize,
    pub cleaning: CleaningSummary,
    pub charts: Vec<PathBuf>,
    pub results: &'a AnalysisResults,
}

impl<'a> RunReport<'a> {
    pub fn new(
        engine: Engine,
        records_analyzed: usize,
        cleaning: CleaningSummary,
        results: &'a AnalysisResults,
    ) -> Self {
        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            engine,
            records_analyzed,
            cleaning,
            charts: Vec::new(),
            results,
        }
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let io_err = |source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)?;
        info!(path = %path.display(), "Report written");
        Ok(())
    }
}

pub struct ReportPrinter;

impl ReportPrinter {
    /// Print every aggregate table to stdout.
    pub fn print(results: &AnalysisResults) {
        for (title, table) in Self::tables(results) {
            println!("\n{title}");
            println!("{table}");
        }
    }

    pub fn tables(results: &AnalysisResults) -> Vec<(String, Table)> {
        let range = results.year_range;
        vec![
            ("Order line items per year".to_string(), Self::order_volume(results)),
            (
                format!("Total sales by state and year ({})", span(range)),
                Self::yearly_state_sales(results),
            ),
            (
                format!("Year-over-year sales growth ({})", span(range)),
                Self::sales_growth(results),
            ),
            (
                format!("Profit by region and sub-category ({})", span(range)),
                Self::profit_by_subcategory(results),
            ),
            (
                format!("Most profitable sub-category per region ({})", span(range)),
                Self::top_product_per_region(results),
            ),
            ("Regional profit share".to_string(), Self::regional_profit_share(results)),
        ]
    }

    fn order_volume(results: &AnalysisResults) -> Table {
        let mut table = new_table(&["Year", "Order line items"]);
        for entry in &results.yearly_order_volume {
            table.add_row(vec![
                Cell::new(entry.year),
                number_cell(entry.order_count.to_string()),
            ]);
        }
        table
    }

    fn yearly_state_sales(results: &AnalysisResults) -> Table {
        let mut table = new_table(&["State", "Year", "Total sales"]);
        for entry in &results.yearly_state_sales {
            table.add_row(vec![
                Cell::new(&entry.state),
                Cell::new(entry.year),
                number_cell(money(entry.total_sales)),
            ]);
        }
        table
    }

    fn sales_growth(results: &AnalysisResults) -> Table {
        let mut table = new_table(&["State", "Year", "Total sales", "Previous year", "Growth %"]);
        for entry in &results.sales_growth {
            table.add_row(vec![
                Cell::new(&entry.state),
                Cell::new(entry.year),
                number_cell(money(entry.total_sales)),
                number_cell(optional(entry.previous_year_sales)),
                number_cell(optional(entry.growth_rate_pct)),
            ]);
        }
        table
    }

    fn profit_by_subcategory(results: &AnalysisResults) -> Table {
        let mut table = new_table(&["Region", "Sub-category", "Total profit", "Orders"]);
        for entry in &results.profit_by_subcategory {
            table.add_row(vec![
                Cell::new(entry.region),
                Cell::new(&entry.sub_category),
                number_cell(money(entry.total_profit)),
                number_cell(entry.order_count.to_string()),
            ]);
        }
        table
    }

    fn top_product_per_region(results: &AnalysisResults) -> Table {
        let mut table = new_table(&["Region", "Sub-category", "Total profit"]);
        for entry in &results.top_product_per_region {
            table.add_row(vec![
                Cell::new(entry.region),
                Cell::new(&entry.sub_category),
                number_cell(money(entry.total_profit)),
            ]);
        }
        table
    }

    fn regional_profit_share(results: &AnalysisResults) -> Table {
        let mut table = new_table(&["Region", "Total profit", "Share %"]);
        for entry in &results.regional_profit_share {
            table.add_row(vec![
                Cell::new(entry.region),
                number_cell(money(entry.total_profit)),
                number_cell(optional(entry.share_pct)),
            ]);
        }
        table
    }
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn number_cell(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

fn optional(value: Option<f64>) -> String {
    value.map(money).unwrap_or_else(|| "-".to_string())
}

fn span(range: YearRange) -> String {
    format!("{}-{}", range.start, range.end)
}
