//! Data Cleaner Module
//! Name normalization, date canonicalization and typed record conversion.
//!
//! Cleaning is fail-soft per record: a row that cannot be cleaned is dropped
//! with a warning and recorded in the [`CleaningReport`], the rest carry on.

use crate::config::ColumnNames;
use crate::data::{Region, SalesRecord, SalesTable};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

/// Canonical output format for the order date column.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Spreadsheet serial day numbers count from this date.
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
/// Serials outside this window are not treated as dates (1900-01-01 ..= 9999-12-31).
const EXCEL_SERIAL_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2_958_465.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordCleaningError {
    #[error("malformed date {value:?}")]
    MalformedDate { value: String },
    #[error("malformed number {value:?} in column {column}")]
    MalformedNumber { column: String, value: String },
    #[error("unknown region {0:?}")]
    UnknownRegion(String),
    #[error("row has {found} cells, expected {expected}")]
    ShortRow { found: usize, expected: usize },
}

impl RecordCleaningError {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordCleaningError::MalformedDate { .. } => "malformed_date",
            RecordCleaningError::MalformedNumber { .. } => "malformed_number",
            RecordCleaningError::UnknownRegion(_) => "unknown_region",
            RecordCleaningError::ShortRow { .. } => "short_row",
        }
    }
}

/// Accumulated per-record failures. Row numbers are 1-based data rows.
#[derive(Debug, Clone, Default)]
pub struct CleaningReport {
    pub dropped: Vec<(usize, RecordCleaningError)>,
}

impl CleaningReport {
    pub fn record(&mut self, row: usize, error: RecordCleaningError) {
        warn!(row, error = %error, "Dropping record");
        self.dropped.push((row, error));
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    /// Dropped record counts keyed by error kind.
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for (_, error) in &self.dropped {
            *counts.entry(error.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn merge(&mut self, other: CleaningReport) {
        self.dropped.extend(other.dropped);
    }

    pub fn log_summary(&self) {
        if self.dropped.is_empty() {
            info!("No records dropped during cleaning");
            return;
        }
        for (kind, count) in self.summary() {
            warn!(kind, count, "Records dropped");
        }
        warn!(total = self.dropped_count(), "Cleaning dropped records");
    }
}

/// Cleans raw sales tables.
pub struct SalesCleaner;

impl SalesCleaner {
    /// Strip characters outside printable ASCII from the named columns.
    pub fn clean_names(table: &mut SalesTable, columns: &[&str]) {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|name| table.column_index(name))
            .collect();

        for row in &mut table.rows {
            for &idx in &indices {
                if let Some(cell) = row.get_mut(idx) {
                    if !cell.chars().all(|c| Self::is_printable_ascii(&c)) {
                        *cell = Self::strip_non_ascii(cell);
                    }
                }
            }
        }
    }

    pub fn strip_non_ascii(value: &str) -> String {
        value.chars().filter(Self::is_printable_ascii).collect()
    }

    fn is_printable_ascii(c: &char) -> bool {
        (' '..='~').contains(c)
    }

    /// Rewrite the date column as `YYYY-MM-DD`, dropping unparsable rows.
    pub fn normalize_dates(table: &mut SalesTable, column: &str) -> CleaningReport {
        let mut report = CleaningReport::default();
        let Some(idx) = table.column_index(column) else {
            return report;
        };

        table.retain_rows(|source_row, row| {
            let raw = row.get(idx).map(String::as_str).unwrap_or_default();
            match Self::parse_date(raw) {
                Ok(date) => {
                    row[idx] = date.format(CANONICAL_DATE_FORMAT).to_string();
                    true
                }
                Err(err) => {
                    report.record(source_row, err);
                    false
                }
            }
        });

        report
    }

    /// Parse a date from any of the accepted source representations.
    pub fn parse_date(raw: &str) -> Result<NaiveDate, RecordCleaningError> {
        let value = raw.trim();
        let malformed = || RecordCleaningError::MalformedDate {
            value: raw.to_string(),
        };
        if value.is_empty() {
            return Err(malformed());
        }

        // chrono's %Y also takes 1-3 digit years, so "1/5/12" would read as 0001-05-12.
        if let Some(date) = DATE_FORMATS
            .iter()
            .filter_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
            .find(Self::has_four_digit_year)
        {
            return Ok(date);
        }
        if let Some(date) = DATETIME_FORMATS
            .iter()
            .filter_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .map(|dt| dt.date())
            .find(Self::has_four_digit_year)
        {
            return Ok(date);
        }

        value
            .parse::<f64>()
            .ok()
            .and_then(Self::from_excel_serial)
            .ok_or_else(malformed)
    }

    fn has_four_digit_year(date: &NaiveDate) -> bool {
        (1000..=9999).contains(&date.year())
    }

    fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
        if !serial.is_finite() || !EXCEL_SERIAL_RANGE.contains(&serial) {
            return None;
        }
        let (y, m, d) = EXCEL_EPOCH;
        let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
        epoch.checked_add_signed(Duration::days(serial.floor() as i64))
    }

    /// Convert cleaned rows into typed records. Rows that fail are dropped.
    pub fn to_records(
        table: &SalesTable,
        columns: &ColumnNames,
    ) -> (Vec<SalesRecord>, CleaningReport) {
        let mut report = CleaningReport::default();
        let Some(layout) = ColumnLayout::resolve(table, columns) else {
            return (Vec::new(), report);
        };

        let records = table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| match layout.build(row, columns) {
                Ok(record) => Some(record),
                Err(err) => {
                    report.record(table.source_row(i), err);
                    None
                }
            })
            .collect();

        (records, report)
    }

    /// Full cleaning pass: names, dates, then typed records.
    pub fn clean(
        table: &mut SalesTable,
        columns: &ColumnNames,
    ) -> (Vec<SalesRecord>, CleaningReport) {
        Self::clean_names(table, &[columns.product_name.as_str()]);
        let mut report = Self::normalize_dates(table, &columns.order_date);
        let (records, conversion) = Self::to_records(table, columns);
        report.merge(conversion);
        info!(
            kept = records.len(),
            dropped = report.dropped_count(),
            "Cleaning complete"
        );
        (records, report)
    }
}

/// Column positions of the typed fields within a table.
struct ColumnLayout {
    order_date: usize,
    product_name: usize,
    state: usize,
    region: usize,
    sub_category: usize,
    sales: usize,
    profit: usize,
}

impl ColumnLayout {
    fn resolve(table: &SalesTable, columns: &ColumnNames) -> Option<Self> {
        Some(Self {
            order_date: table.column_index(&columns.order_date)?,
            product_name: table.column_index(&columns.product_name)?,
            state: table.column_index(&columns.state)?,
            region: table.column_index(&columns.region)?,
            sub_category: table.column_index(&columns.sub_category)?,
            sales: table.column_index(&columns.sales)?,
            profit: table.column_index(&columns.profit)?,
        })
    }

    fn width(&self) -> usize {
        [
            self.order_date,
            self.product_name,
            self.state,
            self.region,
            self.sub_category,
            self.sales,
            self.profit,
        ]
        .into_iter()
        .max()
        .map_or(0, |max| max + 1)
    }

    fn build(
        &self,
        row: &[String],
        columns: &ColumnNames,
    ) -> Result<SalesRecord, RecordCleaningError> {
        if row.len() < self.width() {
            return Err(RecordCleaningError::ShortRow {
                found: row.len(),
                expected: self.width(),
            });
        }

        let order_date = SalesCleaner::parse_date(&row[self.order_date])?;
        let region = row[self.region]
            .parse::<Region>()
            .map_err(RecordCleaningError::UnknownRegion)?;
        let sales_amount = parse_amount(&row[self.sales], &columns.sales)?;
        let profit_amount = parse_amount(&row[self.profit], &columns.profit)?;

        Ok(SalesRecord {
            order_date,
            product_name: row[self.product_name].clone(),
            state: row[self.state].trim().to_string(),
            region,
            sub_category: row[self.sub_category].trim().to_string(),
            sales_amount,
            profit_amount,
        })
    }
}

/// Parse a currency amount, tolerating `$` and thousands separators.
fn parse_amount(raw: &str, column: &str) -> Result<f64, RecordCleaningError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ','))
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RecordCleaningError::MalformedNumber {
            column: column.to_string(),
            value: raw.to_string(),
        })
}
