//! Sales Data Model
//! Tabular (string) and typed representations of the sales fact table.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Raw table of string cells, as read from the source or the cleaned export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 1-based source row number of each entry in `rows`.
    source_rows: Vec<usize>,
}

impl SalesTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let source_rows = (1..=rows.len()).collect();
        Self {
            headers,
            rows,
            source_rows,
        }
    }

    /// Source row number of `rows[index]`, stable across [`Self::retain_rows`].
    pub fn source_row(&self, index: usize) -> usize {
        self.source_rows.get(index).copied().unwrap_or(index + 1)
    }

    /// Keep the rows for which `keep(source_row, row)` returns true.
    /// The callback may rewrite the row in place.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize, &mut Vec<String>) -> bool,
    {
        let rows = std::mem::take(&mut self.rows);
        let numbers = std::mem::take(&mut self.source_rows);
        for (i, mut row) in rows.into_iter().enumerate() {
            let number = numbers.get(i).copied().unwrap_or(i + 1);
            if keep(number, &mut row) {
                self.rows.push(row);
                self.source_rows.push(number);
            }
        }
    }

    /// Index of a column by its header name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Names from `required` that are not present in the header row.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Sales region. Declared in alphabetical order so the derived `Ord` matches
/// the name ordering used in reports and SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Region {
    Central,
    East,
    South,
    West,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Central, Region::East, Region::South, Region::West];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Central => "Central",
            Region::East => "East",
            Region::South => "South",
            Region::West => "West",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Region::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| trimmed.to_string())
    }
}

/// One retail transaction line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub order_date: NaiveDate,
    pub product_name: String,
    pub state: String,
    pub region: Region,
    pub sub_category: String,
    pub sales_amount: f64,
    pub profit_amount: f64,
}

impl SalesRecord {
    pub fn year(&self) -> i32 {
        self.order_date.year()
    }
}
