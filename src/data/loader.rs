//! Sales Data Loader Module
//! Reads the sales workbook with calamine, or a delimited export of it with Polars.

use crate::data::SalesTable;
use calamine::{open_workbook_auto, Data, Range, Reader};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
    #[error("Failed to read workbook {}: {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("Workbook {} has no sheet named {sheet:?}", path.display())]
    SheetNotFound { path: PathBuf, sheet: String },
    #[error("Workbook {} has no sheets", .0.display())]
    EmptyWorkbook(PathBuf),
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Input is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Extensions routed to the workbook reader. Anything else is read as delimited text.
const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Loads the source table with every cell kept as text.
pub struct SalesLoader {
    separator: u8,
    sheet: Option<String>,
}

impl Default for SalesLoader {
    fn default() -> Self {
        Self::new(b',')
    }
}

impl SalesLoader {
    pub fn new(separator: u8) -> Self {
        Self {
            separator,
            sheet: None,
        }
    }

    /// Read `sheet` from workbooks instead of the first sheet.
    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet;
        self
    }

    pub fn is_workbook(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                WORKBOOK_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
    }

    /// Load a workbook or delimited file and check that `required` columns exist.
    pub fn load(&self, path: &Path, required: &[&str]) -> Result<SalesTable, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        info!(path = %path.display(), "Loading sales table");

        let table = if Self::is_workbook(path) {
            self.read_workbook(path)?
        } else {
            self.read_delimited(path)?
        };

        let missing = table.missing_columns(required);
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns(missing));
        }

        info!(
            rows = table.row_count(),
            columns = table.headers.len(),
            "Sales table loaded"
        );
        Ok(table)
    }

    fn read_workbook(&self, path: &Path) -> Result<SalesTable, LoadError> {
        let workbook_error = |source| LoadError::Workbook {
            path: path.to_path_buf(),
            source,
        };
        let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
        let sheet = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| LoadError::EmptyWorkbook(path.to_path_buf()))?,
        };
        if !workbook.sheet_names().contains(&sheet) {
            return Err(LoadError::SheetNotFound {
                path: path.to_path_buf(),
                sheet,
            });
        }

        let range = workbook.worksheet_range(&sheet).map_err(workbook_error)?;
        debug!(sheet = %sheet, "Read worksheet");
        Ok(Self::range_to_table(&range))
    }

    fn read_delimited(&self, path: &Path) -> Result<SalesTable, LoadError> {
        let read_error = |source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        };
        let df = self.read_frame(path).map_err(read_error)?;
        Self::frame_to_table(&df).map_err(read_error)
    }

    /// First row of the used range is the header row. Short rows are padded with "".
    fn range_to_table(range: &Range<Data>) -> SalesTable {
        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|header| {
                header
                    .iter()
                    .map(|cell| Self::cell_text(cell).trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Vec<String>> = rows
            .map(|row| {
                let mut values: Vec<String> = row.iter().map(Self::cell_text).collect();
                values.resize(headers.len(), String::new());
                values
            })
            .filter(|row| row.iter().any(|value| !value.is_empty()))
            .collect();

        debug!(rows = rows.len(), "Converted worksheet to table");
        SalesTable::new(headers, rows)
    }

    /// Date cells become their serial day number, which the cleaner converts.
    fn cell_text(cell: &Data) -> String {
        match cell {
            Data::Empty | Data::Error(_) => String::new(),
            Data::String(value) | Data::DateTimeIso(value) | Data::DurationIso(value) => {
                value.clone()
            }
            Data::Float(value) => value.to_string(),
            Data::Int(value) => value.to_string(),
            Data::Bool(value) => value.to_string(),
            Data::DateTime(value) => value.as_f64().to_string(),
        }
    }

    fn read_frame(&self, path: &Path) -> PolarsResult<DataFrame> {
        // No schema inference: every column stays a string so the cleaner
        // sees the source representation.
        LazyCsvReader::new(path)
            .with_has_header(true)
            .with_separator(self.separator)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()
    }

    /// Convert a DataFrame into a row-major table of strings. Nulls become "".
    fn frame_to_table(df: &DataFrame) -> PolarsResult<SalesTable> {
        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut rows: Vec<Vec<String>> = vec![Vec::with_capacity(headers.len()); df.height()];
        for column in df.get_columns() {
            let as_text = column.cast(&DataType::String)?;
            let values = as_text.str()?;
            for (row, value) in rows.iter_mut().zip(values.into_iter()) {
                row.push(value.unwrap_or_default().to_string());
            }
        }

        debug!(rows = rows.len(), "Converted frame to table");
        Ok(SalesTable::new(headers, rows))
    }
}
