//! Cleaned Data Exporter
//! Pipe-delimited, fully quoted interchange format.
//!
//! Quotes inside a field are escaped with a backslash instead of being
//! doubled, and backslashes are escaped the same way so the file reads back
//! field for field.

use crate::data::SalesTable;
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const DELIMITER: u8 = b'|';
pub const QUOTE: u8 = b'"';
pub const ESCAPE: u8 = b'\\';

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write delimited data: {0}")]
    Write(#[source] csv::Error),
    #[error("Failed to flush delimited data: {0}")]
    Flush(#[source] std::io::Error),
    #[error("Failed to parse delimited data: {0}")]
    Parse(#[source] csv::Error),
}

/// Writes and reads the pipe-delimited export.
pub struct SalesExporter;

impl SalesExporter {
    /// Write `table` to `path`, returning the number of data rows written.
    pub fn write_table(table: &SalesTable, path: &Path) -> Result<usize, ExportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let written = Self::write_to(table, BufWriter::new(file))?;
        info!(path = %path.display(), rows = written, "Exported cleaned table");
        Ok(written)
    }

    pub fn write_to<W: Write>(table: &SalesTable, writer: W) -> Result<usize, ExportError> {
        let mut csv_writer = WriterBuilder::new()
            .delimiter(DELIMITER)
            .quote(QUOTE)
            .quote_style(QuoteStyle::Always)
            .double_quote(false)
            .escape(ESCAPE)
            .from_writer(writer);

        csv_writer
            .write_record(table.headers.iter().map(|h| escape_backslashes(h)))
            .map_err(ExportError::Write)?;
        for row in &table.rows {
            csv_writer
                .write_record(row.iter().map(|cell| escape_backslashes(cell)))
                .map_err(ExportError::Write)?;
        }
        csv_writer.flush().map_err(ExportError::Flush)?;
        Ok(table.rows.len())
    }

    /// Read an export written by [`SalesExporter::write_table`].
    pub fn read_table(path: &Path) -> Result<SalesTable, ExportError> {
        let file = File::open(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::read_from(file)?;
        info!(path = %path.display(), rows = table.row_count(), "Read cleaned table");
        Ok(table)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<SalesTable, ExportError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(DELIMITER)
            .quote(QUOTE)
            .double_quote(false)
            .escape(Some(ESCAPE))
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(ExportError::Parse)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result.map_err(ExportError::Parse)?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(SalesTable::new(headers, rows))
    }
}

fn escape_backslashes(field: &str) -> String {
    field.replace('\\', "\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> SalesTable {
        SalesTable::new(
            vec![
                "Order Date".into(),
                "Product Name".into(),
                "Sales".into(),
            ],
            vec![
                vec!["2012-01-05".into(), "Cl USB".into(), "100.5".into()],
                vec![
                    "2013-11-30".into(),
                    "12\" Ruler | metal".into(),
                    "-3".into(),
                ],
                vec!["2014-02-28".into(), "C:\\temp\\".into(), "".into()],
            ],
        )
    }

    #[test]
    fn writes_fully_quoted_pipe_delimited_rows() {
        let mut buf = Vec::new();
        let written = SalesExporter::write_to(&sample_table(), &mut buf).unwrap();
        assert_eq!(written, 3);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#""Order Date"|"Product Name"|"Sales""#);
        assert_eq!(lines[1], r#""2012-01-05"|"Cl USB"|"100.5""#);
        assert_eq!(lines[2], r#""2013-11-30"|"12\" Ruler | metal"|"-3""#);
        assert_eq!(lines[3], r#""2014-02-28"|"C:\\temp\\"|"""#);
    }

    #[test]
    fn export_round_trips_field_for_field() {
        let table = sample_table();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cleaned.csv");

        SalesExporter::write_table(&table, &path).unwrap();
        let read_back = SalesExporter::read_table(&path).unwrap();
        assert_eq!(read_back, table);
    }

    #[test]
    fn header_only_table_round_trips() {
        let table = SalesTable::new(vec!["Order Date".into()], Vec::new());
        let mut buf = Vec::new();
        SalesExporter::write_to(&table, &mut buf).unwrap();
        let read_back = SalesExporter::read_from(buf.as_slice()).unwrap();
        assert_eq!(read_back, table);
    }

    #[test]
    fn unwritable_path_is_an_export_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a file.
        let err = SalesExporter::write_table(&sample_table(), dir.path()).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }
}
