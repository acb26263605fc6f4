//! Analysis Configuration
//! TOML-backed settings passed explicitly into every pipeline stage.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid year range: start {start} is after end {end}")]
    InvalidYearRange { start: i32, end: i32 },
    #[error("charts.top_n must be at least 1")]
    InvalidTopN,
    #[error("Chart dimensions must be non-zero (got {width}x{height})")]
    InvalidChartSize { width: u32, height: u32 },
    #[error("Input separator must be a single ASCII character, got {0:?}")]
    InvalidSeparator(String),
}

/// Inclusive calendar year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self, ConfigError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start > self.end {
            return Err(ConfigError::InvalidYearRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: 2012,
            end: 2015,
        }
    }
}

/// Where the aggregates are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Memory,
    Sqlite,
}

/// Source column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub order_date: String,
    pub product_name: String,
    pub state: String,
    pub region: String,
    pub sub_category: String,
    pub sales: String,
    pub profit: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            order_date: "Order Date".to_string(),
            product_name: "Product Name".to_string(),
            state: "State".to_string(),
            region: "Region".to_string(),
            sub_category: "Product Sub-Category".to_string(),
            sales: "Sales".to_string(),
            profit: "Profit".to_string(),
        }
    }
}

impl ColumnNames {
    pub fn required(&self) -> [&str; 7] {
        [
            self.order_date.as_str(),
            self.product_name.as_str(),
            self.state.as_str(),
            self.region.as_str(),
            self.sub_category.as_str(),
            self.sales.as_str(),
            self.profit.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
    /// Delimiter for text inputs. Ignored for workbooks.
    pub separator: String,
    /// Worksheet to read from a workbook. Defaults to the first sheet.
    pub sheet: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("WalmartRetailSales.xlsx"),
            separator: ",".to_string(),
            sheet: None,
        }
    }
}

impl InputConfig {
    pub fn separator_byte(&self) -> Result<u8, ConfigError> {
        match self.separator.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(ConfigError::InvalidSeparator(self.separator.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("WalmartRetailSales_Cleaned.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("walmart.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub top_n: usize,
    pub states: Vec<String>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("visualizations"),
            width: 1400,
            height: 800,
            top_n: 3,
            states: ["California", "New York", "Texas", "Florida", "Illinois"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("report.json"),
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub year_range: YearRange,
    pub engine: Engine,
    pub input: InputConfig,
    pub columns: ColumnNames,
    pub export: ExportConfig,
    pub database: DatabaseConfig,
    pub charts: ChartConfig,
    pub report: ReportConfig,
}

impl AnalysisConfig {
    /// Load from a TOML file, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.year_range.validate()?;
        self.input.separator_byte()?;
        if self.charts.top_n == 0 {
            return Err(ConfigError::InvalidTopN);
        }
        if self.charts.width == 0 || self.charts.height == 0 {
            return Err(ConfigError::InvalidChartSize {
                width: self.charts.width,
                height: self.charts.height,
            });
        }
        Ok(())
    }
}
