//! Pipeline Module
//! The clean, stage and analyze stages, each usable alone or chained by `run`.

use crate::charts::StaticChartRenderer;
use crate::config::{AnalysisConfig, Engine};
use crate::data::{CleaningReport, SalesCleaner, SalesExporter, SalesLoader, SalesRecord};
use crate::report::{CleaningSummary, ReportPrinter, RunReport};
use crate::stats::{AnalysisResults, InMemoryQueries, SalesQueries};
use crate::store::SalesStore;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Records produced by the clean stage.
#[derive(Debug)]
pub struct CleanOutput {
    pub records: Vec<SalesRecord>,
    pub cleaning: CleaningReport,
}

pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load the raw sheet, clean it and write the pipe-delimited export.
    pub fn clean(&self, input: &Path, output: &Path) -> Result<CleanOutput> {
        info!(input = %input.display(), "Loading sales data");
        let loader = SalesLoader::new(self.config.input.separator_byte()?)
            .with_sheet(self.config.input.sheet.clone());
        let mut table = loader
            .load(input, &self.config.columns.required())
            .with_context(|| format!("Failed to load {}", input.display()))?;
        if table.is_empty() {
            warn!(input = %input.display(), "Input has no data rows");
        }

        let (records, cleaning) = SalesCleaner::clean(&mut table, &self.config.columns);

        let written = SalesExporter::write_table(&table, output)
            .with_context(|| format!("Failed to export cleaned data to {}", output.display()))?;
        info!(rows = written, output = %output.display(), "Cleaned data exported");

        Ok(CleanOutput { records, cleaning })
    }

    /// Read a cleaned export back into typed records.
    pub fn read_cleaned(&self, input: &Path) -> Result<CleanOutput> {
        let table = SalesExporter::read_table(input)
            .with_context(|| format!("Failed to read cleaned data from {}", input.display()))?;
        let missing = table.missing_columns(&self.config.columns.required());
        anyhow::ensure!(
            missing.is_empty(),
            "Cleaned data {} is missing columns: {}",
            input.display(),
            missing.join(", ")
        );
        let (records, cleaning) = SalesCleaner::to_records(&table, &self.config.columns);
        debug!(records = records.len(), "Cleaned data read");
        Ok(CleanOutput { records, cleaning })
    }

    /// Replace the fact table in `database` and recreate the yearly view.
    pub fn stage(&self, records: &[SalesRecord], database: &Path) -> Result<SalesStore> {
        let mut store = SalesStore::open(database)
            .with_context(|| format!("Failed to open database {}", database.display()))?;
        store.create_schema().context("Failed to create schema")?;
        let staged = store
            .replace_records(records)
            .context("Failed to stage records")?;
        store
            .create_yearly_state_sales_view(self.config.year_range)
            .context("Failed to create yearly state sales view")?;

        for column in store.describe_table("sales").context("Failed to describe sales table")? {
            debug!(column = %column.name, data_type = %column.data_type, "sales column");
        }
        let view_rows = store
            .read_yearly_state_sales_view()
            .context("Failed to read yearly state sales view")?
            .len();
        info!(
            rows = staged,
            view_rows,
            database = %database.display(),
            "Records staged"
        );
        Ok(store)
    }

    /// Compute aggregates with the selected engine, then print, chart and report.
    pub fn analyze(
        &self,
        records: &[SalesRecord],
        engine: Engine,
        cleaning: &CleaningReport,
        skip_charts: bool,
    ) -> Result<AnalysisResults> {
        let results = match engine {
            Engine::Memory => self.aggregate(&InMemoryQueries::new(records))?,
            Engine::Sqlite => {
                let store = self.stage(records, &self.config.database.path)?;
                self.aggregate(&store)?
            }
        };
        self.publish(&results, engine, records.len(), cleaning, skip_charts)?;
        Ok(results)
    }

    /// Every stage end to end from the configured paths.
    pub fn run(&self, skip_charts: bool) -> Result<AnalysisResults> {
        let CleanOutput { records, cleaning } =
            self.clean(&self.config.input.path, &self.config.export.path)?;
        let store = self.stage(&records, &self.config.database.path)?;

        let engine = self.config.engine;
        let results = match engine {
            Engine::Memory => self.aggregate(&InMemoryQueries::new(&records))?,
            Engine::Sqlite => self.aggregate(&store)?,
        };
        self.publish(&results, engine, records.len(), &cleaning, skip_charts)?;
        cleaning.log_summary();
        Ok(results)
    }

    fn aggregate<Q: SalesQueries>(&self, queries: &Q) -> Result<AnalysisResults> {
        AnalysisResults::compute(queries, self.config.year_range, self.config.charts.top_n)
            .context("Failed to compute aggregates")
    }

    fn publish(
        &self,
        results: &AnalysisResults,
        engine: Engine,
        records_analyzed: usize,
        cleaning: &CleaningReport,
        skip_charts: bool,
    ) -> Result<()> {
        ReportPrinter::print(results);

        let mut report = RunReport::new(
            engine,
            records_analyzed,
            CleaningSummary::from(cleaning),
            results,
        );
        if skip_charts {
            info!("Chart rendering skipped");
        } else {
            let summary = StaticChartRenderer::new(&self.config.charts)
                .render_all(results)
                .context("Failed to prepare chart output")?;
            report.charts = summary.written;
        }

        report
            .write_json(&self.config.report.path)
            .context("Failed to write report")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Region;
    use std::fs;
    use std::path::PathBuf;

    const RAW: &str = "\
Order Date,Product Name,State,Region,Product Sub-Category,Sales,Profit
2012-01-05,Clé USB,Texas,Central,Computer Peripherals,100.00,10.00
2013-02-11,\"Desk, Oak\",Texas,Central,Tables,150.00,-5.00
03/14/2014,Stapler,Maine,East,Office Supplies,75.50,3.25
not a date,Stapler,Maine,East,Office Supplies,10.00,1.00
2015-07-01,Chair,Oregon,West,Chairs,200.00,40.00
2015-07-02,Chair,Oregon,Nowhere,Chairs,200.00,40.00
2016-01-01,Chair,Oregon,West,Chairs,999.00,99.00
";

    fn config_in(dir: &Path) -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.input.path = dir.join("raw.csv");
        config.export.path = dir.join("cleaned.csv");
        config.database.path = dir.join("sales.db");
        config.charts.output_dir = dir.join("charts");
        config.report.path = dir.join("report.json");
        config
    }

    fn write_raw(dir: &Path) -> PathBuf {
        let path = dir.join("raw.csv");
        fs::write(&path, RAW).unwrap();
        path
    }

    #[test]
    fn clean_drops_bad_rows_and_exports_pipe_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config_in(dir.path()));
        let input = write_raw(dir.path());
        let output = dir.path().join("cleaned.csv");

        let cleaned = pipeline.clean(&input, &output).unwrap();
        assert_eq!(cleaned.records.len(), 5);
        assert_eq!(cleaned.cleaning.dropped_count(), 2);
        assert_eq!(cleaned.records[0].product_name, "Cl USB");

        let text = fs::read_to_string(&output).unwrap();
        assert!(text.starts_with("\"Order Date\"|\"Product Name\"|"));
        assert!(text.contains("\"2014-03-14\""));
        assert!(!text.contains("not a date"));

        let reread = pipeline.read_cleaned(&output).unwrap();
        assert_eq!(reread.records, cleaned.records);
    }

    #[test]
    fn stage_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config_in(dir.path()));
        let input = write_raw(dir.path());
        let cleaned = pipeline
            .clean(&input, &dir.path().join("cleaned.csv"))
            .unwrap();
        let db = dir.path().join("sales.db");

        pipeline.stage(&cleaned.records, &db).unwrap();
        let store = pipeline.stage(&cleaned.records, &db).unwrap();
        assert_eq!(store.record_count().unwrap(), cleaned.records.len());
    }

    #[test]
    fn both_engines_produce_identical_results() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config_in(dir.path()));
        let input = write_raw(dir.path());
        let cleaned = pipeline
            .clean(&input, &dir.path().join("cleaned.csv"))
            .unwrap();

        let memory = pipeline
            .analyze(&cleaned.records, Engine::Memory, &cleaned.cleaning, true)
            .unwrap();
        let sqlite = pipeline
            .analyze(&cleaned.records, Engine::Sqlite, &cleaned.cleaning, true)
            .unwrap();
        assert_eq!(memory, sqlite);

        // 2016 is outside the default window
        assert!(memory.yearly_state_sales.iter().all(|e| e.year <= 2015));
        assert_eq!(memory.yearly_order_volume.len(), 5);
        let west = memory
            .top_product_per_region
            .iter()
            .find(|t| t.region == Region::West)
            .unwrap();
        assert_eq!(west.sub_category, "Chairs");
    }

    #[test]
    fn run_writes_export_database_and_report() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path());
        let config = config_in(dir.path());
        let pipeline = Pipeline::new(config.clone());

        let results = pipeline.run(true).unwrap();
        assert!(!results.sales_growth.is_empty());
        assert!(config.export.path.is_file());
        assert!(config.database.path.is_file());

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&config.report.path).unwrap()).unwrap();
        assert_eq!(report["cleaning"]["dropped_records"], 2);
        assert_eq!(report["engine"], "memory");
    }

    #[test]
    fn missing_columns_abort_clean() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        fs::write(&input, "Order Date,Sales\n2012-01-01,5\n").unwrap();
        let pipeline = Pipeline::new(config_in(dir.path()));

        let err = pipeline
            .clean(&input, &dir.path().join("cleaned.csv"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("Product Name"));
    }
}
